//! Vault configuration.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for the encrypted file vault.
///
/// Passed explicitly at construction; nothing in the vault reads process
/// environment after this struct is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Bucket holding ciphertext blobs.
    pub bucket_name: String,

    /// Cloud project owning the KMS key ring.
    pub kms_project: String,

    /// KMS location (e.g. "global", "europe-west1").
    pub kms_location: String,

    /// KMS key ring name.
    pub kms_keyring: String,

    /// Symmetric crypto key used to wrap DEKs.
    pub kms_key: String,

    /// Document-store collection holding per-file metadata records.
    pub ledger_collection: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            bucket_name: "my-sanitized-files-bucket".to_string(),
            kms_project: String::new(),
            kms_location: "global".to_string(),
            kms_keyring: String::new(),
            kms_key: String::new(),
            ledger_collection: "file_storage_metadata".to_string(),
        }
    }
}

impl VaultConfig {
    /// Builds a config from a key lookup, falling back to defaults for unset keys.
    ///
    /// Recognized keys: `GCS_BUCKET`, `KMS_PROJECT`, `KMS_LOCATION`,
    /// `KMS_KEY_RING`, `KMS_CRYPTO_KEY`, `FIRESTORE_COLLECTION`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };

        Self {
            bucket_name: get("GCS_BUCKET", defaults.bucket_name),
            kms_project: get("KMS_PROJECT", defaults.kms_project),
            kms_location: get("KMS_LOCATION", defaults.kms_location),
            kms_keyring: get("KMS_KEY_RING", defaults.kms_keyring),
            kms_key: get("KMS_CRYPTO_KEY", defaults.kms_key),
            ledger_collection: get("FIRESTORE_COLLECTION", defaults.ledger_collection),
        }
    }

    /// Reads the process environment once.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the KMS fields into a key reference.
    pub fn kms_key_ref(&self) -> VaultResult<KmsKeyRef> {
        let missing: Vec<&str> = [
            ("kms_project", &self.kms_project),
            ("kms_location", &self.kms_location),
            ("kms_keyring", &self.kms_keyring),
            ("kms_key", &self.kms_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(VaultError::KmsConfiguration(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        Ok(KmsKeyRef {
            project: self.kms_project.clone(),
            location: self.kms_location.clone(),
            keyring: self.kms_keyring.clone(),
            key: self.kms_key.clone(),
        })
    }
}

/// Fully-qualified reference to a pre-provisioned KMS master key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmsKeyRef {
    pub project: String,
    pub location: String,
    pub keyring: String,
    pub key: String,
}

impl KmsKeyRef {
    /// Resource name, e.g. `projects/p/locations/global/keyRings/r/cryptoKeys/k`.
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.project, self.location, self.keyring, self.key
        )
    }
}

impl fmt::Display for KmsKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_name())
    }
}

//! Shared types for vault operations.

use chrono::{DateTime, Utc};
use cyberguard_crypto::CipherId;
use serde::{Deserialize, Serialize};

/// Per-file metadata written once at encryption time.
///
/// `nonce`, `wrapped_dek` and `cipher_id` are together sufficient to decrypt
/// the blob at `object_name`, given access to the KMS key.
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub document_id: String,
    pub original_filename: String,
    pub object_name: String,
    /// DEK encrypted under the KMS master key.
    pub wrapped_dek: Vec<u8>,
    /// 12-byte AEAD nonce, unique per encryption.
    pub nonce: Vec<u8>,
    pub cipher_id: CipherId,
    pub sensitivity: f64,
    /// Lowercase hex SHA-256 of the plaintext.
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploader_id: Option<String>,
    pub model_version: Option<String>,
}

/// Optional provenance attached to an upload. Not used by the crypto path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub uploader_id: Option<String>,
    pub model_version: Option<String>,
}

impl Provenance {
    pub fn new(uploader_id: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            uploader_id: Some(uploader_id.into()),
            model_version: Some(model_version.into()),
        }
    }
}

/// Identifiers returned by a successful encrypt-and-store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageReceipt {
    pub object_name: String,
    pub document_id: String,
    pub cipher_id: CipherId,
}

/// A decrypted file together with the record it was read through.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedFile {
    pub plaintext: Vec<u8>,
    pub record: FileRecord,
}

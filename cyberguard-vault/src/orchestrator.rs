//! Encrypt-and-store and retrieve-and-decrypt.
//!
//! Each call is a self-contained sequence over the KMS, object store and
//! ledger with no state shared between calls. Failures propagate
//! immediately; nothing is rolled back. A crash between the blob upload and
//! the ledger write leaves an orphaned blob that is not reconciled.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::kms::{KeyWrapper, KmsClient};
use crate::ledger::{DocumentStore, MetadataLedger};
use crate::naming;
use crate::object_store::{CIPHERTEXT_CONTENT_TYPE, ObjectMetadata, ObjectStore};
use crate::types::{FileRecord, Provenance, RetrievedFile, StorageReceipt};
use chrono::Utc;
use cyberguard_crypto::{
    choose_cipher, decrypt, encrypt, generate_key, validate_sensitivity, CryptoError,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Composes cipher selection, envelope encryption, key wrapping, blob
/// storage and metadata persistence.
#[derive(Clone)]
pub struct EncryptionOrchestrator {
    wrapper: KeyWrapper,
    objects: Arc<dyn ObjectStore>,
    ledger: MetadataLedger,
}

impl EncryptionOrchestrator {
    pub fn new(
        config: VaultConfig,
        kms: Arc<dyn KmsClient>,
        objects: Arc<dyn ObjectStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let ledger = MetadataLedger::new(documents, config.ledger_collection.clone());
        Self {
            wrapper: KeyWrapper::new(kms, config),
            objects,
            ledger,
        }
    }

    pub fn ledger(&self) -> &MetadataLedger {
        &self.ledger
    }

    /// Encrypts `plaintext` at the strength its sensitivity calls for,
    /// uploads the ciphertext and records how to recover it.
    pub async fn encrypt_and_store(
        &self,
        plaintext: &[u8],
        original_filename: &str,
        sensitivity: f64,
        provenance: Provenance,
    ) -> VaultResult<StorageReceipt> {
        validate_sensitivity(sensitivity)?;

        let (cipher_id, key_bits) = choose_cipher(sensitivity)?;
        let dek = generate_key(key_bits)?;
        let sealed = encrypt(plaintext, &dek, cipher_id)?;
        let wrapped_dek = self.wrapper.wrap(&dek).await?;
        drop(dek);

        let content_hash = content_hash(plaintext);

        let uploaded_at = Utc::now();
        let safe_name = naming::sanitize_filename(original_filename);
        let object_name = naming::object_name(uploaded_at, &safe_name);
        let document_id = naming::document_id(uploaded_at, &safe_name);

        let metadata = ObjectMetadata::from([
            ("sensitivity".to_string(), sensitivity.to_string()),
            ("cipher_id".to_string(), cipher_id.to_string()),
        ]);
        let ciphertext_len = sealed.ciphertext.len();
        self.objects
            .put(
                &object_name,
                sealed.ciphertext,
                CIPHERTEXT_CONTENT_TYPE,
                &metadata,
            )
            .await?;
        debug!("stored {ciphertext_len} ciphertext bytes at {object_name}");

        let record = FileRecord {
            document_id: document_id.clone(),
            original_filename: original_filename.to_string(),
            object_name: object_name.clone(),
            wrapped_dek,
            nonce: sealed.nonce.to_vec(),
            cipher_id,
            sensitivity,
            content_hash,
            uploaded_at,
            uploader_id: provenance.uploader_id,
            model_version: provenance.model_version,
        };
        self.ledger.save(&document_id, &record).await?;

        info!(
            document_id = %document_id,
            cipher = %cipher_id,
            sensitivity,
            "encrypted and stored file"
        );

        Ok(StorageReceipt {
            object_name,
            document_id,
            cipher_id,
        })
    }

    /// Loads, decrypts and verifies a stored file.
    pub async fn retrieve_and_decrypt(&self, document_id: &str) -> VaultResult<RetrievedFile> {
        let record = self
            .ledger
            .load(document_id)
            .await?
            .ok_or_else(|| VaultError::RecordNotFound(document_id.to_string()))?;

        let ciphertext = self.objects.get(&record.object_name).await?;

        let dek = self.wrapper.unwrap(&record.wrapped_dek).await?;
        let plaintext = decrypt(&record.nonce, &ciphertext, &dek, record.cipher_id).map_err(
            |e| match e {
                CryptoError::AuthenticationFailed => {
                    warn!(document_id, "ciphertext failed authentication");
                    VaultError::AuthenticationFailed {
                        document_id: document_id.to_string(),
                    }
                }
                other => other.into(),
            },
        )?;
        drop(dek);

        let computed = content_hash(&plaintext);
        if computed != record.content_hash {
            warn!(document_id, "plaintext hash does not match metadata");
            return Err(VaultError::IntegrityMismatch {
                document_id: document_id.to_string(),
                expected: record.content_hash,
                actual: computed,
            });
        }

        info!(document_id, cipher = %record.cipher_id, "retrieved and decrypted file");
        Ok(RetrievedFile { plaintext, record })
    }
}

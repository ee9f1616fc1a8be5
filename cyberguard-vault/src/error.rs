//! Vault error types.

use cyberguard_crypto::CryptoError;
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur while storing or retrieving an encrypted file.
///
/// Every variant is terminal for the operation in progress. Tampering
/// (`AuthenticationFailed`, `IntegrityMismatch`) and absence
/// (`RecordNotFound`, `ObjectNotFound`) are kept apart so callers can tell
/// them from one another.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("sensitivity must be within [0, 1], got {0}")]
    InvalidSensitivity(f64),

    #[error("unsupported key length: {0} bits")]
    UnsupportedKeyLength(usize),

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("KMS not configured: {0}")]
    KmsConfiguration(String),

    #[error("KMS wrap failed: {0}")]
    KmsWrapFailed(String),

    #[error("KMS unwrap failed: {0}")]
    KmsUnwrapFailed(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("metadata record not found: {0}")]
    RecordNotFound(String),

    #[error("authentication failed for {document_id}: ciphertext tampered or key mismatch")]
    AuthenticationFailed { document_id: String },

    #[error("integrity mismatch for {document_id}: expected sha256 {expected}, computed {actual}")]
    IntegrityMismatch {
        document_id: String,
        expected: String,
        actual: String,
    },

    #[error("object store operation failed: {0}")]
    ObjectStore(String),

    #[error("access token unavailable: {0}")]
    Auth(String),

    #[error("metadata ledger operation failed: {0}")]
    Ledger(String),

    #[error("corrupt metadata record {document_id}: {reason}")]
    CorruptRecord { document_id: String, reason: String },

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidSensitivity(s) => VaultError::InvalidSensitivity(s),
            CryptoError::UnsupportedKeyLength(bits) => VaultError::UnsupportedKeyLength(bits),
            CryptoError::UnsupportedCipher(name) => VaultError::UnsupportedCipher(name),
            CryptoError::AuthenticationFailed => VaultError::AuthenticationFailed {
                document_id: String::new(),
            },
            other => VaultError::Crypto(other),
        }
    }
}

impl VaultError {
    /// True for conditions where the requested file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VaultError::RecordNotFound(_) | VaultError::ObjectNotFound(_)
        )
    }

    /// True when stored data failed a cryptographic or hash check.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            VaultError::AuthenticationFailed { .. } | VaultError::IntegrityMismatch { .. }
        )
    }

    /// HTTP status an upstream handler should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            VaultError::RecordNotFound(_) | VaultError::ObjectNotFound(_) => 404,
            VaultError::InvalidSensitivity(_) => 400,
            _ => 500,
        }
    }
}

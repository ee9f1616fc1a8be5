//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while selecting a cipher or sealing/opening data.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("sensitivity must be within [0, 1], got {0}")]
    InvalidSensitivity(f64),

    #[error("unsupported key length: {0} bits (expected 128 or 256)")]
    UnsupportedKeyLength(usize),

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("invalid key length for {cipher}: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        cipher: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    #[error("authentication failed (wrong key or tampered data)")]
    AuthenticationFailed,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("random number generation failed: {0}")]
    Rng(String),
}

//! Encryption layer for CyberGuard file storage.
//!
//! Provides sensitivity-adaptive authenticated encryption using:
//! - AES-256-GCM for the most sensitive files
//! - ChaCha20-Poly1305 for the middle tier
//! - AES-128-GCM for low-sensitivity files
//!
//! # Architecture
//!
//! Files are protected with envelope encryption:
//!
//! 1. **Data Encryption Key (DEK)**: A random key generated per file by
//!    [`generate_key`], sized by [`choose_cipher`]. It encrypts the payload
//!    and is zeroized as soon as it is dropped.
//!
//! 2. **Master Key**: Held by an external KMS. It wraps the DEK; the wrapped
//!    DEK is what gets persisted. That layer lives in `cyberguard-vault`.

mod cipher;
mod error;
mod key;
mod suite;

pub use cipher::{decrypt, encrypt, generate_nonce, EncryptedPayload, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{generate_key, DataKey, SUPPORTED_KEY_BITS};
pub use suite::{
    choose_cipher, validate_sensitivity, CipherId, HIGH_SENSITIVITY_THRESHOLD,
    MEDIUM_SENSITIVITY_THRESHOLD,
};

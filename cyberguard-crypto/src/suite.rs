//! Sensitivity-driven cipher selection.
//!
//! Maps a classifier sensitivity score onto an AEAD algorithm and key size.
//! Thresholds are fixed constants; records carry their own `cipher_id`.
//!
//! | sensitivity        | cipher              | key bits |
//! |--------------------|---------------------|----------|
//! | `>= 0.85`          | AES-256-GCM         | 256      |
//! | `[0.50, 0.85)`     | ChaCha20-Poly1305   | 256      |
//! | `< 0.50`           | AES-128-GCM         | 128      |

use crate::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower bound (inclusive) of the maximum-assurance tier.
pub const HIGH_SENSITIVITY_THRESHOLD: f64 = 0.85;

/// Lower bound (inclusive) of the ChaCha20-Poly1305 tier.
pub const MEDIUM_SENSITIVITY_THRESHOLD: f64 = 0.50;

/// AEAD algorithms a file may be sealed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherId {
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
    #[serde(rename = "AES-128-GCM")]
    Aes128Gcm,
    #[serde(rename = "ChaCha20-Poly1305")]
    ChaCha20Poly1305,
}

impl CipherId {
    /// All supported ciphers.
    pub const ALL: [CipherId; 3] = [
        CipherId::Aes256Gcm,
        CipherId::Aes128Gcm,
        CipherId::ChaCha20Poly1305,
    ];

    /// Canonical identifier as persisted in metadata records.
    pub fn as_str(&self) -> &'static str {
        match self {
            CipherId::Aes256Gcm => "AES-256-GCM",
            CipherId::Aes128Gcm => "AES-128-GCM",
            CipherId::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Key size this cipher requires, in bits.
    pub fn key_bits(&self) -> usize {
        match self {
            CipherId::Aes128Gcm => 128,
            CipherId::Aes256Gcm | CipherId::ChaCha20Poly1305 => 256,
        }
    }

    /// Key size this cipher requires, in bytes.
    pub fn key_len(&self) -> usize {
        self.key_bits() / 8
    }
}

impl fmt::Display for CipherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CipherId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CipherId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CryptoError::UnsupportedCipher(s.to_string()))
    }
}

/// Rejects scores outside `[0, 1]`, including NaN.
pub fn validate_sensitivity(sensitivity: f64) -> CryptoResult<()> {
    if (0.0..=1.0).contains(&sensitivity) {
        Ok(())
    } else {
        Err(CryptoError::InvalidSensitivity(sensitivity))
    }
}

/// Selects the cipher and key size for a sensitivity score.
///
/// Pure and deterministic. Boundary values select the higher tier.
pub fn choose_cipher(sensitivity: f64) -> CryptoResult<(CipherId, usize)> {
    validate_sensitivity(sensitivity)?;

    let cipher = if sensitivity >= HIGH_SENSITIVITY_THRESHOLD {
        CipherId::Aes256Gcm
    } else if sensitivity >= MEDIUM_SENSITIVITY_THRESHOLD {
        CipherId::ChaCha20Poly1305
    } else {
        CipherId::Aes128Gcm
    };

    Ok((cipher, cipher.key_bits()))
}

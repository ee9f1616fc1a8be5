//! Data encryption keys.

use crate::error::{CryptoError, CryptoResult};
use rand::TryRngCore;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key sizes (in bits) accepted by [`generate_key`].
pub const SUPPORTED_KEY_BITS: [usize; 2] = [128, 256];

/// A symmetric data encryption key (DEK).
///
/// Zeroized on drop. Deliberately not `Clone`: a DEK lives inside a single
/// encrypt or decrypt call and is never cached.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: Vec<u8>,
}

impl DataKey {
    /// Wraps raw key bytes, e.g. a DEK just unwrapped by the KMS.
    ///
    /// Takes ownership so the bytes are not left behind in a caller buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        let bits = bytes.len() * 8;
        if !SUPPORTED_KEY_BITS.contains(&bits) {
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(CryptoError::UnsupportedKeyLength(bits));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataKey({} bits, [REDACTED])", self.bits())
    }
}

/// Generates a random DEK of exactly `bits` bits from the OS CSPRNG.
pub fn generate_key(bits: usize) -> CryptoResult<DataKey> {
    if !SUPPORTED_KEY_BITS.contains(&bits) {
        return Err(CryptoError::UnsupportedKeyLength(bits));
    }

    let mut bytes = vec![0u8; bits / 8];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;

    Ok(DataKey { bytes })
}

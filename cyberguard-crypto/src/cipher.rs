//! AEAD sealing and opening, dispatched on [`CipherId`].
//!
//! Every supported cipher uses a 96-bit nonce and a 128-bit tag, appended to
//! the ciphertext. No associated data is bound.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DataKey;
use crate::suite::CipherId;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Nonce size for all supported ciphers (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for all supported ciphers (128 bits).
pub const TAG_SIZE: usize = 16;

/// Output of a single encryption: a fresh nonce and ciphertext-with-tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Draws a fresh random nonce from the OS CSPRNG.
pub fn generate_nonce() -> CryptoResult<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(nonce)
}

/// Encrypts `plaintext` under `key` with the selected cipher.
///
/// A new random nonce is generated on every call.
pub fn encrypt(plaintext: &[u8], key: &DataKey, cipher: CipherId) -> CryptoResult<EncryptedPayload> {
    check_key(key, cipher)?;
    let nonce = generate_nonce()?;

    let ciphertext = match cipher {
        CipherId::Aes256Gcm => seal::<Aes256Gcm>(key.as_bytes(), &nonce, plaintext),
        CipherId::Aes128Gcm => seal::<Aes128Gcm>(key.as_bytes(), &nonce, plaintext),
        CipherId::ChaCha20Poly1305 => seal::<ChaCha20Poly1305>(key.as_bytes(), &nonce, plaintext),
    }?;

    Ok(EncryptedPayload { nonce, ciphertext })
}

/// Decrypts and authenticates `ciphertext`.
///
/// Fails with [`CryptoError::AuthenticationFailed`] when the tag does not
/// verify, whatever the cause (wrong key, wrong nonce, altered bytes).
pub fn decrypt(
    nonce: &[u8],
    ciphertext: &[u8],
    key: &DataKey,
    cipher: CipherId,
) -> CryptoResult<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonceLength {
            expected: NONCE_SIZE,
            actual: nonce.len(),
        });
    }
    check_key(key, cipher)?;

    match cipher {
        CipherId::Aes256Gcm => open::<Aes256Gcm>(key.as_bytes(), nonce, ciphertext),
        CipherId::Aes128Gcm => open::<Aes128Gcm>(key.as_bytes(), nonce, ciphertext),
        CipherId::ChaCha20Poly1305 => open::<ChaCha20Poly1305>(key.as_bytes(), nonce, ciphertext),
    }
}

fn check_key(key: &DataKey, cipher: CipherId) -> CryptoResult<()> {
    if key.len() != cipher.key_len() {
        return Err(CryptoError::InvalidKeyLength {
            cipher: cipher.as_str(),
            expected: cipher.key_len(),
            actual: key.len(),
        });
    }
    Ok(())
}

fn seal<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

fn open<C>(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

//! DEK wrapping through an external Key Management Service.
//!
//! The KMS is reached through the [`KmsClient`] capability. [`KeyWrapper`]
//! binds a client to the configured master key and translates KMS failures
//! into the vault error taxonomy. Unwrapped DEKs are returned as
//! [`DataKey`]s and never stored.

use crate::auth::{StaticToken, TokenSource};
use crate::config::{KmsKeyRef, VaultConfig};
use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cyberguard_crypto::{decrypt, encrypt, generate_key, CipherId, DataKey, NONCE_SIZE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

/// Default Cloud KMS REST endpoint.
pub const CLOUD_KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com";

/// Failures reported by a KMS backend.
#[derive(Debug, Error)]
pub enum KmsError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Symmetric encrypt/decrypt under a named master key.
#[async_trait]
pub trait KmsClient: Send + Sync {
    async fn encrypt(&self, key: &KmsKeyRef, plaintext: &[u8]) -> Result<Vec<u8>, KmsError>;

    async fn decrypt(&self, key: &KmsKeyRef, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError>;
}

// ============================================================================
// KeyWrapper
// ============================================================================

/// Wraps and unwraps DEKs under the configured master key.
#[derive(Clone)]
pub struct KeyWrapper {
    kms: Arc<dyn KmsClient>,
    config: VaultConfig,
}

impl KeyWrapper {
    pub fn new(kms: Arc<dyn KmsClient>, config: VaultConfig) -> Self {
        Self { kms, config }
    }

    /// Encrypts a DEK with the KMS master key.
    pub async fn wrap(&self, dek: &DataKey) -> VaultResult<Vec<u8>> {
        let key_ref = self.config.kms_key_ref()?;

        let wrapped = self
            .kms
            .encrypt(&key_ref, dek.as_bytes())
            .await
            .map_err(|e| match e {
                KmsError::KeyNotFound(msg) => {
                    VaultError::KmsConfiguration(format!("{key_ref} cannot be resolved: {msg}"))
                }
                other => VaultError::KmsWrapFailed(other.to_string()),
            })?;

        debug!("wrapped {}-bit DEK under {key_ref}", dek.bits());
        Ok(wrapped)
    }

    /// Recovers a DEK from its wrapped form.
    pub async fn unwrap(&self, wrapped_dek: &[u8]) -> VaultResult<DataKey> {
        let key_ref = self.config.kms_key_ref()?;

        let bytes = self
            .kms
            .decrypt(&key_ref, wrapped_dek)
            .await
            .map_err(|e| VaultError::KmsUnwrapFailed(e.to_string()))?;

        let dek = DataKey::from_bytes(bytes)
            .map_err(|e| VaultError::KmsUnwrapFailed(format!("unwrapped key unusable: {e}")))?;

        debug!("unwrapped {}-bit DEK under {key_ref}", dek.bits());
        Ok(dek)
    }
}

// ============================================================================
// Cloud KMS (REST)
// ============================================================================

#[derive(Serialize)]
struct EncryptRequest<'a> {
    plaintext: &'a str,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Cloud KMS client speaking the v1 REST API.
pub struct CloudKmsClient {
    client: Client,
    endpoint: String,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl CloudKmsClient {
    pub fn new(endpoint: impl Into<String>) -> VaultResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens: None,
        })
    }

    /// Attaches a fixed OAuth access token to every request.
    pub fn with_bearer_token(self, token: impl Into<String>) -> Self {
        self.with_token_source(Arc::new(StaticToken::new(token)))
    }

    /// Asks `tokens` for a bearer token before every request.
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    async fn call<B, R>(&self, key: &KmsKeyRef, verb: &str, body: &B) -> Result<R, KmsError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/v1/{}:{verb}", self.endpoint, key.resource_name());
        let mut req = self.client.post(&url).json(body);
        if let Some(ref tokens) = self.tokens {
            let token = tokens
                .access_token()
                .await
                .map_err(|e| KmsError::PermissionDenied(e.to_string()))?;
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| KmsError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => KmsError::KeyNotFound(key.resource_name()),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    KmsError::PermissionDenied(format!("{status}: {detail}"))
                }
                _ => KmsError::Rejected(format!("{status}: {detail}")),
            });
        }

        resp.json()
            .await
            .map_err(|e| KmsError::Transport(format!("invalid {verb} response: {e}")))
    }
}

#[async_trait]
impl KmsClient for CloudKmsClient {
    async fn encrypt(&self, key: &KmsKeyRef, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let encoded = Zeroizing::new(BASE64.encode(plaintext));
        let resp: EncryptResponse = self
            .call(key, "encrypt", &EncryptRequest {
                plaintext: encoded.as_str(),
            })
            .await?;

        BASE64
            .decode(resp.ciphertext)
            .map_err(|e| KmsError::Transport(format!("ciphertext is not base64: {e}")))
    }

    async fn decrypt(&self, key: &KmsKeyRef, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let encoded = BASE64.encode(ciphertext);
        let resp: DecryptResponse = self
            .call(key, "decrypt", &DecryptRequest {
                ciphertext: &encoded,
            })
            .await?;

        let encoded = Zeroizing::new(resp.plaintext);
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| KmsError::Transport(format!("plaintext is not base64: {e}")))
    }
}

// ============================================================================
// LocalKms
// ============================================================================

/// In-process KMS holding a random AES-256-GCM master key.
///
/// For local development and tests. Wrapped output is `nonce || ciphertext`.
pub struct LocalKms {
    master: DataKey,
    key_name: Option<String>,
}

impl LocalKms {
    /// Accepts any key reference.
    pub fn generate() -> VaultResult<Self> {
        Ok(Self {
            master: generate_key(256)?,
            key_name: None,
        })
    }

    /// Only resolves the given key; any other reference is `KeyNotFound`.
    pub fn for_key(key: &KmsKeyRef) -> VaultResult<Self> {
        Ok(Self {
            master: generate_key(256)?,
            key_name: Some(key.resource_name()),
        })
    }

    fn check(&self, key: &KmsKeyRef) -> Result<(), KmsError> {
        match self.key_name {
            Some(ref name) if *name != key.resource_name() => {
                Err(KmsError::KeyNotFound(key.resource_name()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KmsClient for LocalKms {
    async fn encrypt(&self, key: &KmsKeyRef, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        self.check(key)?;
        let sealed = encrypt(plaintext, &self.master, CipherId::Aes256Gcm)
            .map_err(|e| KmsError::Rejected(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.ciphertext.len());
        out.extend_from_slice(&sealed.nonce);
        out.extend_from_slice(&sealed.ciphertext);
        Ok(out)
    }

    async fn decrypt(&self, key: &KmsKeyRef, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        self.check(key)?;
        if ciphertext.len() < NONCE_SIZE {
            return Err(KmsError::Rejected("wrapped key too short".to_string()));
        }
        let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
        decrypt(nonce, body, &self.master, CipherId::Aes256Gcm)
            .map_err(|e| KmsError::Rejected(e.to_string()))
    }
}

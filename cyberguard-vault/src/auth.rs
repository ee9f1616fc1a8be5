//! OAuth access tokens for the Google REST adapters.
//!
//! [`CloudKmsClient`](crate::kms::CloudKmsClient) and
//! [`FirestoreDocumentStore`](crate::ledger::FirestoreDocumentStore) ask a
//! [`TokenSource`] for a bearer token on every request. [`CachedTokenSource`]
//! keeps one token and refreshes it shortly before it expires.

use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// GCE/GKE metadata server token endpoint.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Default refresh margin before expiry.
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 300;

/// A bearer token and when it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(secs) >= self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies a currently valid bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> VaultResult<String>;
}

/// Obtains a fresh token from an identity provider.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> VaultResult<AccessToken>;
}

/// A fixed token, e.g. from `gcloud auth print-access-token`.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> VaultResult<String> {
        Ok(self.0.clone())
    }
}

/// Caches a fetched token and refreshes it within `refresh_margin_secs` of expiry.
pub struct CachedTokenSource {
    fetcher: Arc<dyn TokenFetcher>,
    current: RwLock<Option<AccessToken>>,
    refresh_margin_secs: i64,
}

impl CachedTokenSource {
    pub fn new(fetcher: Arc<dyn TokenFetcher>, refresh_margin_secs: i64) -> Self {
        Self {
            fetcher,
            current: RwLock::new(None),
            refresh_margin_secs,
        }
    }

    /// Forces a refresh.
    pub async fn refresh(&self) -> VaultResult<AccessToken> {
        let fresh = self.fetcher.fetch().await.map_err(|e| {
            warn!("access token refresh failed: {e}");
            e
        })?;
        debug!("refreshed access token, expires at {}", fresh.expires_at);

        *self.current.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drops the cached token.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    pub async fn has_valid_token(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|t| !t.expires_within_secs(self.refresh_margin_secs))
    }
}

#[async_trait]
impl TokenSource for CachedTokenSource {
    async fn access_token(&self) -> VaultResult<String> {
        {
            let current = self.current.read().await;
            if let Some(ref t) = *current {
                if !t.expires_within_secs(self.refresh_margin_secs) {
                    return Ok(t.token.clone());
                }
                debug!("access token expiring within {}s, refreshing", self.refresh_margin_secs);
            }
        }

        Ok(self.refresh().await?.token)
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Fetches service-account tokens from the instance metadata server.
pub struct MetadataServerFetcher {
    client: Client,
    url: String,
}

impl MetadataServerFetcher {
    pub fn new(url: impl Into<String>) -> VaultResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenFetcher for MetadataServerFetcher {
    async fn fetch(&self) -> VaultResult<AccessToken> {
        let resp = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(VaultError::Auth(format!(
                "metadata server returned {status}: {detail}"
            )));
        }

        let body: MetadataTokenResponse = resp.json().await?;
        Ok(AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }
}

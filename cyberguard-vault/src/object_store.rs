//! Ciphertext blob storage.
//!
//! The vault only needs opaque put/get by object name within one bucket.
//! No retries are performed here.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Content type used for ciphertext uploads.
pub const CIPHERTEXT_CONTENT_TYPE: &str = "application/octet-stream";

/// User metadata attached to an object.
pub type ObjectMetadata = HashMap<String, String>;

/// Blob put/get by name.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        object_name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> VaultResult<()>;

    /// Fails with [`VaultError::ObjectNotFound`] when nothing is stored under `object_name`.
    async fn get(&self, object_name: &str) -> VaultResult<Vec<u8>>;
}

// ============================================================================
// In-memory
// ============================================================================

/// A stored blob with its upload attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: ObjectMetadata,
}

/// Thread-safe in-memory object store.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored object and its attributes.
    pub async fn head(&self, object_name: &str) -> Option<StoredObject> {
        self.objects.read().await.get(object_name).cloned()
    }

    pub async fn remove(&self, object_name: &str) -> Option<StoredObject> {
        self.objects.write().await.remove(object_name)
    }

    pub async fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        object_name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> VaultResult<()> {
        self.objects.write().await.insert(
            object_name.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn get(&self, object_name: &str) -> VaultResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(object_name)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| VaultError::ObjectNotFound(object_name.to_string()))
    }
}

// ============================================================================
// S3-compatible
// ============================================================================

/// Static access keys for an S3-compatible endpoint.
///
/// For GCS these are HMAC interoperability keys.
#[derive(Clone)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Object store backed by any S3-compatible API.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(
        bucket: String,
        region: String,
        endpoint_override: Option<String>,
        creds: &StorageCredentials,
    ) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            &creds.access_key_id,
            &creds.secret_access_key,
            creds.session_token.clone(),
            None,
            "cyberguard-static",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(ref endpoint) = endpoint_override {
            config_builder = config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(config_builder.build()),
            bucket,
        }
    }

    /// Store for the bucket named by `config.bucket_name`.
    pub fn from_config(
        config: &VaultConfig,
        region: String,
        endpoint_override: Option<String>,
        creds: &StorageCredentials,
    ) -> Self {
        Self::new(config.bucket_name.clone(), region, endpoint_override, creds)
    }

    /// Uses an already-configured client.
    pub fn from_client(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        object_name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> VaultResult<()> {
        let size = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .content_type(content_type)
            .set_metadata(Some(metadata.clone()))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| VaultError::ObjectStore(format!("upload failed for {object_name}: {e}")))?;

        debug!("uploaded {size} bytes to s3://{}/{object_name}", self.bucket);
        Ok(())
    }

    async fn get(&self, object_name: &str) -> VaultResult<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    VaultError::ObjectNotFound(object_name.to_string())
                } else {
                    VaultError::ObjectStore(format!(
                        "download failed for {object_name}: {service_err}"
                    ))
                }
            })?;

        let body = resp.body.collect().await.map_err(|e| {
            VaultError::ObjectStore(format!("failed to read body for {object_name}: {e}"))
        })?;

        let bytes = body.into_bytes().to_vec();
        debug!(
            "downloaded {} bytes from s3://{}/{object_name}",
            bytes.len(),
            self.bucket
        );
        Ok(bytes)
    }
}

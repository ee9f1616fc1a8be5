//! Shared test helpers: in-memory backends with call counters.

#![allow(dead_code)]

use async_trait::async_trait;
use cyberguard_vault::object_store::ObjectMetadata;
use cyberguard_vault::{
    EncryptionOrchestrator, InMemoryDocumentStore, InMemoryObjectStore, KmsClient, KmsError,
    KmsKeyRef, LocalKms, ObjectStore, VaultConfig, VaultResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("cyberguard_vault=debug"))
        .with_test_writer()
        .try_init();
}

/// Config with every KMS field populated.
pub fn test_config() -> VaultConfig {
    VaultConfig {
        bucket_name: "test-sanitized-files".into(),
        kms_project: "cyberguard-test".into(),
        kms_location: "global".into(),
        kms_keyring: "file-vault".into(),
        kms_key: "dek-wrapper".into(),
        ledger_collection: "file_storage_metadata".into(),
    }
}

pub fn test_key_ref() -> KmsKeyRef {
    test_config().kms_key_ref().expect("test config resolves")
}

/// Object store that counts calls before delegating to memory.
#[derive(Default)]
pub struct CountingObjectStore {
    pub inner: InMemoryObjectStore,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
}

impl CountingObjectStore {
    pub fn calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst) + self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingObjectStore {
    async fn put(
        &self,
        object_name: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> VaultResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(object_name, data, content_type, metadata).await
    }

    async fn get(&self, object_name: &str) -> VaultResult<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(object_name).await
    }
}

/// KMS that counts calls before delegating to a [`LocalKms`].
pub struct CountingKms {
    pub inner: LocalKms,
    pub encrypts: AtomicUsize,
    pub decrypts: AtomicUsize,
}

impl CountingKms {
    pub fn new() -> Self {
        Self {
            inner: LocalKms::generate().expect("local kms"),
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst) + self.decrypts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KmsClient for CountingKms {
    async fn encrypt(&self, key: &KmsKeyRef, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(key, plaintext).await
    }

    async fn decrypt(&self, key: &KmsKeyRef, ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(key, ciphertext).await
    }
}

/// KMS that rejects every request with the given error.
pub struct FailingKms(pub fn() -> KmsError);

#[async_trait]
impl KmsClient for FailingKms {
    async fn encrypt(&self, _key: &KmsKeyRef, _plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        Err((self.0)())
    }

    async fn decrypt(&self, _key: &KmsKeyRef, _ciphertext: &[u8]) -> Result<Vec<u8>, KmsError> {
        Err((self.0)())
    }
}

/// An orchestrator over counting in-memory backends.
pub struct Harness {
    pub orchestrator: EncryptionOrchestrator,
    pub kms: Arc<CountingKms>,
    pub objects: Arc<CountingObjectStore>,
    pub docs: InMemoryDocumentStore,
    pub config: VaultConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: VaultConfig) -> Self {
        let kms = Arc::new(CountingKms::new());
        let objects = Arc::new(CountingObjectStore::default());
        let docs = InMemoryDocumentStore::new();
        let orchestrator = EncryptionOrchestrator::new(
            config.clone(),
            kms.clone(),
            objects.clone(),
            Arc::new(docs.clone()),
        );
        Self {
            orchestrator,
            kms,
            objects,
            docs,
            config,
        }
    }

    /// Same object and document stores, different KMS.
    pub fn with_kms(&self, kms: Arc<dyn KmsClient>) -> EncryptionOrchestrator {
        EncryptionOrchestrator::new(
            self.config.clone(),
            kms,
            self.objects.clone(),
            Arc::new(self.docs.clone()),
        )
    }
}

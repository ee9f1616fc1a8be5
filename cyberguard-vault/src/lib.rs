//! Encrypted file vault for CyberGuard.
//!
//! Stores files under sensitivity-adaptive envelope encryption:
//! - Cipher and key size chosen from the classifier's sensitivity score
//! - Per-file DEK wrapped by an external KMS master key
//! - Ciphertext in an S3-compatible object store
//! - Recoverable metadata in a document store, verified by SHA-256 on read
//!
//! All external services are injected as trait objects
//! ([`KmsClient`], [`ObjectStore`], [`DocumentStore`]) so the
//! [`EncryptionOrchestrator`] holds no global state.

pub mod auth;
pub mod config;
pub mod error;
pub mod kms;
pub mod ledger;
pub mod naming;
pub mod object_store;
pub mod orchestrator;
pub mod types;

pub use auth::{CachedTokenSource, MetadataServerFetcher, StaticToken, TokenSource};
pub use config::{KmsKeyRef, VaultConfig};
pub use error::{VaultError, VaultResult};
pub use kms::{CloudKmsClient, KeyWrapper, KmsClient, KmsError, LocalKms};
pub use ledger::{DocumentStore, FirestoreDocumentStore, InMemoryDocumentStore, MetadataLedger};
pub use object_store::{InMemoryObjectStore, ObjectStore, S3ObjectStore, StorageCredentials};
pub use orchestrator::EncryptionOrchestrator;
pub use types::*;

//! End-to-end tests for encrypt-and-store / retrieve-and-decrypt over
//! in-memory backends.

mod support;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cyberguard_crypto::CipherId;
use cyberguard_vault::orchestrator::content_hash;
use cyberguard_vault::{
    DocumentStore, KmsError, ObjectStore, Provenance, VaultConfig, VaultError,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use support::{FailingKms, Harness};

const COLLECTION: &str = "file_storage_metadata";

// ── Round trip ──

#[tokio::test]
async fn roundtrip_high_sensitivity() {
    support::init_tracing();
    let h = Harness::new();
    let plaintext = b"SSN: 078-05-1120";

    let receipt = h
        .orchestrator
        .encrypt_and_store(plaintext, "customers.csv", 0.95, Provenance::default())
        .await
        .unwrap();
    assert_eq!(receipt.cipher_id, CipherId::Aes256Gcm);

    let file = h
        .orchestrator
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap();
    assert_eq!(file.plaintext, plaintext.to_vec());
    assert_eq!(file.record.original_filename, "customers.csv");
    assert_eq!(file.record.object_name, receipt.object_name);
    assert_eq!(file.record.document_id, receipt.document_id);
}

#[tokio::test]
async fn roundtrip_every_tier() {
    let h = Harness::new();
    let cases = [
        (0.9, CipherId::Aes256Gcm, "high.txt"),
        (0.6, CipherId::ChaCha20Poly1305, "medium.txt"),
        (0.3, CipherId::Aes128Gcm, "low.txt"),
    ];

    for (sensitivity, expected, name) in cases {
        let plaintext = format!("payload at {sensitivity}").into_bytes();
        let receipt = h
            .orchestrator
            .encrypt_and_store(&plaintext, name, sensitivity, Provenance::default())
            .await
            .unwrap();
        assert_eq!(receipt.cipher_id, expected);

        let file = h
            .orchestrator
            .retrieve_and_decrypt(&receipt.document_id)
            .await
            .unwrap();
        assert_eq!(file.plaintext, plaintext);
        assert_eq!(file.record.cipher_id, expected);
        assert_eq!(file.record.sensitivity, sensitivity);
    }
}

#[tokio::test]
async fn empty_file_roundtrips() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"", "empty.bin", 0.1, Provenance::default())
        .await
        .unwrap();
    let file = h
        .orchestrator
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap();
    assert!(file.plaintext.is_empty());
}

// ── Persisted layout ──

#[tokio::test]
async fn record_fields_are_persisted() {
    let h = Harness::new();
    let plaintext = b"record contents";
    let receipt = h
        .orchestrator
        .encrypt_and_store(
            plaintext,
            "report.pdf",
            0.7,
            Provenance::new("analyst-17", "sensitive-clf-2.3"),
        )
        .await
        .unwrap();

    let file = h
        .orchestrator
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap();
    let record = file.record;
    assert_eq!(record.nonce.len(), 12);
    assert!(!record.wrapped_dek.is_empty());
    assert_eq!(record.content_hash, content_hash(plaintext));
    assert_eq!(record.uploader_id.as_deref(), Some("analyst-17"));
    assert_eq!(record.model_version.as_deref(), Some("sensitive-clf-2.3"));
    assert_eq!(
        receipt.object_name,
        format!("sanitized/{}", receipt.document_id)
    );
    assert!(receipt.document_id.ends_with("_report.pdf"));
    assert_eq!(
        receipt.document_id,
        format!("{}_report.pdf", record.uploaded_at.timestamp())
    );
}

#[tokio::test]
async fn binary_fields_stored_as_base64() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"abc", "a.txt", 0.5, Provenance::default())
        .await
        .unwrap();

    let doc = h
        .docs
        .get(COLLECTION, &receipt.document_id)
        .await
        .unwrap()
        .expect("document written");

    let nonce = doc["nonce"].as_str().expect("nonce is a string");
    let wrapped = doc["wrapped_dek"].as_str().expect("wrapped_dek is a string");
    assert_eq!(BASE64.decode(nonce).unwrap().len(), 12);
    assert!(!BASE64.decode(wrapped).unwrap().is_empty());
    assert_eq!(doc["cipher_id"], Value::from("ChaCha20-Poly1305"));
    assert_eq!(doc["content_hash"], Value::from(content_hash(b"abc")));
    assert!(doc.get("uploader_id").is_none());
}

#[tokio::test]
async fn object_carries_sensitivity_and_cipher_metadata() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"abc", "meta.txt", 0.86, Provenance::default())
        .await
        .unwrap();

    let obj = h
        .objects
        .inner
        .head(&receipt.object_name)
        .await
        .expect("object uploaded");
    assert_eq!(obj.content_type, "application/octet-stream");
    assert_eq!(obj.metadata["sensitivity"], "0.86");
    assert_eq!(obj.metadata["cipher_id"], "AES-256-GCM");
    assert_ne!(obj.data, b"abc".to_vec());
}

#[tokio::test]
async fn ledger_view_reads_stored_record() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"ledger view", "view.txt", 0.2, Provenance::default())
        .await
        .unwrap();

    let ledger = h.orchestrator.ledger();
    assert_eq!(ledger.collection(), COLLECTION);
    let record = ledger.load(&receipt.document_id).await.unwrap().unwrap();
    assert_eq!(record.object_name, receipt.object_name);
    assert_eq!(record.cipher_id, CipherId::Aes128Gcm);
}

// ── Nonce uniqueness ──

#[tokio::test]
async fn same_plaintext_twice_gives_distinct_nonces_and_ciphertexts() {
    let h = Harness::new();
    let plaintext = b"identical upload";

    let first = h
        .orchestrator
        .encrypt_and_store(plaintext, "first.txt", 0.6, Provenance::default())
        .await
        .unwrap();
    let second = h
        .orchestrator
        .encrypt_and_store(plaintext, "second.txt", 0.6, Provenance::default())
        .await
        .unwrap();

    let a = h.orchestrator.retrieve_and_decrypt(&first.document_id).await.unwrap();
    let b = h.orchestrator.retrieve_and_decrypt(&second.document_id).await.unwrap();
    assert_ne!(a.record.nonce, b.record.nonce);
    assert_ne!(a.record.wrapped_dek, b.record.wrapped_dek);

    let blob_a = h.objects.inner.head(&first.object_name).await.unwrap().data;
    let blob_b = h.objects.inner.head(&second.object_name).await.unwrap().data;
    assert_ne!(blob_a, blob_b);
}

// ── Tamper detection ──

#[tokio::test]
async fn bit_flip_in_blob_is_authentication_failure() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"tamper target", "target.txt", 0.9, Provenance::default())
        .await
        .unwrap();

    let original = h.objects.inner.head(&receipt.object_name).await.unwrap();
    for byte in 0..original.data.len() {
        for bit in [0u8, 3, 7] {
            let mut data = original.data.clone();
            data[byte] ^= 1 << bit;
            h.objects
                .inner
                .put(&receipt.object_name, data, &original.content_type, &original.metadata)
                .await
                .unwrap();

            let err = h
                .orchestrator
                .retrieve_and_decrypt(&receipt.document_id)
                .await
                .unwrap_err();
            match err {
                VaultError::AuthenticationFailed { ref document_id } => {
                    assert_eq!(document_id, &receipt.document_id)
                }
                other => panic!("byte {byte} bit {bit}: expected AuthenticationFailed, got {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn swapped_blob_is_authentication_failure() {
    let h = Harness::new();
    let a = h
        .orchestrator
        .encrypt_and_store(b"file a", "a.txt", 0.9, Provenance::default())
        .await
        .unwrap();
    let b = h
        .orchestrator
        .encrypt_and_store(b"file b", "b.txt", 0.9, Provenance::default())
        .await
        .unwrap();

    let blob_b = h.objects.inner.head(&b.object_name).await.unwrap();
    h.objects
        .inner
        .put(&a.object_name, blob_b.data, &blob_b.content_type, &blob_b.metadata)
        .await
        .unwrap();

    let err = h.orchestrator.retrieve_and_decrypt(&a.document_id).await.unwrap_err();
    assert!(err.is_tampering());
    assert!(matches!(err, VaultError::AuthenticationFailed { .. }));
}

// ── Integrity mismatch ──

#[tokio::test]
async fn corrupted_content_hash_is_integrity_mismatch() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"hash me", "hashed.txt", 0.4, Provenance::default())
        .await
        .unwrap();

    let mut doc = h
        .docs
        .get(COLLECTION, &receipt.document_id)
        .await
        .unwrap()
        .unwrap();
    let bogus = "0".repeat(64);
    doc.insert("content_hash".into(), Value::from(bogus.clone()));
    h.docs.set(COLLECTION, &receipt.document_id, doc).await.unwrap();

    let err = h
        .orchestrator
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap_err();
    match err {
        VaultError::IntegrityMismatch {
            document_id,
            expected,
            actual,
        } => {
            assert_eq!(document_id, receipt.document_id);
            assert_eq!(expected, bogus);
            assert_eq!(actual, content_hash(b"hash me"));
        }
        other => panic!("expected IntegrityMismatch, got {other:?}"),
    }
}

// ── Missing data ──

#[tokio::test]
async fn missing_record_skips_object_store() {
    let h = Harness::new();
    let err = h
        .orchestrator
        .retrieve_and_decrypt("nonexistent-id")
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::RecordNotFound(ref id) if id == "nonexistent-id"));
    assert_eq!(err.http_status(), 404);
    assert_eq!(h.objects.calls(), 0);
    assert_eq!(h.kms.calls(), 0);
}

#[tokio::test]
async fn missing_blob_is_object_not_found() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"soon orphaned", "gone.txt", 0.2, Provenance::default())
        .await
        .unwrap();
    h.objects.inner.remove(&receipt.object_name).await;

    let err = h
        .orchestrator
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::ObjectNotFound(ref name) if *name == receipt.object_name));
    assert!(err.is_not_found());
    assert!(!err.is_tampering());
    // Fails before any unwrap is attempted.
    assert_eq!(h.kms.decrypts.load(Ordering::SeqCst), 0);
}

// ── Invalid input ──

#[tokio::test]
async fn invalid_sensitivity_fails_before_any_io() {
    let h = Harness::new();
    for sensitivity in [1.5, -0.1, f64::NAN] {
        let err = h
            .orchestrator
            .encrypt_and_store(b"data", "x.txt", sensitivity, Provenance::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidSensitivity(_)));
        assert_eq!(err.http_status(), 400);
    }
    assert_eq!(h.kms.calls(), 0);
    assert_eq!(h.objects.calls(), 0);
    assert!(h.docs.is_empty().await);
}

// ── Filename sanitization ──

#[tokio::test]
async fn path_traversal_is_stripped_from_object_name() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"root:x:0:0", "../../etc/passwd", 0.5, Provenance::default())
        .await
        .unwrap();

    assert!(receipt.object_name.starts_with("sanitized/"));
    assert!(receipt.object_name.ends_with("_passwd"));
    assert!(!receipt.object_name.contains(".."));
    assert!(!receipt.object_name.contains("etc/"));
    assert!(!receipt.document_id.contains('/'));

    let file = h
        .orchestrator
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap();
    assert_eq!(file.record.original_filename, "../../etc/passwd");
}

// ── KMS failures ──

#[tokio::test]
async fn unconfigured_kms_fails_before_upload() {
    let h = Harness::with_config(VaultConfig {
        kms_project: String::new(),
        ..support::test_config()
    });

    let err = h
        .orchestrator
        .encrypt_and_store(b"data", "x.txt", 0.9, Provenance::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KmsConfiguration(ref msg) if msg.contains("kms_project")));
    assert_eq!(h.objects.calls(), 0);
    assert!(h.docs.is_empty().await);
}

#[tokio::test]
async fn unresolvable_key_is_configuration_error() {
    let h = Harness::new();
    let orchestrator =
        h.with_kms(Arc::new(FailingKms(|| KmsError::KeyNotFound("no such key".into()))));

    let err = orchestrator
        .encrypt_and_store(b"data", "x.txt", 0.9, Provenance::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KmsConfiguration(_)));
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn kms_rejection_on_unwrap_is_unwrap_failure() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"data", "x.txt", 0.9, Provenance::default())
        .await
        .unwrap();

    let denied =
        h.with_kms(Arc::new(FailingKms(|| KmsError::PermissionDenied("key disabled".into()))));
    let err = denied
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KmsUnwrapFailed(ref msg) if msg.contains("key disabled")));
}

#[tokio::test]
async fn different_master_key_cannot_unwrap() {
    let h = Harness::new();
    let receipt = h
        .orchestrator
        .encrypt_and_store(b"data", "x.txt", 0.6, Provenance::default())
        .await
        .unwrap();

    let other = h.with_kms(Arc::new(cyberguard_vault::LocalKms::generate().unwrap()));
    let err = other
        .retrieve_and_decrypt(&receipt.document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::KmsUnwrapFailed(_)));
}

// ── Known gaps ──

#[tokio::test]
async fn orphaned_blob_left_when_ledger_write_fails() {
    use async_trait::async_trait;
    use cyberguard_vault::ledger::Document;
    use cyberguard_vault::{EncryptionOrchestrator, VaultResult};

    struct BrokenLedger;

    #[async_trait]
    impl DocumentStore for BrokenLedger {
        async fn set(&self, _c: &str, _id: &str, _doc: Document) -> VaultResult<()> {
            Err(VaultError::Ledger("unavailable".into()))
        }
        async fn get(&self, _c: &str, _id: &str) -> VaultResult<Option<Document>> {
            Ok(None)
        }
    }

    let h = Harness::new();
    let orchestrator = EncryptionOrchestrator::new(
        h.config.clone(),
        h.kms.clone(),
        h.objects.clone(),
        Arc::new(BrokenLedger),
    );

    let err = orchestrator
        .encrypt_and_store(b"data", "orphan.txt", 0.5, Provenance::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Ledger(_)));
    assert_eq!(h.objects.inner.len().await, 1);
}

#[tokio::test]
async fn concurrent_stores_are_independent() {
    let h = Harness::new();
    let uploads = (0..16).map(|i| {
        let orchestrator = h.orchestrator.clone();
        async move {
            let plaintext = format!("concurrent payload {i}").into_bytes();
            let receipt = orchestrator
                .encrypt_and_store(&plaintext, &format!("file-{i}.txt"), (i as f64) / 16.0, Provenance::default())
                .await
                .unwrap();
            (plaintext, receipt)
        }
    });
    let stored = futures::future::join_all(uploads).await;

    let reads = stored.iter().map(|(_, receipt)| {
        h.orchestrator.retrieve_and_decrypt(&receipt.document_id)
    });
    let retrieved = futures::future::join_all(reads).await;

    for ((plaintext, _), file) in stored.iter().zip(retrieved) {
        assert_eq!(&file.unwrap().plaintext, plaintext);
    }
    assert_eq!(h.docs.len().await, 16);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_payload_roundtrips(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
        sensitivity in 0.0f64..=1.0,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let recovered = rt.block_on(async {
            let h = Harness::new();
            let receipt = h
                .orchestrator
                .encrypt_and_store(&plaintext, "prop.bin", sensitivity, Provenance::default())
                .await
                .unwrap();
            h.orchestrator
                .retrieve_and_decrypt(&receipt.document_id)
                .await
                .unwrap()
                .plaintext
        });
        prop_assert_eq!(recovered, plaintext);
    }
}

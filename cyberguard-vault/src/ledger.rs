//! Per-file metadata records in a document store.
//!
//! Documents are flat maps of strings and numbers. Binary fields
//! (`wrapped_dek`, `nonce`) cross this boundary as standard padded base64:
//! [`MetadataLedger`] encodes on save and decodes on load, so backends never
//! see raw bytes.

use crate::auth::{StaticToken, TokenSource};
use crate::error::{VaultError, VaultResult};
use crate::types::FileRecord;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use cyberguard_crypto::CipherId;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A flat document: field name to string/number/bool/null.
pub type Document = Map<String, Value>;

/// Default Firestore REST endpoint.
pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Document put/get by id within a collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes `doc` under `id`, replacing any existing document.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> VaultResult<()>;

    async fn get(&self, collection: &str, id: &str) -> VaultResult<Option<Document>>;
}

// ============================================================================
// MetadataLedger
// ============================================================================

/// Persisted layout of a [`FileRecord`].
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    original_filename: String,
    object_name: String,
    wrapped_dek: String,
    nonce: String,
    cipher_id: String,
    sensitivity: f64,
    content_hash: String,
    uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uploader_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
}

/// Reads and writes [`FileRecord`]s in one collection.
#[derive(Clone)]
pub struct MetadataLedger {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl MetadataLedger {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Upserts the record under `document_id` (last write wins).
    pub async fn save(&self, document_id: &str, record: &FileRecord) -> VaultResult<()> {
        let doc = encode_record(record)?;
        self.store.set(&self.collection, document_id, doc).await?;
        debug!("saved metadata {}/{document_id}", self.collection);
        Ok(())
    }

    pub async fn load(&self, document_id: &str) -> VaultResult<Option<FileRecord>> {
        let Some(doc) = self.store.get(&self.collection, document_id).await? else {
            debug!("no metadata at {}/{document_id}", self.collection);
            return Ok(None);
        };
        decode_record(document_id, doc).map(Some)
    }
}

/// Converts a record into its flat, base64-encoded document form.
pub fn encode_record(record: &FileRecord) -> VaultResult<Document> {
    let stored = StoredRecord {
        original_filename: record.original_filename.clone(),
        object_name: record.object_name.clone(),
        wrapped_dek: BASE64.encode(&record.wrapped_dek),
        nonce: BASE64.encode(&record.nonce),
        cipher_id: record.cipher_id.as_str().to_string(),
        sensitivity: record.sensitivity,
        content_hash: record.content_hash.clone(),
        uploaded_at: record.uploaded_at,
        uploader_id: record.uploader_id.clone(),
        model_version: record.model_version.clone(),
    };

    match serde_json::to_value(stored)? {
        Value::Object(map) => Ok(map),
        other => Err(VaultError::Ledger(format!(
            "record encoded to non-object: {other}"
        ))),
    }
}

/// Inverse of [`encode_record`].
pub fn decode_record(document_id: &str, doc: Document) -> VaultResult<FileRecord> {
    let corrupt = |reason: String| VaultError::CorruptRecord {
        document_id: document_id.to_string(),
        reason,
    };

    let stored: StoredRecord =
        serde_json::from_value(Value::Object(doc)).map_err(|e| corrupt(e.to_string()))?;

    let cipher_id: CipherId = stored.cipher_id.parse()?;
    let wrapped_dek = BASE64
        .decode(&stored.wrapped_dek)
        .map_err(|e| corrupt(format!("wrapped_dek is not base64: {e}")))?;
    let nonce = BASE64
        .decode(&stored.nonce)
        .map_err(|e| corrupt(format!("nonce is not base64: {e}")))?;

    Ok(FileRecord {
        document_id: document_id.to_string(),
        original_filename: stored.original_filename,
        object_name: stored.object_name,
        wrapped_dek,
        nonce,
        cipher_id,
        sensitivity: stored.sensitivity,
        content_hash: stored.content_hash,
        uploaded_at: stored.uploaded_at,
        uploader_id: stored.uploader_id,
        model_version: stored.model_version,
    })
}

// ============================================================================
// In-memory
// ============================================================================

/// Thread-safe in-memory document store.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<HashMap<(String, String), Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn set(&self, collection: &str, id: &str, doc: Document) -> VaultResult<()> {
        self.docs
            .write()
            .await
            .insert((collection.to_string(), id.to_string()), doc);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> VaultResult<Option<Document>> {
        Ok(self
            .docs
            .read()
            .await
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }
}

// ============================================================================
// Firestore (REST)
// ============================================================================

#[derive(Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Firestore client speaking the v1 REST API.
pub struct FirestoreDocumentStore {
    client: Client,
    base_url: String,
    project_id: String,
    database: String,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl FirestoreDocumentStore {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> VaultResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            project_id: project_id.into(),
            database: "(default)".to_string(),
            tokens: None,
        })
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_bearer_token(self, token: impl Into<String>) -> Self {
        self.with_token_source(Arc::new(StaticToken::new(token)))
    }

    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    fn document_url(&self, collection: &str, id: &str) -> VaultResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| VaultError::Ledger(format!("invalid base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| VaultError::Ledger(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
                collection,
                id,
            ]);
        Ok(url)
    }

    async fn authorize(
        &self,
        req: reqwest::RequestBuilder,
    ) -> VaultResult<reqwest::RequestBuilder> {
        match self.tokens {
            Some(ref tokens) => Ok(req.bearer_auth(tokens.access_token().await?)),
            None => Ok(req),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn set(&self, collection: &str, id: &str, doc: Document) -> VaultResult<()> {
        let url = self.document_url(collection, id)?;
        let fields = doc
            .iter()
            .map(|(k, v)| Ok((k.clone(), to_firestore_value(k, v)?)))
            .collect::<VaultResult<Map<String, Value>>>()?;

        let resp = self
            .authorize(self.client.patch(url))
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(VaultError::Ledger(format!(
                "write {collection}/{id} failed: {status}: {detail}"
            )));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> VaultResult<Option<Document>> {
        let url = self.document_url(collection, id)?;
        let resp = self.authorize(self.client.get(url)).await?.send().await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(VaultError::Ledger(format!(
                "read {collection}/{id} failed: {status}: {detail}"
            )));
        }

        let body: FirestoreDocument = resp.json().await?;
        body.fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), from_firestore_value(k, v)?)))
            .collect::<VaultResult<Document>>()
            .map(Some)
    }
}

/// Encodes a flat JSON value as a typed Firestore value.
pub fn to_firestore_value(field: &str, value: &Value) -> VaultResult<Value> {
    Ok(match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n.as_f64() }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(_) | Value::Object(_) => {
            return Err(VaultError::Ledger(format!(
                "field {field} is nested; documents must be flat"
            )));
        }
    })
}

/// Decodes a typed Firestore value into a flat JSON value.
pub fn from_firestore_value(field: &str, value: &Value) -> VaultResult<Value> {
    let unsupported = || VaultError::Ledger(format!("field {field} has unsupported type: {value}"));
    let typed = value.as_object().ok_or_else(unsupported)?;
    let (kind, inner) = typed.iter().next().ok_or_else(unsupported)?;

    match kind.as_str() {
        "stringValue" | "timestampValue" => Ok(inner.clone()),
        "booleanValue" | "doubleValue" => Ok(inner.clone()),
        "nullValue" => Ok(Value::Null),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .or_else(|| inner.as_i64().map(Value::from))
            .ok_or_else(unsupported),
        _ => Err(unsupported()),
    }
}

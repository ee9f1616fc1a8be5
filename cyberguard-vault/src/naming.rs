//! Object and document naming.
//!
//! Both identifiers derive from the upload time (whole seconds) and the
//! sanitized filename. Two uploads of the same name within one second map
//! to the same ids; the later write wins.

use chrono::{DateTime, Utc};

/// Prefix under which all ciphertext blobs are stored.
pub const OBJECT_PREFIX: &str = "sanitized";

/// Replacement for filenames with no usable final component.
const FALLBACK_NAME: &str = "unnamed";

/// Keeps only the final path component of a caller-supplied filename.
///
/// Splits on both `/` and `\` so neither Unix nor Windows style traversal
/// sequences survive into an object name.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    match base {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Object key for a ciphertext blob: `sanitized/{ts}_{name}`.
pub fn object_name(uploaded_at: DateTime<Utc>, safe_name: &str) -> String {
    format!("{OBJECT_PREFIX}/{}", document_id(uploaded_at, safe_name))
}

/// Ledger document id: `{ts}_{name}`.
pub fn document_id(uploaded_at: DateTime<Utc>, safe_name: &str) -> String {
    format!("{}_{safe_name}", uploaded_at.timestamp())
}

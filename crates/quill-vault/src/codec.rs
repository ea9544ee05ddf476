//! Row/field codec shared by the encrypted repositories.
//!
//! Remote rows are JSON documents. Sensitive fields travel as envelope
//! strings in `*_encrypted` columns; their plaintext columns are null once
//! a row is encrypted. The helpers here translate between rows and the
//! in-memory record types and apply the fail-soft read policy: a field
//! whose envelope cannot be opened yields a sentinel plus a marker
//! instead of failing the whole batch.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use quill_core::{Error, Result};
use quill_crypto::{open_json, seal_json, CryptoError, DerivedKey};

/// Sentinel stored in a sensitive field whose envelope failed to open.
/// Consumers key off `decryption_error`, not this value.
pub const DECRYPTION_FAILED_SENTINEL: &str = "";

/// Convert a crypto failure into the workspace error type.
pub(crate) fn crypto_err(e: CryptoError) -> Error {
    Error::Crypto(e.to_string())
}

/// Seal one string field into an envelope. The payload is the JSON
/// encoding of the value, so the read path has a parse step with a real
/// failure mode.
pub(crate) fn seal_string(key: &DerivedKey, value: &str) -> Result<String> {
    seal_json(key, &JsonValue::String(value.to_string())).map_err(crypto_err)
}

/// Open one string field from an envelope (either wire layout).
pub(crate) fn open_string(key: &DerivedKey, envelope: &str) -> Result<String> {
    let value = open_json(key, envelope).map_err(crypto_err)?;
    match value {
        JsonValue::String(s) => Ok(s),
        other => Err(crypto_err(CryptoError::MalformedPayload(format!(
            "expected string payload, got {}",
            match other {
                JsonValue::Null => "null",
                JsonValue::Bool(_) => "bool",
                JsonValue::Number(_) => "number",
                JsonValue::Array(_) => "array",
                JsonValue::Object(_) => "object",
                JsonValue::String(_) => unreachable!(),
            }
        )))),
    }
}

/// Fail-soft open for list/load paths.
///
/// Returns `(plaintext, false)` on success and
/// `(sentinel, true)` when the envelope column is missing or cannot be
/// opened, so one corrupted row never blocks the rest of a batch.
pub(crate) fn open_string_soft(
    key: &DerivedKey,
    row: &JsonValue,
    enc_column: &str,
    table: &str,
) -> (String, bool) {
    let envelope = match row.get(enc_column).and_then(JsonValue::as_str) {
        Some(envelope) => envelope,
        None => {
            warn!(
                subsystem = "vault",
                component = "codec",
                table,
                column = enc_column,
                "Encrypted row is missing its envelope column - returning sentinel"
            );
            return (DECRYPTION_FAILED_SENTINEL.to_string(), true);
        }
    };

    match open_string(key, envelope) {
        Ok(plaintext) => (plaintext, false),
        Err(e) => {
            warn!(
                subsystem = "vault",
                component = "codec",
                table,
                column = enc_column,
                error = %e,
                "Field decryption failed - returning sentinel"
            );
            (DECRYPTION_FAILED_SENTINEL.to_string(), true)
        }
    }
}

// ─── Row accessors ─────────────────────────────────────────────────────────

fn column_err(column: &str, detail: &str) -> Error {
    Error::Serialization(format!("column `{}`: {}", column, detail))
}

pub(crate) fn get_str(row: &JsonValue, column: &str) -> Result<String> {
    row.get(column)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| column_err(column, "missing or not a string"))
}

pub(crate) fn get_uuid(row: &JsonValue, column: &str) -> Result<Uuid> {
    let raw = get_str(row, column)?;
    raw.parse()
        .map_err(|e| column_err(column, &format!("not a UUID: {}", e)))
}

pub(crate) fn get_opt_uuid(row: &JsonValue, column: &str) -> Result<Option<Uuid>> {
    match row.get(column) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(_) => get_uuid(row, column).map(Some),
    }
}

pub(crate) fn get_bool_or(row: &JsonValue, column: &str, default: bool) -> bool {
    row.get(column).and_then(JsonValue::as_bool).unwrap_or(default)
}

pub(crate) fn get_f32_or(row: &JsonValue, column: &str, default: f32) -> f32 {
    row.get(column)
        .and_then(JsonValue::as_f64)
        .map(|v| v as f32)
        .unwrap_or(default)
}

pub(crate) fn get_i32_or(row: &JsonValue, column: &str, default: i32) -> i32 {
    row.get(column)
        .and_then(JsonValue::as_i64)
        .map(|v| v as i32)
        .unwrap_or(default)
}

pub(crate) fn get_timestamp(row: &JsonValue, column: &str) -> Result<DateTime<Utc>> {
    let value = row
        .get(column)
        .ok_or_else(|| column_err(column, "missing"))?;
    serde_json::from_value(value.clone())
        .map_err(|e| column_err(column, &format!("not a timestamp: {}", e)))
}

pub(crate) fn get_opt_timestamp(row: &JsonValue, column: &str) -> Option<DateTime<Utc>> {
    match row.get(column) {
        None | Some(JsonValue::Null) => None,
        Some(value) => serde_json::from_value(value.clone()).ok(),
    }
}

pub(crate) fn get_string_array(row: &JsonValue, column: &str) -> Vec<String> {
    row.get(column)
        .and_then(JsonValue::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_crypto::{derive_key, Salt};
    use serde_json::json;

    fn test_key() -> DerivedKey {
        derive_key("u1", &Salt::from_bytes([0u8; 16]))
    }

    #[test]
    fn test_seal_open_string_roundtrip() {
        let key = test_key();
        let envelope = seal_string(&key, "hello").unwrap();
        assert_eq!(open_string(&key, &envelope).unwrap(), "hello");
    }

    #[test]
    fn test_open_string_rejects_non_string_payload() {
        let key = test_key();
        let envelope = seal_json(&key, &json!({"not": "a string"})).unwrap();
        let result = open_string(&key, &envelope);
        assert!(matches!(result, Err(Error::Crypto(_))));
    }

    #[test]
    fn test_open_string_soft_success() {
        let key = test_key();
        let envelope = seal_string(&key, "hello").unwrap();
        let row = json!({"content_encrypted": envelope});

        let (value, failed) = open_string_soft(&key, &row, "content_encrypted", "notes");
        assert_eq!(value, "hello");
        assert!(!failed);
    }

    #[test]
    fn test_open_string_soft_corrupt_envelope() {
        let key = test_key();
        let row = json!({"content_encrypted": "garbage envelope"});

        let (value, failed) = open_string_soft(&key, &row, "content_encrypted", "notes");
        assert_eq!(value, DECRYPTION_FAILED_SENTINEL);
        assert!(failed);
    }

    #[test]
    fn test_open_string_soft_missing_column() {
        let key = test_key();
        let row = json!({"id": "x"});

        let (value, failed) = open_string_soft(&key, &row, "content_encrypted", "notes");
        assert_eq!(value, DECRYPTION_FAILED_SENTINEL);
        assert!(failed);
    }

    #[test]
    fn test_row_accessors() {
        let id = uuid::Uuid::nil();
        let row = json!({
            "id": id,
            "flag": true,
            "confidence": 0.75,
            "count": 3,
            "created_at_utc": "2026-01-01T00:00:00Z",
            "tags": ["a", "b"],
        });

        assert_eq!(get_uuid(&row, "id").unwrap(), id);
        assert!(get_bool_or(&row, "flag", false));
        assert!(!get_bool_or(&row, "absent", false));
        assert!((get_f32_or(&row, "confidence", 0.0) - 0.75).abs() < f32::EPSILON);
        assert_eq!(get_i32_or(&row, "count", 0), 3);
        assert!(get_timestamp(&row, "created_at_utc").is_ok());
        assert_eq!(get_string_array(&row, "tags"), vec!["a", "b"]);
        assert!(get_string_array(&row, "absent").is_empty());
        assert_eq!(get_opt_uuid(&row, "absent").unwrap(), None);
    }

    #[test]
    fn test_get_str_missing_column() {
        let row = json!({});
        assert!(matches!(
            get_str(&row, "content"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_get_opt_timestamp_null() {
        let row = json!({"last_observed_at_utc": null});
        assert_eq!(get_opt_timestamp(&row, "last_observed_at_utc"), None);
    }
}

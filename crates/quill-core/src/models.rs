//! Core data models for quill.
//!
//! These types are shared across all quill crates and represent the
//! records held in the encrypted vault. Each record carries a set of
//! sensitive fields (stored remotely as one envelope per field) and a set
//! of plaintext metadata fields kept unencrypted for querying and sorting.
//!
//! In memory, records always hold plaintext: the vault layer decrypts on
//! load and encrypts on save. The `is_encrypted` flag mirrors the remote
//! row's state and distinguishes legacy plaintext rows from migrated ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// =============================================================================
// VAULT RECORDS
// =============================================================================

/// A captured note.
///
/// Sensitive: `content`. Everything else is plaintext metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: String,
    /// Capture source: "text", "voice", "import".
    pub source: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    /// Whether the remote row stores this record's sensitive fields as envelopes.
    pub is_encrypted: bool,
    /// Set when a sensitive field could not be decrypted on load; the field
    /// then holds a sentinel instead of plaintext.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub decryption_error: bool,
}

/// A person, place, or thing referenced from notes.
///
/// Sensitive: `name`, `summary` (each its own envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub user_id: String,
    /// Entity kind: "person", "place", "project", "topic".
    pub kind: String,
    pub name: String,
    pub summary: String,
    pub confidence: f32,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub decryption_error: bool,
}

/// An extracted fact about an entity, shaped as a predicate/object pair.
///
/// Sensitive: `object_value`. The predicate stays plaintext so facts can be
/// grouped and counted without a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: Uuid,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    /// Relation tag: "works_at", "birthday", "prefers".
    pub predicate: String,
    pub object_value: String,
    pub confidence: f32,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub decryption_error: bool,
}

/// A recurring behavioral pattern inferred from captured notes.
///
/// Sensitive: `description`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Uuid,
    pub user_id: String,
    /// Pattern kind: "habit", "mood", "routine".
    pub kind: String,
    pub description: String,
    pub confidence: f32,
    pub occurrence_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed_at_utc: Option<DateTime<Utc>>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub decryption_error: bool,
}

/// One message of a chat-style mirror conversation.
///
/// Sensitive: `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorMessage {
    pub id: Uuid,
    pub user_id: String,
    pub conversation_id: Uuid,
    /// Speaker role: "user" or "mirror".
    pub role: String,
    pub content: String,
    pub created_at_utc: DateTime<Utc>,
    pub is_encrypted: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub decryption_error: bool,
}

// =============================================================================
// MIGRATION TYPES
// =============================================================================

/// Per-table outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMigration {
    /// Rows matched by the `is_encrypted = false` filter.
    pub total: usize,
    /// Rows successfully encrypted in place.
    pub migrated: usize,
    /// Rows that failed; they stay plaintext and are retried on the next run.
    pub errors: usize,
}

/// Aggregated result of a `migrate` run, keyed by table name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    pub tables: BTreeMap<String, TableMigration>,
}

impl MigrationReport {
    /// Total rows migrated across all tables.
    pub fn total_migrated(&self) -> usize {
        self.tables.values().map(|t| t.migrated).sum()
    }

    /// Total per-row failures across all tables.
    pub fn total_errors(&self) -> usize {
        self.tables.values().map(|t| t.errors).sum()
    }
}

/// Read-only probe of how many plaintext rows remain per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnencryptedCounts {
    pub tables: BTreeMap<String, usize>,
}

impl UnencryptedCounts {
    /// True when no table has plaintext rows left.
    pub fn is_fully_migrated(&self) -> bool {
        self.tables.values().all(|&n| n == 0)
    }
}

// =============================================================================
// EXPORT TYPES
// =============================================================================

/// Export document format tag. Bump when the document shape changes.
pub const EXPORT_FORMAT: &str = "export/2";

/// Mirror messages grouped by conversation for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConversation {
    pub conversation_id: Uuid,
    pub messages: Vec<MirrorMessage>,
}

/// Decrypted record sets bundled into an export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportData {
    pub notes: Vec<Note>,
    pub entities: Vec<Entity>,
    pub facts: Vec<Fact>,
    pub patterns: Vec<Pattern>,
    pub mirror_conversations: Vec<MirrorConversation>,
}

/// One-shot, user-initiated export of everything a user owns.
///
/// The document is fully decrypted; `plaintext` marks that explicitly so a
/// consumer can never mistake it for ciphertext at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format: String,
    pub exported_at: DateTime<Utc>,
    pub plaintext: bool,
    pub data: ExportData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid_utils::new_v7;

    fn sample_note() -> Note {
        Note {
            id: new_v7(),
            user_id: "u1".to_string(),
            source: "text".to_string(),
            content: "hello".to_string(),
            tags: vec!["inbox".to_string()],
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
            is_encrypted: true,
            decryption_error: false,
        }
    }

    #[test]
    fn test_note_serde_roundtrip() {
        let note = sample_note();
        let json = serde_json::to_string(&note).unwrap();
        let parsed: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, note.id);
        assert_eq!(parsed.content, "hello");
        assert!(parsed.is_encrypted);
    }

    #[test]
    fn test_decryption_error_omitted_when_false() {
        let note = sample_note();
        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("decryption_error"));
    }

    #[test]
    fn test_decryption_error_defaults_false() {
        let json = r#"{
            "id": "0191b2c0-0000-7000-8000-000000000000",
            "user_id": "u1",
            "source": "text",
            "content": "x",
            "tags": [],
            "created_at_utc": "2026-01-01T00:00:00Z",
            "updated_at_utc": "2026-01-01T00:00:00Z",
            "is_encrypted": false
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert!(!note.decryption_error);
    }

    #[test]
    fn test_migration_report_totals() {
        let mut report = MigrationReport::default();
        report.tables.insert(
            "notes".to_string(),
            TableMigration {
                total: 5,
                migrated: 4,
                errors: 1,
            },
        );
        report.tables.insert(
            "facts".to_string(),
            TableMigration {
                total: 2,
                migrated: 2,
                errors: 0,
            },
        );
        assert_eq!(report.total_migrated(), 6);
        assert_eq!(report.total_errors(), 1);
    }

    #[test]
    fn test_unencrypted_counts_fully_migrated() {
        let mut counts = UnencryptedCounts::default();
        counts.tables.insert("notes".to_string(), 0);
        counts.tables.insert("entities".to_string(), 0);
        assert!(counts.is_fully_migrated());

        counts.tables.insert("facts".to_string(), 3);
        assert!(!counts.is_fully_migrated());
    }

    #[test]
    fn test_export_format_tag() {
        assert_eq!(EXPORT_FORMAT, "export/2");
    }
}

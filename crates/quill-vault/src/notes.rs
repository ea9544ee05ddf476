//! Encrypted note repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use quill_core::{
    new_v7, CreateNoteRequest, Error, ListOptions, Note, NoteRepository, RemoteStore, Result,
    SelectOptions, SortDir, UpdateNoteRequest,
};
use quill_crypto::DerivedKey;

use crate::codec::{
    get_bool_or, get_str, get_string_array, get_timestamp, get_uuid, open_string_soft, seal_string,
};
use crate::config::VaultConfig;
use crate::session::KeySession;

/// RemoteStore-backed implementation of [`NoteRepository`].
///
/// The store only ever receives the note body as an envelope in
/// `content_encrypted`; the plaintext `content` column exists solely for
/// legacy rows awaiting migration and is nulled the moment a row is
/// written encrypted.
pub struct VaultNoteRepository {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    table: String,
}

impl VaultNoteRepository {
    /// Create a note repository over the given store and session.
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<KeySession>, config: &VaultConfig) -> Self {
        Self {
            store,
            session,
            table: config.notes_table.clone(),
        }
    }

    fn decode_row(&self, key: &DerivedKey, row: &JsonValue) -> Result<Note> {
        let is_encrypted = get_bool_or(row, "is_encrypted", false);
        let (content, decryption_error) = if is_encrypted {
            open_string_soft(key, row, "content_encrypted", &self.table)
        } else {
            // Legacy plaintext row: passes through unchanged.
            (get_str(row, "content")?, false)
        };

        Ok(Note {
            id: get_uuid(row, "id")?,
            user_id: get_str(row, "user_id")?,
            source: get_str(row, "source")?,
            content,
            tags: get_string_array(row, "tags"),
            created_at_utc: get_timestamp(row, "created_at_utc")?,
            updated_at_utc: get_timestamp(row, "updated_at_utc")?,
            is_encrypted,
            decryption_error,
        })
    }
}

#[async_trait]
impl NoteRepository for VaultNoteRepository {
    async fn save(&self, req: CreateNoteRequest) -> Result<Note> {
        let key = self.session.require_key().await?;
        let id = new_v7();
        let now = Utc::now();
        let envelope = seal_string(&key, &req.content)?;

        let row = json!({
            "id": id,
            "user_id": req.user_id,
            "source": req.source,
            "content": JsonValue::Null,
            "content_encrypted": envelope,
            "tags": req.tags,
            "created_at_utc": now,
            "updated_at_utc": now,
            "is_encrypted": true,
        });
        self.store.insert(&self.table, row).await?;

        debug!(
            subsystem = "vault",
            component = "notes",
            op = "save",
            record_id = %id,
            "Saved encrypted note"
        );

        // Write-through: hand back the caller's plaintext rather than
        // decrypting what was just written.
        Ok(Note {
            id,
            user_id: req.user_id,
            source: req.source,
            content: req.content,
            tags: req.tags,
            created_at_utc: now,
            updated_at_utc: now,
            is_encrypted: true,
            decryption_error: false,
        })
    }

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        let key = self.session.require_key().await?;

        let mut patch = Map::new();
        if let Some(content) = &req.content {
            // Fresh IV per write; a patched legacy row comes out encrypted.
            patch.insert("content_encrypted".to_string(), json!(seal_string(&key, content)?));
            patch.insert("content".to_string(), JsonValue::Null);
            patch.insert("is_encrypted".to_string(), json!(true));
        }
        if let Some(tags) = &req.tags {
            patch.insert("tags".to_string(), json!(tags));
        }
        patch.insert("updated_at_utc".to_string(), json!(Utc::now()));

        let row = self
            .store
            .update(&self.table, &id.to_string(), JsonValue::Object(patch))
            .await?;
        self.decode_row(&key, &row)
    }

    async fn load(&self, id: Uuid) -> Result<Note> {
        let key = self.session.require_key().await?;
        let rows = self
            .store
            .select(&self.table, SelectOptions::new().eq("id", json!(id)).limit(1))
            .await?;
        let row = rows.first().ok_or_else(|| Error::RecordNotFound {
            table: self.table.clone(),
            id,
        })?;
        self.decode_row(&key, row)
    }

    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Note>> {
        let key = self.session.require_key().await?;

        let dir = if opts.newest_first {
            SortDir::Desc
        } else {
            SortDir::Asc
        };
        let mut select = SelectOptions::new()
            .eq("user_id", json!(user_id))
            .order_by("created_at_utc", dir)
            .offset(opts.offset);
        if let Some(limit) = opts.limit {
            select = select.limit(limit);
        }

        let rows = self.store.select(&self.table, select).await?;
        let mut notes = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.decode_row(&key, row) {
                Ok(note) => notes.push(note),
                // Decrypt failures already degrade inside decode_row; only
                // rows with broken plaintext metadata land here.
                Err(e) => warn!(
                    subsystem = "vault",
                    component = "notes",
                    op = "load_many",
                    error = %e,
                    "Skipping note row with undecodable metadata"
                ),
            }
        }
        Ok(notes)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.session.require_key().await?;
        self.store.delete(&self.table, &id.to_string()).await
    }
}

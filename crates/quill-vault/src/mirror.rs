//! Encrypted mirror message repository.
//!
//! Mirror messages are an append-only chat log; there is no update path.
//! Conversation membership and speaker role stay plaintext so threads can
//! be assembled and ordered without a key.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use quill_core::{
    new_v7, CreateMirrorMessageRequest, Error, ListOptions, MirrorMessage,
    MirrorMessageRepository, RemoteStore, Result, SelectOptions, SortDir,
};
use quill_crypto::DerivedKey;

use crate::codec::{get_bool_or, get_str, get_timestamp, get_uuid, open_string_soft, seal_string};
use crate::config::VaultConfig;
use crate::session::KeySession;

/// RemoteStore-backed implementation of [`MirrorMessageRepository`].
pub struct VaultMirrorRepository {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    table: String,
}

impl VaultMirrorRepository {
    /// Create a mirror message repository over the given store and session.
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<KeySession>, config: &VaultConfig) -> Self {
        Self {
            store,
            session,
            table: config.mirror_table.clone(),
        }
    }

    fn decode_row(&self, key: &DerivedKey, row: &JsonValue) -> Result<MirrorMessage> {
        let is_encrypted = get_bool_or(row, "is_encrypted", false);
        let (content, decryption_error) = if is_encrypted {
            open_string_soft(key, row, "content_encrypted", &self.table)
        } else {
            (get_str(row, "content")?, false)
        };

        Ok(MirrorMessage {
            id: get_uuid(row, "id")?,
            user_id: get_str(row, "user_id")?,
            conversation_id: get_uuid(row, "conversation_id")?,
            role: get_str(row, "role")?,
            content,
            created_at_utc: get_timestamp(row, "created_at_utc")?,
            is_encrypted,
            decryption_error,
        })
    }

    fn decode_rows(&self, key: &DerivedKey, rows: &[JsonValue], op: &str) -> Vec<MirrorMessage> {
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            match self.decode_row(key, row) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(
                    subsystem = "vault",
                    component = "mirror",
                    op,
                    error = %e,
                    "Skipping mirror row with undecodable metadata"
                ),
            }
        }
        messages
    }
}

#[async_trait]
impl MirrorMessageRepository for VaultMirrorRepository {
    async fn save(&self, req: CreateMirrorMessageRequest) -> Result<MirrorMessage> {
        let key = self.session.require_key().await?;
        let id = new_v7();
        let now = Utc::now();

        let row = json!({
            "id": id,
            "user_id": req.user_id,
            "conversation_id": req.conversation_id,
            "role": req.role,
            "content": JsonValue::Null,
            "content_encrypted": seal_string(&key, &req.content)?,
            "created_at_utc": now,
            "is_encrypted": true,
        });
        self.store.insert(&self.table, row).await?;

        debug!(
            subsystem = "vault",
            component = "mirror",
            op = "save",
            record_id = %id,
            "Saved encrypted mirror message"
        );

        Ok(MirrorMessage {
            id,
            user_id: req.user_id,
            conversation_id: req.conversation_id,
            role: req.role,
            content: req.content,
            created_at_utc: now,
            is_encrypted: true,
            decryption_error: false,
        })
    }

    async fn load(&self, id: Uuid) -> Result<MirrorMessage> {
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

    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<MirrorMessage>> {
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
        Ok(self.decode_rows(&key, &rows, "load_many"))
    }

    async fn load_conversation(&self, conversation_id: Uuid) -> Result<Vec<MirrorMessage>> {
        let key = self.session.require_key().await?;

        let select = SelectOptions::new()
            .eq("conversation_id", json!(conversation_id))
            .order_by("created_at_utc", SortDir::Asc);
        let rows = self.store.select(&self.table, select).await?;
        Ok(self.decode_rows(&key, &rows, "load_conversation"))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.session.require_key().await?;
        self.store.delete(&self.table, &id.to_string()).await
    }
}

//! Encrypted fact repository.
//!
//! Facts keep their predicate in plaintext so they can be grouped and
//! counted server-side; only the object value is sealed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use quill_core::{
    new_v7, CreateFactRequest, Error, Fact, FactRepository, ListOptions, RemoteStore, Result,
    SelectOptions, SortDir, UpdateFactRequest,
};
use quill_crypto::DerivedKey;

use crate::codec::{
    get_bool_or, get_f32_or, get_opt_uuid, get_str, get_timestamp, get_uuid, open_string_soft,
    seal_string,
};
use crate::config::VaultConfig;
use crate::session::KeySession;

/// RemoteStore-backed implementation of [`FactRepository`].
pub struct VaultFactRepository {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    table: String,
}

impl VaultFactRepository {
    /// Create a fact repository over the given store and session.
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<KeySession>, config: &VaultConfig) -> Self {
        Self {
            store,
            session,
            table: config.facts_table.clone(),
        }
    }

    fn decode_row(&self, key: &DerivedKey, row: &JsonValue) -> Result<Fact> {
        let is_encrypted = get_bool_or(row, "is_encrypted", false);
        let (object_value, decryption_error) = if is_encrypted {
            open_string_soft(key, row, "object_value_encrypted", &self.table)
        } else {
            (get_str(row, "object_value")?, false)
        };

        Ok(Fact {
            id: get_uuid(row, "id")?,
            user_id: get_str(row, "user_id")?,
            entity_id: get_opt_uuid(row, "entity_id")?,
            predicate: get_str(row, "predicate")?,
            object_value,
            confidence: get_f32_or(row, "confidence", 0.0),
            created_at_utc: get_timestamp(row, "created_at_utc")?,
            updated_at_utc: get_timestamp(row, "updated_at_utc")?,
            is_encrypted,
            decryption_error,
        })
    }
}

#[async_trait]
impl FactRepository for VaultFactRepository {
    async fn save(&self, req: CreateFactRequest) -> Result<Fact> {
        let key = self.session.require_key().await?;
        let id = new_v7();
        let now = Utc::now();

        let row = json!({
            "id": id,
            "user_id": req.user_id,
            "entity_id": req.entity_id,
            "predicate": req.predicate,
            "object_value": JsonValue::Null,
            "object_value_encrypted": seal_string(&key, &req.object_value)?,
            "confidence": req.confidence,
            "created_at_utc": now,
            "updated_at_utc": now,
            "is_encrypted": true,
        });
        self.store.insert(&self.table, row).await?;

        debug!(
            subsystem = "vault",
            component = "facts",
            op = "save",
            record_id = %id,
            "Saved encrypted fact"
        );

        Ok(Fact {
            id,
            user_id: req.user_id,
            entity_id: req.entity_id,
            predicate: req.predicate,
            object_value: req.object_value,
            confidence: req.confidence,
            created_at_utc: now,
            updated_at_utc: now,
            is_encrypted: true,
            decryption_error: false,
        })
    }

    async fn update(&self, id: Uuid, req: UpdateFactRequest) -> Result<Fact> {
        let key = self.session.require_key().await?;

        let mut patch = Map::new();
        if let Some(object_value) = &req.object_value {
            patch.insert(
                "object_value_encrypted".to_string(),
                json!(seal_string(&key, object_value)?),
            );
            patch.insert("object_value".to_string(), JsonValue::Null);
            patch.insert("is_encrypted".to_string(), json!(true));
        }
        if let Some(confidence) = req.confidence {
            patch.insert("confidence".to_string(), json!(confidence));
        }
        patch.insert("updated_at_utc".to_string(), json!(Utc::now()));

        let row = self
            .store
            .update(&self.table, &id.to_string(), JsonValue::Object(patch))
            .await?;
        self.decode_row(&key, &row)
    }

    async fn load(&self, id: Uuid) -> Result<Fact> {
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

    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Fact>> {
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
        let mut facts = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.decode_row(&key, row) {
                Ok(fact) => facts.push(fact),
                Err(e) => warn!(
                    subsystem = "vault",
                    component = "facts",
                    op = "load_many",
                    error = %e,
                    "Skipping fact row with undecodable metadata"
                ),
            }
        }
        Ok(facts)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.session.require_key().await?;
        self.store.delete(&self.table, &id.to_string()).await
    }
}

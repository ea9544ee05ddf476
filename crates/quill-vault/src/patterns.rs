//! Encrypted pattern repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use quill_core::{
    new_v7, CreatePatternRequest, Error, ListOptions, Pattern, PatternRepository, RemoteStore,
    Result, SelectOptions, SortDir, UpdatePatternRequest,
};
use quill_crypto::DerivedKey;

use crate::codec::{
    get_bool_or, get_f32_or, get_i32_or, get_opt_timestamp, get_str, get_timestamp, get_uuid,
    open_string_soft, seal_string,
};
use crate::config::VaultConfig;
use crate::session::KeySession;

/// RemoteStore-backed implementation of [`PatternRepository`].
pub struct VaultPatternRepository {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    table: String,
}

impl VaultPatternRepository {
    /// Create a pattern repository over the given store and session.
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<KeySession>, config: &VaultConfig) -> Self {
        Self {
            store,
            session,
            table: config.patterns_table.clone(),
        }
    }

    fn decode_row(&self, key: &DerivedKey, row: &JsonValue) -> Result<Pattern> {
        let is_encrypted = get_bool_or(row, "is_encrypted", false);
        let (description, decryption_error) = if is_encrypted {
            open_string_soft(key, row, "description_encrypted", &self.table)
        } else {
            (get_str(row, "description")?, false)
        };

        Ok(Pattern {
            id: get_uuid(row, "id")?,
            user_id: get_str(row, "user_id")?,
            kind: get_str(row, "kind")?,
            description,
            confidence: get_f32_or(row, "confidence", 0.0),
            occurrence_count: get_i32_or(row, "occurrence_count", 0),
            last_observed_at_utc: get_opt_timestamp(row, "last_observed_at_utc"),
            created_at_utc: get_timestamp(row, "created_at_utc")?,
            updated_at_utc: get_timestamp(row, "updated_at_utc")?,
            is_encrypted,
            decryption_error,
        })
    }
}

#[async_trait]
impl PatternRepository for VaultPatternRepository {
    async fn save(&self, req: CreatePatternRequest) -> Result<Pattern> {
        let key = self.session.require_key().await?;
        let id = new_v7();
        let now = Utc::now();

        let row = json!({
            "id": id,
            "user_id": req.user_id,
            "kind": req.kind,
            "description": JsonValue::Null,
            "description_encrypted": seal_string(&key, &req.description)?,
            "confidence": req.confidence,
            "occurrence_count": 1,
            "last_observed_at_utc": now,
            "created_at_utc": now,
            "updated_at_utc": now,
            "is_encrypted": true,
        });
        self.store.insert(&self.table, row).await?;

        debug!(
            subsystem = "vault",
            component = "patterns",
            op = "save",
            record_id = %id,
            "Saved encrypted pattern"
        );

        Ok(Pattern {
            id,
            user_id: req.user_id,
            kind: req.kind,
            description: req.description,
            confidence: req.confidence,
            occurrence_count: 1,
            last_observed_at_utc: Some(now),
            created_at_utc: now,
            updated_at_utc: now,
            is_encrypted: true,
            decryption_error: false,
        })
    }

    async fn update(&self, id: Uuid, req: UpdatePatternRequest) -> Result<Pattern> {
        let key = self.session.require_key().await?;

        let mut patch = Map::new();
        if let Some(description) = &req.description {
            patch.insert(
                "description_encrypted".to_string(),
                json!(seal_string(&key, description)?),
            );
            patch.insert("description".to_string(), JsonValue::Null);
            patch.insert("is_encrypted".to_string(), json!(true));
        }
        if let Some(confidence) = req.confidence {
            patch.insert("confidence".to_string(), json!(confidence));
        }
        if let Some(occurrence_count) = req.occurrence_count {
            patch.insert("occurrence_count".to_string(), json!(occurrence_count));
        }
        if let Some(last_observed) = req.last_observed_at_utc {
            patch.insert("last_observed_at_utc".to_string(), json!(last_observed));
        }
        patch.insert("updated_at_utc".to_string(), json!(Utc::now()));

        let row = self
            .store
            .update(&self.table, &id.to_string(), JsonValue::Object(patch))
            .await?;
        self.decode_row(&key, &row)
    }

    async fn load(&self, id: Uuid) -> Result<Pattern> {
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

    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Pattern>> {
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
        let mut patterns = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.decode_row(&key, row) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => warn!(
                    subsystem = "vault",
                    component = "patterns",
                    op = "load_many",
                    error = %e,
                    "Skipping pattern row with undecodable metadata"
                ),
            }
        }
        Ok(patterns)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.session.require_key().await?;
        self.store.delete(&self.table, &id.to_string()).await
    }
}

//! Encrypted entity repository.
//!
//! Entities carry two sensitive fields, `name` and `summary`, each sealed
//! in its own envelope so compromising one column never exposes the other.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

use quill_core::{
    new_v7, CreateEntityRequest, Entity, EntityRepository, Error, ListOptions, RemoteStore, Result,
    SelectOptions, SortDir, UpdateEntityRequest,
};
use quill_crypto::DerivedKey;

use crate::codec::{
    get_bool_or, get_f32_or, get_str, get_timestamp, get_uuid, open_string_soft, seal_string,
};
use crate::config::VaultConfig;
use crate::session::KeySession;

/// RemoteStore-backed implementation of [`EntityRepository`].
pub struct VaultEntityRepository {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    table: String,
}

impl VaultEntityRepository {
    /// Create an entity repository over the given store and session.
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<KeySession>, config: &VaultConfig) -> Self {
        Self {
            store,
            session,
            table: config.entities_table.clone(),
        }
    }

    fn decode_row(&self, key: &DerivedKey, row: &JsonValue) -> Result<Entity> {
        let is_encrypted = get_bool_or(row, "is_encrypted", false);
        let (name, summary, decryption_error) = if is_encrypted {
            let (name, name_failed) = open_string_soft(key, row, "name_encrypted", &self.table);
            let (summary, summary_failed) =
                open_string_soft(key, row, "summary_encrypted", &self.table);
            (name, summary, name_failed || summary_failed)
        } else {
            (get_str(row, "name")?, get_str(row, "summary")?, false)
        };

        Ok(Entity {
            id: get_uuid(row, "id")?,
            user_id: get_str(row, "user_id")?,
            kind: get_str(row, "kind")?,
            name,
            summary,
            confidence: get_f32_or(row, "confidence", 0.0),
            created_at_utc: get_timestamp(row, "created_at_utc")?,
            updated_at_utc: get_timestamp(row, "updated_at_utc")?,
            is_encrypted,
            decryption_error,
        })
    }
}

#[async_trait]
impl EntityRepository for VaultEntityRepository {
    async fn save(&self, req: CreateEntityRequest) -> Result<Entity> {
        let key = self.session.require_key().await?;
        let id = new_v7();
        let now = Utc::now();

        let row = json!({
            "id": id,
            "user_id": req.user_id,
            "kind": req.kind,
            "name": JsonValue::Null,
            "name_encrypted": seal_string(&key, &req.name)?,
            "summary": JsonValue::Null,
            "summary_encrypted": seal_string(&key, &req.summary)?,
            "confidence": req.confidence,
            "created_at_utc": now,
            "updated_at_utc": now,
            "is_encrypted": true,
        });
        self.store.insert(&self.table, row).await?;

        debug!(
            subsystem = "vault",
            component = "entities",
            op = "save",
            record_id = %id,
            "Saved encrypted entity"
        );

        Ok(Entity {
            id,
            user_id: req.user_id,
            kind: req.kind,
            name: req.name,
            summary: req.summary,
            confidence: req.confidence,
            created_at_utc: now,
            updated_at_utc: now,
            is_encrypted: true,
            decryption_error: false,
        })
    }

    async fn update(&self, id: Uuid, req: UpdateEntityRequest) -> Result<Entity> {
        let key = self.session.require_key().await?;

        let mut patch = Map::new();
        let reencrypts = req.name.is_some() || req.summary.is_some();
        if let Some(name) = &req.name {
            patch.insert("name_encrypted".to_string(), json!(seal_string(&key, name)?));
            patch.insert("name".to_string(), JsonValue::Null);
        }
        if let Some(summary) = &req.summary {
            patch.insert(
                "summary_encrypted".to_string(),
                json!(seal_string(&key, summary)?),
            );
            patch.insert("summary".to_string(), JsonValue::Null);
        }
        if reencrypts {
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

    async fn load(&self, id: Uuid) -> Result<Entity> {
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

    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Entity>> {
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
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.decode_row(&key, row) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(
                    subsystem = "vault",
                    component = "entities",
                    op = "load_many",
                    error = %e,
                    "Skipping entity row with undecodable metadata"
                ),
            }
        }
        Ok(entities)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.session.require_key().await?;
        self.store.delete(&self.table, &id.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    async fn unlocked_repo() -> (Arc<MemoryStore>, VaultEntityRepository) {
        let store = Arc::new(MemoryStore::new());
        let config = VaultConfig::default();
        let session = Arc::new(KeySession::new(store.clone(), &config));
        session.unlock("u1").await.unwrap();
        let repo = VaultEntityRepository::new(store.clone(), session, &config);
        (store, repo)
    }

    #[tokio::test]
    async fn test_each_sensitive_field_gets_own_envelope() {
        let (store, repo) = unlocked_repo().await;
        let entity = repo
            .save(CreateEntityRequest {
                user_id: "u1".to_string(),
                kind: "person".to_string(),
                name: "Ada".to_string(),
                summary: "met at the library".to_string(),
                confidence: 0.9,
            })
            .await
            .unwrap();

        let row = store
            .raw_row("entities", &entity.id.to_string())
            .await
            .unwrap();
        let name_env = row["name_encrypted"].as_str().unwrap();
        let summary_env = row["summary_encrypted"].as_str().unwrap();

        assert_ne!(name_env, summary_env);
        assert_eq!(row["name"], serde_json::Value::Null);
        assert_eq!(row["summary"], serde_json::Value::Null);
        assert!(!name_env.contains("Ada"));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_field() {
        let (_store, repo) = unlocked_repo().await;
        let entity = repo
            .save(CreateEntityRequest {
                user_id: "u1".to_string(),
                kind: "person".to_string(),
                name: "Ada".to_string(),
                summary: "colleague".to_string(),
                confidence: 0.5,
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                entity.id,
                UpdateEntityRequest {
                    summary: Some("close friend".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.summary, "close friend");
    }
}

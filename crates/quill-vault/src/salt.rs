//! Per-user salt persistence.
//!
//! A user's salt is created exactly once, at their first unlock, and never
//! rotated. It is stored in plaintext: the salt defeats precomputed-key
//! attacks across users, it is not itself a secret. The salt row id is the
//! user identity, so a unique-key conflict on insert is the signal that a
//! concurrent creator won the first-setup race.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use quill_core::{Error, RemoteStore, Result, SelectOptions};
use quill_crypto::Salt;

/// Fetch-or-create access to per-user salts in the remote store.
pub struct SaltStore {
    store: Arc<dyn RemoteStore>,
    table: String,
}

impl SaltStore {
    /// Create a salt store over the given remote table.
    pub fn new(store: Arc<dyn RemoteStore>, table: String) -> Self {
        Self { store, table }
    }

    /// Fetch the salt for `user_id`, creating it on first use.
    ///
    /// Tolerates the create race: if the insert conflicts because another
    /// session created the salt concurrently, the winning row is fetched
    /// and used. Every failure mode degrades to
    /// [`Error::SaltUnavailable`], which is retryable by re-running the
    /// unlock that triggered derivation.
    pub async fn fetch_or_create(&self, user_id: &str) -> Result<Salt> {
        if let Some(salt) = self.fetch(user_id).await? {
            return Ok(salt);
        }

        // First unlock for this user: generate and persist.
        let salt = Salt::random();
        let row = json!({
            "id": user_id,
            "salt": salt.to_base64(),
            "created_at_utc": Utc::now(),
        });

        match self.store.insert(&self.table, row).await {
            Ok(_) => {
                info!(
                    subsystem = "vault",
                    component = "salt_store",
                    op = "create",
                    user_id,
                    "Created salt for first-time unlock"
                );
                Ok(salt)
            }
            Err(insert_err) => {
                // Lost the create race, or the store rejected the write.
                // Whichever row exists now is the salt of record.
                debug!(
                    subsystem = "vault",
                    component = "salt_store",
                    op = "create",
                    user_id,
                    error = %insert_err,
                    "Salt insert failed - re-reading for a concurrent winner"
                );
                match self.fetch(user_id).await? {
                    Some(existing) => Ok(existing),
                    None => Err(Error::SaltUnavailable(insert_err.to_string())),
                }
            }
        }
    }

    async fn fetch(&self, user_id: &str) -> Result<Option<Salt>> {
        let opts = SelectOptions::new().eq("id", json!(user_id)).limit(1);
        let rows = self
            .store
            .select(&self.table, opts)
            .await
            .map_err(|e| Error::SaltUnavailable(e.to_string()))?;

        match rows.first() {
            Some(row) => parse_salt_row(row).map(Some),
            None => Ok(None),
        }
    }
}

fn parse_salt_row(row: &JsonValue) -> Result<Salt> {
    let encoded = row
        .get("salt")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::SaltUnavailable("salt column missing or not a string".to_string()))?;

    Salt::from_base64(encoded).map_err(|e| Error::SaltUnavailable(e.to_string()))
}

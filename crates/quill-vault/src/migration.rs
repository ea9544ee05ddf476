//! Legacy plaintext migration.
//!
//! Rows written before encryption shipped carry their sensitive fields in
//! plaintext columns with `is_encrypted = false`. The migrator walks those
//! rows per table, seals each sensitive field, and flips the flag in one
//! update per row.
//!
//! The scan filter is always `is_encrypted = false`, which makes the whole
//! process idempotent and resumable: a re-run only sees rows that have not
//! been migrated yet, and never touches existing ciphertext (no IV is ever
//! re-derived for already-encrypted content). Row failures increment a
//! counter and the walk moves on; one bad row never aborts a batch.

use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};
use tracing::{info, warn};

use quill_core::{
    Error, MigrationReport, RemoteStore, Result, SelectOptions, SortDir, TableMigration,
    UnencryptedCounts,
};
use quill_crypto::{seal_json, DerivedKey};

use crate::codec::{crypto_err, get_str};
use crate::config::VaultConfig;
use crate::session::KeySession;

struct TableSpec {
    table: String,
    /// (plaintext column, envelope column) pairs, one per sensitive field.
    fields: Vec<(&'static str, &'static str)>,
}

/// Batch migrator from the legacy plaintext schema to the encrypted one.
pub struct Migrator {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    config: VaultConfig,
}

impl Migrator {
    /// Create a migrator over the given store and session.
    pub fn new(store: Arc<dyn RemoteStore>, session: Arc<KeySession>, config: VaultConfig) -> Self {
        Self {
            store,
            session,
            config,
        }
    }

    fn table_specs(&self) -> Vec<TableSpec> {
        vec![
            TableSpec {
                table: self.config.notes_table.clone(),
                fields: vec![("content", "content_encrypted")],
            },
            TableSpec {
                table: self.config.entities_table.clone(),
                fields: vec![("name", "name_encrypted"), ("summary", "summary_encrypted")],
            },
            TableSpec {
                table: self.config.facts_table.clone(),
                fields: vec![("object_value", "object_value_encrypted")],
            },
            TableSpec {
                table: self.config.patterns_table.clone(),
                fields: vec![("description", "description_encrypted")],
            },
            TableSpec {
                table: self.config.mirror_table.clone(),
                fields: vec![("content", "content_encrypted")],
            },
        ]
    }

    /// Encrypt every remaining plaintext row the user owns.
    ///
    /// Returns per-table counts. Rows that fail stay plaintext, are
    /// reported in `errors`, and will be retried by the next run.
    pub async fn migrate(&self, user_id: &str) -> Result<MigrationReport> {
        let key = self.session.require_key().await?;

        let mut report = MigrationReport::default();
        for spec in self.table_specs() {
            let counts = self.migrate_table(&key, user_id, &spec).await?;
            info!(
                subsystem = "migration",
                component = "migrator",
                op = "migrate",
                user_id,
                table = %spec.table,
                row_count = counts.total,
                error_count = counts.errors,
                "Table migration pass complete"
            );
            report.tables.insert(spec.table.clone(), counts);
        }
        Ok(report)
    }

    async fn migrate_table(
        &self,
        key: &DerivedKey,
        user_id: &str,
        spec: &TableSpec,
    ) -> Result<TableMigration> {
        let mut counts = TableMigration::default();

        loop {
            // Migrated rows drop out of the filter, so each page starts
            // past only the rows that failed and stayed plaintext.
            let select = SelectOptions::new()
                .eq("user_id", json!(user_id))
                .eq("is_encrypted", json!(false))
                .order_by("id", SortDir::Asc)
                .offset(counts.errors)
                .limit(self.config.migration_page_size);
            let rows = self.store.select(&spec.table, select).await?;
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                counts.total += 1;
                match self.migrate_row(key, spec, row).await {
                    Ok(()) => counts.migrated += 1,
                    Err(e) => {
                        counts.errors += 1;
                        warn!(
                            subsystem = "migration",
                            component = "migrator",
                            table = %spec.table,
                            error = %e,
                            "Row migration failed - continuing with the rest"
                        );
                    }
                }
            }
        }

        Ok(counts)
    }

    async fn migrate_row(&self, key: &DerivedKey, spec: &TableSpec, row: &JsonValue) -> Result<()> {
        let id = get_str(row, "id")?;

        let mut patch = Map::new();
        for (plain_column, envelope_column) in &spec.fields {
            let value = row
                .get(plain_column)
                .filter(|v| !v.is_null())
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "plaintext column `{}` missing on unmigrated row",
                        plain_column
                    ))
                })?;

            let envelope = seal_json(key, value).map_err(crypto_err)?;
            patch.insert(envelope_column.to_string(), json!(envelope));
            patch.insert(plain_column.to_string(), JsonValue::Null);
        }
        patch.insert("is_encrypted".to_string(), json!(true));

        // One update carries envelopes, nulled plaintext, and the flag, so
        // a row is either fully migrated or untouched.
        self.store
            .update(&spec.table, &id, JsonValue::Object(patch))
            .await?;
        Ok(())
    }

    /// Count remaining plaintext rows per table without mutating anything.
    ///
    /// Reads only plaintext metadata, so it works while the session is
    /// still locked and can back a progress display before unlock.
    pub async fn unencrypted_counts(&self, user_id: &str) -> Result<UnencryptedCounts> {
        let mut counts = UnencryptedCounts::default();
        for spec in self.table_specs() {
            let select = SelectOptions::new()
                .eq("user_id", json!(user_id))
                .eq("is_encrypted", json!(false));
            let rows = self.store.select(&spec.table, select).await?;
            counts.tables.insert(spec.table.clone(), rows.len());
        }
        Ok(counts)
    }
}

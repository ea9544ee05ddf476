//! In-memory [`RemoteStore`] backend.
//!
//! Backs every test in this workspace and doubles as the null
//! implementation for callers wiring the vault without a hosted store.
//! Rows are JSON documents keyed by their string `id` column, matching
//! the contract a hosted row store exposes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use quill_core::{Error, Filter, RemoteStore, Result, SelectOptions, SortDir};

/// In-memory table store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<JsonValue>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Fetch a raw row without any decryption, as tests need to inspect
    /// exactly what the storage backend can see.
    pub async fn raw_row(&self, table: &str, id: &str) -> Option<JsonValue> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id)).cloned())
    }
}

fn row_id(row: &JsonValue) -> Option<&str> {
    row.get("id").and_then(JsonValue::as_str)
}

fn matches_filters(row: &JsonValue, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match row.get(&f.column) {
        Some(value) => value == &f.value,
        None => f.value.is_null(),
    })
}

fn compare_columns(a: Option<&JsonValue>, b: Option<&JsonValue>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x, y) {
            (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
            (JsonValue::Number(x), JsonValue::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
            _ => x.to_string().cmp(&y.to_string()),
        },
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn insert(&self, table: &str, row: JsonValue) -> Result<JsonValue> {
        let id = row_id(&row)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidInput("row requires a string `id` column".to_string()))?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if rows.iter().any(|r| row_id(r) == Some(id.as_str())) {
            return Err(Error::Store(format!("duplicate key: {}/{}", table, id)));
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: JsonValue) -> Result<JsonValue> {
        let patch = match patch {
            JsonValue::Object(map) => map,
            _ => return Err(Error::InvalidInput("patch must be a JSON object".to_string())),
        };

        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| Error::NotFound(format!("{}/{}", table, id)))?;
        let row = rows
            .iter_mut()
            .find(|row| row_id(row) == Some(id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", table, id)))?;

        let target = row
            .as_object_mut()
            .ok_or_else(|| Error::Internal("stored row is not an object".to_string()))?;
        for (column, value) in patch {
            // Nulls overwrite: clearing a plaintext column is a real patch.
            target.insert(column, value);
        }

        Ok(row.clone())
    }

    async fn select(&self, table: &str, opts: SelectOptions) -> Result<Vec<JsonValue>> {
        let tables = self.tables.read().await;
        let mut matched: Vec<JsonValue> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filters(row, &opts.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((column, dir)) = &opts.order_by {
            matched.sort_by(|a, b| {
                let ord = compare_columns(a.get(column), b.get(column));
                match dir {
                    SortDir::Asc => ord,
                    SortDir::Desc => ord.reverse(),
                }
            });
        }

        let limited = matched
            .into_iter()
            .skip(opts.offset)
            .take(opts.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(limited)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| Error::NotFound(format!("{}/{}", table, id)))?;

        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(id));

        if rows.len() == before {
            return Err(Error::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }
}

//! Core traits for quill abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy. The vault never talks to a concrete backend: the remote row
//! store is injected as a [`RemoteStore`] capability at construction,
//! which keeps the encryption layer testable against an in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// REMOTE ROW STORE
// =============================================================================

/// Sort direction for select ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Equality filter on a single column.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: JsonValue,
}

/// Declarative query passed to [`RemoteStore::select`].
///
/// The store contract is deliberately narrow: equality filters, one order
/// column, and offset/limit paging. Nothing here assumes a query language.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortDir)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SelectOptions {
    /// Create an empty query (matches every row of the table).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter on `column`.
    pub fn eq(mut self, column: &str, value: JsonValue) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            value,
        });
        self
    }

    /// Order results by `column`.
    pub fn order_by(mut self, column: &str, dir: SortDir) -> Self {
        self.order_by = Some((column.to_string(), dir));
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` matching rows.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Generic CRUD capability over named tables of JSON rows.
///
/// This is the collaborator boundary of the encrypted storage layer: the
/// implementation behind it (hosted row store, local database, in-memory
/// test double) never sees a decryption key, only plaintext metadata
/// columns and envelope strings.
///
/// Implementations impose no timeouts; callers needing bounded latency
/// wrap calls themselves.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a new row; returns the stored row.
    async fn insert(&self, table: &str, row: JsonValue) -> Result<JsonValue>;

    /// Patch columns of the row with the given id; returns the updated row.
    async fn update(&self, table: &str, id: &str, patch: JsonValue) -> Result<JsonValue>;

    /// Select rows matching the query.
    async fn select(&self, table: &str, opts: SelectOptions) -> Result<Vec<JsonValue>>;

    /// Delete the row with the given id.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

// =============================================================================
// LIST OPTIONS
// =============================================================================

/// Paging and ordering for repository list operations.
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Maximum results; `None` loads the full set (used by search/export).
    pub limit: Option<usize>,
    /// Pagination offset.
    pub offset: usize,
    /// Order by creation time, newest first when true.
    pub newest_first: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: None,
            offset: 0,
            newest_first: true,
        }
    }
}

// =============================================================================
// REPOSITORY REQUEST TYPES
// =============================================================================

/// Request for capturing a new note.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    pub user_id: String,
    pub source: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Patch for an existing note. Only supplied fields change; a supplied
/// `content` is re-enveloped with a fresh IV.
#[derive(Debug, Clone, Default)]
pub struct UpdateNoteRequest {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Request for creating an entity.
#[derive(Debug, Clone)]
pub struct CreateEntityRequest {
    pub user_id: String,
    pub kind: String,
    pub name: String,
    pub summary: String,
    pub confidence: f32,
}

/// Patch for an existing entity.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntityRequest {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub confidence: Option<f32>,
}

/// Request for recording an extracted fact.
#[derive(Debug, Clone)]
pub struct CreateFactRequest {
    pub user_id: String,
    pub entity_id: Option<Uuid>,
    pub predicate: String,
    pub object_value: String,
    pub confidence: f32,
}

/// Patch for an existing fact.
#[derive(Debug, Clone, Default)]
pub struct UpdateFactRequest {
    pub object_value: Option<String>,
    pub confidence: Option<f32>,
}

/// Request for recording a behavioral pattern.
#[derive(Debug, Clone)]
pub struct CreatePatternRequest {
    pub user_id: String,
    pub kind: String,
    pub description: String,
    pub confidence: f32,
}

/// Patch for an existing pattern.
#[derive(Debug, Clone, Default)]
pub struct UpdatePatternRequest {
    pub description: Option<String>,
    pub confidence: Option<f32>,
    pub occurrence_count: Option<i32>,
    pub last_observed_at_utc: Option<DateTime<Utc>>,
}

/// Request for appending a mirror message.
#[derive(Debug, Clone)]
pub struct CreateMirrorMessageRequest {
    pub user_id: String,
    pub conversation_id: Uuid,
    pub role: String,
    pub content: String,
}

// =============================================================================
// REPOSITORY TRAITS
// =============================================================================

/// Repository for note CRUD operations.
///
/// Writes fail loud: any crypto or store failure surfaces to the caller.
/// Reads fail soft: a row whose envelope cannot be opened comes back with
/// a sentinel field and `decryption_error = true` instead of aborting the
/// batch. Writes to the same record id must be serialized by the caller;
/// this layer implements no optimistic concurrency control.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Encrypt sensitive fields and insert. Returns the record carrying the
    /// caller's plaintext (write-through, no re-decrypt round trip).
    async fn save(&self, req: CreateNoteRequest) -> Result<Note>;

    /// Patch an existing note, re-encrypting supplied sensitive fields.
    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note>;

    /// Fetch and decrypt a single note.
    async fn load(&self, id: Uuid) -> Result<Note>;

    /// List a user's notes with paging/ordering, decrypting each row.
    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Note>>;

    /// Delete a note.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Repository for entity CRUD operations.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn save(&self, req: CreateEntityRequest) -> Result<Entity>;
    async fn update(&self, id: Uuid, req: UpdateEntityRequest) -> Result<Entity>;
    async fn load(&self, id: Uuid) -> Result<Entity>;
    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Entity>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Repository for fact CRUD operations.
#[async_trait]
pub trait FactRepository: Send + Sync {
    async fn save(&self, req: CreateFactRequest) -> Result<Fact>;
    async fn update(&self, id: Uuid, req: UpdateFactRequest) -> Result<Fact>;
    async fn load(&self, id: Uuid) -> Result<Fact>;
    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Fact>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Repository for pattern CRUD operations.
#[async_trait]
pub trait PatternRepository: Send + Sync {
    async fn save(&self, req: CreatePatternRequest) -> Result<Pattern>;
    async fn update(&self, id: Uuid, req: UpdatePatternRequest) -> Result<Pattern>;
    async fn load(&self, id: Uuid) -> Result<Pattern>;
    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<Pattern>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Repository for mirror message operations.
#[async_trait]
pub trait MirrorMessageRepository: Send + Sync {
    async fn save(&self, req: CreateMirrorMessageRequest) -> Result<MirrorMessage>;
    async fn load(&self, id: Uuid) -> Result<MirrorMessage>;
    async fn load_many(&self, user_id: &str, opts: ListOptions) -> Result<Vec<MirrorMessage>>;

    /// Load one conversation's messages in chronological order.
    async fn load_conversation(&self, conversation_id: Uuid) -> Result<Vec<MirrorMessage>>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// SEARCH
// =============================================================================

/// Results of a client-side plaintext search.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchResults {
    pub notes: Vec<Note>,
    pub entities: Vec<Entity>,
}

impl SearchResults {
    /// Total hits across record types.
    pub fn len(&self) -> usize {
        self.notes.len() + self.entities.len()
    }

    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.entities.is_empty()
    }
}

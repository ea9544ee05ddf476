//! # quill-vault
//!
//! Zero-knowledge encrypted storage layer for quill.
//!
//! This crate provides:
//! - Per-user salt persistence with race-tolerant first-time creation
//! - A key lifecycle session gating every cipher operation
//! - Encrypted repositories for all vault record types
//! - Client-side plaintext search and one-shot export
//! - A resumable migration service for legacy plaintext rows
//!
//! The remote row store behind all of it is an injected [`RemoteStore`]
//! capability. It stores plaintext metadata columns and envelope strings;
//! no key capable of decrypting content ever reaches it.
//!
//! ## Concurrency contract
//!
//! Cipher payloads are small (note bodies, names, short summaries) and run
//! inline on the async executor. Independent record operations may run
//! concurrently: the cached session key is read-only behind an `Arc`.
//! Writes to the *same* record id must be serialized by the caller; this
//! layer implements no optimistic concurrency control. No timeouts are
//! imposed on store calls; wrap them in `tokio::time::timeout` when
//! bounded latency matters.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quill_core::{CreateNoteRequest, NoteRepository};
//! use quill_vault::{MemoryStore, Vault, VaultConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let vault = Vault::new(store, VaultConfig::default());
//!
//!     vault.session().unlock("u1").await?;
//!
//!     let note = vault.notes.save(CreateNoteRequest {
//!         user_id: "u1".to_string(),
//!         source: "text".to_string(),
//!         content: "hello".to_string(),
//!         tags: vec![],
//!     }).await?;
//!
//!     assert_eq!(vault.notes.load(note.id).await?.content, "hello");
//!
//!     vault.session().lock().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod entities;
pub mod export;
pub mod facts;
pub mod memory;
pub mod migration;
pub mod mirror;
pub mod notes;
pub mod patterns;
pub mod salt;
pub mod search;
pub mod session;

use std::sync::Arc;

use quill_core::RemoteStore;

// Re-export core types so vault consumers need one import path.
pub use quill_core::{Error, Result};

pub use codec::DECRYPTION_FAILED_SENTINEL;
pub use config::VaultConfig;
pub use entities::VaultEntityRepository;
pub use facts::VaultFactRepository;
pub use memory::MemoryStore;
pub use migration::Migrator;
pub use mirror::VaultMirrorRepository;
pub use notes::VaultNoteRepository;
pub use patterns::VaultPatternRepository;
pub use salt::SaltStore;
pub use session::{KeySession, SessionState};

/// Combined vault context with all repositories.
///
/// One `Vault` serves one user session: the embedded [`KeySession`] holds
/// at most one derived key, and every repository checks it before touching
/// the store.
pub struct Vault {
    store: Arc<dyn RemoteStore>,
    session: Arc<KeySession>,
    /// Note repository.
    pub notes: VaultNoteRepository,
    /// Entity repository.
    pub entities: VaultEntityRepository,
    /// Fact repository.
    pub facts: VaultFactRepository,
    /// Pattern repository.
    pub patterns: VaultPatternRepository,
    /// Mirror message repository.
    pub mirror: VaultMirrorRepository,
    /// Legacy plaintext migrator.
    pub migration: Migrator,
}

impl Vault {
    /// Build a vault over a remote store with a fresh locked session.
    pub fn new(store: Arc<dyn RemoteStore>, config: VaultConfig) -> Self {
        let session = Arc::new(KeySession::new(store.clone(), &config));
        Self::with_session(store, session, config)
    }

    /// Build a vault sharing an existing session.
    pub fn with_session(
        store: Arc<dyn RemoteStore>,
        session: Arc<KeySession>,
        config: VaultConfig,
    ) -> Self {
        Self {
            notes: VaultNoteRepository::new(store.clone(), session.clone(), &config),
            entities: VaultEntityRepository::new(store.clone(), session.clone(), &config),
            facts: VaultFactRepository::new(store.clone(), session.clone(), &config),
            patterns: VaultPatternRepository::new(store.clone(), session.clone(), &config),
            mirror: VaultMirrorRepository::new(store.clone(), session.clone(), &config),
            migration: Migrator::new(store.clone(), session.clone(), config),
            store,
            session,
        }
    }

    /// The key lifecycle session gating this vault.
    pub fn session(&self) -> &Arc<KeySession> {
        &self.session
    }

    /// The underlying remote store.
    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }
}

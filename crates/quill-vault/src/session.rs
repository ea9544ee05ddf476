//! Key lifecycle management.
//!
//! A [`KeySession`] owns the derived key for one user's session. It is the
//! single enforcement point for the vault: every repository and migration
//! operation calls [`KeySession::require_key`] before touching ciphertext
//! or the remote store, so nothing can silently proceed without a key.
//!
//! Unlock is single-flight: concurrent `unlock` calls collapse into one
//! in-flight derivation. That matters because first-time derivation
//! creates the user's salt, and two racing creations must not both run
//! from the same process.
//!
//! `lock` must be called on logout. The key is zeroized when the last
//! clone of its handle drops; leaving a session unlocked keeps key
//! material resident, which is a session-hygiene bug in the caller.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use quill_core::{Error, RemoteStore, Result};
use quill_crypto::{derive_key, export_recovery_key, import_recovery_key, DerivedKey};

use crate::config::VaultConfig;
use crate::salt::SaltStore;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No key in memory. Initial state, and the state after `lock`.
    Locked,
    /// A derivation is in flight; concurrent unlockers are waiting on it.
    Unlocking,
    /// Key cached in memory; cipher operations may proceed.
    Unlocked,
}

enum KeyState {
    Locked,
    Unlocking,
    Unlocked {
        identity: String,
        key: Arc<DerivedKey>,
    },
}

/// Holds the derived key for one user session and gates every cipher
/// operation on unlock having happened.
pub struct KeySession {
    salts: SaltStore,
    state: RwLock<KeyState>,
    /// Serializes unlock/lock transitions; concurrent unlockers queue here
    /// and find the state already `Unlocked` when they get the gate.
    unlock_gate: Mutex<()>,
}

impl KeySession {
    /// Create a locked session over the given remote store.
    pub fn new(store: Arc<dyn RemoteStore>, config: &VaultConfig) -> Self {
        Self {
            salts: SaltStore::new(store, config.salts_table.clone()),
            state: RwLock::new(KeyState::Locked),
            unlock_gate: Mutex::new(()),
        }
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        match &*self.state.read().await {
            KeyState::Locked => SessionState::Locked,
            KeyState::Unlocking => SessionState::Unlocking,
            KeyState::Unlocked { .. } => SessionState::Unlocked,
        }
    }

    /// Derive and cache the key for `identity`.
    ///
    /// No-op when already unlocked for the same identity. Concurrent
    /// callers join the in-flight derivation instead of starting a second
    /// one. A session unlocked for one identity must be locked before a
    /// different identity can unlock it.
    pub async fn unlock(&self, identity: &str) -> Result<()> {
        if self.check_unlocked(identity).await? {
            return Ok(());
        }

        let _gate = self.unlock_gate.lock().await;

        // A caller that was queued on the gate joins the finished
        // derivation here rather than deriving again.
        if self.check_unlocked(identity).await? {
            return Ok(());
        }

        *self.state.write().await = KeyState::Unlocking;
        debug!(
            subsystem = "vault",
            component = "session",
            op = "unlock",
            user_id = identity,
            "Deriving session key"
        );

        match self.salts.fetch_or_create(identity).await {
            Ok(salt) => {
                let key = derive_key(identity, &salt);
                *self.state.write().await = KeyState::Unlocked {
                    identity: identity.to_string(),
                    key: Arc::new(key),
                };
                info!(
                    subsystem = "vault",
                    component = "session",
                    op = "unlock",
                    user_id = identity,
                    "Session unlocked"
                );
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = KeyState::Locked;
                Err(e)
            }
        }
    }

    /// Unlock with a recovery key instead of salt-based derivation.
    ///
    /// The recovery string encodes the same session key, so envelopes
    /// written under either unlock path stay mutually readable. Used when
    /// the salt store is unreachable.
    pub async fn unlock_with_recovery(&self, identity: &str, recovery_key: &str) -> Result<()> {
        let _gate = self.unlock_gate.lock().await;

        if self.check_unlocked(identity).await? {
            return Ok(());
        }

        let key = import_recovery_key(recovery_key).map_err(|e| Error::Crypto(e.to_string()))?;
        *self.state.write().await = KeyState::Unlocked {
            identity: identity.to_string(),
            key: Arc::new(key),
        };
        info!(
            subsystem = "vault",
            component = "session",
            op = "unlock_with_recovery",
            user_id = identity,
            "Session unlocked via recovery key"
        );
        Ok(())
    }

    /// Return the cached key, or fail if the session is not unlocked.
    ///
    /// The handle is read-only and may be shared across any number of
    /// concurrent cipher calls.
    pub async fn require_key(&self) -> Result<Arc<DerivedKey>> {
        match &*self.state.read().await {
            KeyState::Unlocked { key, .. } => Ok(key.clone()),
            _ => Err(Error::NotUnlocked),
        }
    }

    /// Export the current session key as a human-copyable recovery string.
    ///
    /// Show it once at setup; it is never stored anywhere by this layer.
    pub async fn recovery_key(&self) -> Result<String> {
        let key = self.require_key().await?;
        Ok(export_recovery_key(&key))
    }

    /// Discard the cached key and return to `Locked`.
    pub async fn lock(&self) {
        let _gate = self.unlock_gate.lock().await;
        *self.state.write().await = KeyState::Locked;
        info!(
            subsystem = "vault",
            component = "session",
            op = "lock",
            "Session locked - key material discarded"
        );
    }

    /// Ok(true) when already unlocked for `identity`; error when unlocked
    /// for someone else.
    async fn check_unlocked(&self, identity: &str) -> Result<bool> {
        match &*self.state.read().await {
            KeyState::Unlocked {
                identity: current, ..
            } => {
                if current == identity {
                    Ok(true)
                } else {
                    Err(Error::InvalidInput(format!(
                        "session already unlocked for another identity: {}",
                        current
                    )))
                }
            }
            _ => Ok(false),
        }
    }
}

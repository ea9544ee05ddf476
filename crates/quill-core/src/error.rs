//! Error types for the quill storage layer.

use thiserror::Error;

/// Result type alias using quill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quill storage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote row store operation failed (network, permission, constraint).
    #[error("Store error: {0}")]
    Store(String),

    /// Per-user salt could not be fetched or created.
    ///
    /// Recoverable: the caller may retry the unlock that triggered
    /// derivation once the store is reachable again.
    #[error("Salt unavailable: {0}")]
    SaltUnavailable(String),

    /// A cipher-dependent operation was attempted while the session is locked.
    #[error("Session is locked - unlock before accessing encrypted data")]
    NotUnlocked,

    /// Cryptographic operation failed (tamper, wrong key, bad envelope).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record not found by id in a named table.
    #[error("Record not found in {table}: {id}")]
    RecordNotFound {
        /// Table the lookup ran against.
        table: String,
        /// Row id that did not resolve.
        id: uuid::Uuid,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

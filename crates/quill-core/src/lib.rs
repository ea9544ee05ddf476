//! # quill-core
//!
//! Core types, traits, and abstractions for the quill storage layer.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other quill crates depend on: the vault record
//! models, the workspace error taxonomy, the [`RemoteStore`] collaborator
//! boundary, and the per-record repository traits.

pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};

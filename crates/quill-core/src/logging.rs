//! Structured logging schema and field name constants for quill.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, per-record degradation applied |
//! | INFO  | Lifecycle events (unlock, lock, migration completions) |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "vault", "crypto", "migration"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "session", "salt_store", "notes", "export"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "unlock", "save", "load_many", "migrate"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owning user identity for the rows being operated on.
pub const USER_ID: &str = "user_id";

/// Row UUID being operated on.
pub const RECORD_ID: &str = "record_id";

/// Remote table the operation targets.
pub const TABLE: &str = "table";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of rows returned or processed.
pub const ROW_COUNT: &str = "row_count";

/// Number of rows that failed and were degraded or skipped.
pub const ERROR_COUNT: &str = "error_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

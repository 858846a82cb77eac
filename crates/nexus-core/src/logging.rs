//! Structured logging field names shared by every crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (candidate scoring, blocks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "inference", "search", "db", "jobs", "api"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "fallback", "artifact", "helper", "retriever", "backfill"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Provider family ("gemini", "openrouter", "openai").
pub const PROVIDER: &str = "provider";

/// Model identifier.
pub const MODEL: &str = "model";

/// Capability of a chain ("text", "image", "embedding").
pub const CAPABILITY: &str = "capability";

/// 1-based attempt number within a chain.
pub const ATTEMPT: &str = "attempt";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Knowledge document id.
pub const DOCUMENT_ID: &str = "document_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned.
pub const RESULT_COUNT: &str = "result_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

//! Structured logging field name constants for filterable.
//!
//! Both crates use these constants for consistent structured logging fields,
//! so log aggregation can query filter decisions by standardized names.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | WARN  | Recoverable issue, automatic degradation applied (caps exceeded) |
//! | DEBUG | Decision points: dropped keys, per-call summaries |
//! | TRACE | Per-directive iteration, rendered SQL fragments |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "filter", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "engine", "query_string", "pg_query"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "apply", "emit", "push_exists"
pub const OPERATION: &str = "op";

// ─── Filter fields ─────────────────────────────────────────────────────────

/// Raw filter key as received from the client.
pub const FILTER_KEY: &str = "filter_key";

/// Target attribute after classification.
pub const ATTRIBUTE: &str = "attribute";

/// Relation path after classification.
pub const RELATION: &str = "relation";

/// Operator token or parsed operator.
pub const OPERATOR: &str = "operator";

/// Why a key or directive was dropped.
/// Values: "reserved", "rejected", "empty", "unsupported_value",
/// "unknown_operator", "bad_arity", "too_many_values", "key_cap"
pub const REASON: &str = "reason";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of raw keys in the incoming filter map.
pub const KEY_COUNT: &str = "key_count";

/// Number of directives parsed for one field.
pub const DIRECTIVE_COUNT: &str = "directive_count";

/// Number of fields that produced predicates.
pub const APPLIED_COUNT: &str = "applied_count";

/// Number of keys dropped.
pub const DROPPED_COUNT: &str = "dropped_count";

/// Number of bound SQL parameters.
pub const PARAM_COUNT: &str = "param_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

//! Centralized default constants for filterable.
//!
//! **This module is the single source of truth** for shared default values.
//! `FilterConfig::default()` and the serde default functions reference these
//! constants instead of defining their own literals.

// =============================================================================
// REQUEST
// =============================================================================

/// Request parameter the filter map is nested under (`filter[name]=ann`).
pub const REQUEST_KEY: &str = "filter";

/// Pagination/meta keys that are never filter keys.
pub const RESERVED_KEYS: &[&str] = &["page", "per_page", "cursor"];

// =============================================================================
// KEY GRAMMAR
// =============================================================================

/// Canonical relation path separator.
pub const PATH_SEPARATOR: &str = ".";

/// Three-character relation marker of the dash grammar.
pub const DASH_MARKER_LONG: &str = "---";

/// Two-character relation marker of the dash grammar.
pub const DASH_MARKER_SHORT: &str = "--";

/// Escaped literal underscore.
pub const UNDERSCORE_ESCAPE: &str = "__";

// =============================================================================
// LIMITS
// =============================================================================
/// Maximum number of allowed filter keys processed per call. Allowed keys
/// beyond the cap are ignored; reserved and rejected keys do not count.
pub const MAX_FILTER_KEYS: usize = 50;

/// Maximum number of values accepted by one `in`/`notin` directive. Larger
/// lists drop the directive.
pub const MAX_LIST_VALUES: usize = 1000;

// =============================================================================
// LIKE PATTERNS
// =============================================================================

/// Wildcard wrapped around LIKE operands.
pub const LIKE_WILDCARD: char = '%';

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

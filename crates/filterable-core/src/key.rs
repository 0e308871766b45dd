//! Filter key normalization and classification.
//!
//! Raw keys must survive transport as HTTP parameter names, so several key
//! grammars encode the relation path separator differently. Each grammar is
//! an ordered list of plain string rewrites applied once per key; the result
//! always uses `.` as the path separator.

use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::defaults::{DASH_MARKER_LONG, DASH_MARKER_SHORT, PATH_SEPARATOR, UNDERSCORE_ESCAPE};

/// Placeholder used while swapping escaped underscores.
const ESCAPED_UNDERSCORE: &str = "\u{0}";

const DASH_RULES: &[(&str, &str)] = &[
    (DASH_MARKER_LONG, PATH_SEPARATOR),
    (DASH_MARKER_SHORT, PATH_SEPARATOR),
    (UNDERSCORE_ESCAPE, "_"),
];

const UNDERSCORE_RULES: &[(&str, &str)] = &[
    (UNDERSCORE_ESCAPE, ESCAPED_UNDERSCORE),
    ("_", PATH_SEPARATOR),
    (ESCAPED_UNDERSCORE, "_"),
];

/// A single `from` → `to` substring rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
}

impl RewriteRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// How relation paths are spelled inside raw filter keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEncoding {
    /// `author.name`: keys are used as-is.
    #[default]
    DotSeparator,
    /// `author_name` means `author.name`; `first__name` is the literal
    /// attribute `first_name`.
    UnderscoreWithEscape,
    /// `author---name` or `author--name` means `author.name`; `__` collapses
    /// to `_`.
    DashMarker,
    /// Caller-supplied rewrites, applied in order.
    Custom(Vec<RewriteRule>),
}

impl KeyEncoding {
    /// Rewrite a raw key into its canonical dotted form.
    pub fn normalize(&self, raw_key: &str) -> String {
        match self {
            Self::DotSeparator => raw_key.to_string(),
            Self::UnderscoreWithEscape => rewrite(raw_key, UNDERSCORE_RULES.iter().copied()),
            Self::DashMarker => rewrite(raw_key, DASH_RULES.iter().copied()),
            Self::Custom(rules) => rewrite(
                raw_key,
                rules.iter().map(|r| (r.from.as_str(), r.to.as_str())),
            ),
        }
    }
}

fn rewrite<'a>(raw_key: &str, rules: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    rules.fold(raw_key.to_string(), |key, (from, to)| key.replace(from, to))
}

/// Where a normalized key points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyClass {
    /// A column on the primary record.
    Direct { attribute: String },
    /// A column reached through `path` (one or more dot-joined relations).
    Relation { path: String, attribute: String },
    /// Not allowed by the configuration; dropped without a trace.
    Rejected,
}

/// Classify a normalized key against the configured allow-lists.
///
/// A key containing the separator is relation-qualified when its first
/// segment is an allowed relation; the last segment is the attribute and
/// everything before it is the relation path. Anything else must match the
/// attribute allow-list verbatim.
pub fn classify(key: &str, config: &FilterConfig) -> KeyClass {
    if let Some((head, _)) = key.split_once(PATH_SEPARATOR) {
        if config.allows_relation(head) {
            if let Some((path, attribute)) = key.rsplit_once(PATH_SEPARATOR) {
                let well_formed = !attribute.is_empty()
                    && path.split(PATH_SEPARATOR).all(|segment| !segment.is_empty());
                if well_formed {
                    return KeyClass::Relation {
                        path: path.to_string(),
                        attribute: attribute.to_string(),
                    };
                }
            }
        }
    }

    if config.allows_attribute(key) {
        KeyClass::Direct {
            attribute: key.to_string(),
        }
    } else {
        KeyClass::Rejected
    }
}

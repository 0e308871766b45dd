//! Filter engine configuration.
//!
//! A `FilterConfig` is the typed replacement for per-model "filterable"
//! declarations: allow-lists, the key grammar, and the knobs that decide how
//! permissive the engine is. It deserializes from JSON with every field
//! optional, falling back to [`crate::defaults`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::key::KeyEncoding;

/// How relation-qualified keys are recognized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationPolicy {
    /// The first path segment must be in the relation allow-list.
    #[default]
    Strict,
    /// Any key containing the separator is relation-qualified. Intended for
    /// trusted internal tooling only.
    Permissive,
}

/// Configuration for a [`crate::FilterEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Direct attributes clients may filter on. `None` means "not declared".
    pub attributes: Option<BTreeSet<String>>,

    /// Relation base names clients may filter through. `None` means "not
    /// declared".
    pub relations: Option<BTreeSet<String>>,

    /// Treat undeclared allow-lists as "everything allowed". Off by default:
    /// an undeclared allow-list allows nothing.
    pub unrestricted: bool,

    /// Relation recognition policy.
    pub relation_policy: RelationPolicy,

    /// Relation path spelling inside raw keys.
    pub encoding: KeyEncoding,

    /// Request parameter the filter map is nested under.
    pub request_key: String,

    /// Keys stripped before processing (pagination and cursors).
    pub reserved_keys: Vec<String>,

    /// Escape `%`, `_` and `\` in LIKE operands before adding wildcards.
    /// Off by default: client wildcards pass through.
    pub escape_like_wildcards: bool,

    /// Remove single quotes from operator tokens before matching them.
    pub strip_operator_quotes: bool,

    /// Maximum number of allowed keys processed per call.
    pub max_filter_keys: usize,

    /// Maximum number of values in one `in`/`notin` directive.
    pub max_list_values: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            attributes: None,
            relations: None,
            unrestricted: false,
            relation_policy: RelationPolicy::default(),
            encoding: KeyEncoding::default(),
            request_key: defaults::REQUEST_KEY.to_string(),
            reserved_keys: defaults::RESERVED_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            escape_like_wildcards: false,
            strip_operator_quotes: false,
            max_filter_keys: defaults::MAX_FILTER_KEYS,
            max_list_values: defaults::MAX_LIST_VALUES,
        }
    }
}

impl FilterConfig {
    /// Create a configuration with default values and no allow-lists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the direct attribute allow-list.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Declare the relation base-name allow-list.
    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations = Some(relations.into_iter().map(Into::into).collect());
        self
    }

    /// Opt in to treating undeclared allow-lists as unrestricted.
    pub fn unrestricted(mut self, unrestricted: bool) -> Self {
        self.unrestricted = unrestricted;
        self
    }

    pub fn with_relation_policy(mut self, policy: RelationPolicy) -> Self {
        self.relation_policy = policy;
        self
    }

    pub fn with_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_request_key(mut self, key: impl Into<String>) -> Self {
        self.request_key = key.into();
        self
    }

    pub fn with_reserved_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn escape_like_wildcards(mut self, escape: bool) -> Self {
        self.escape_like_wildcards = escape;
        self
    }

    pub fn strip_operator_quotes(mut self, strip: bool) -> Self {
        self.strip_operator_quotes = strip;
        self
    }

    pub fn max_filter_keys(mut self, n: usize) -> Self {
        self.max_filter_keys = n;
        self
    }

    pub fn max_list_values(mut self, n: usize) -> Self {
        self.max_list_values = n;
        self
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.request_key.trim().is_empty() {
            return Err(Error::Config("request_key cannot be empty".to_string()));
        }
        if self.max_filter_keys == 0 {
            return Err(Error::Config(
                "max_filter_keys must be greater than zero".to_string(),
            ));
        }
        if self.max_list_values == 0 {
            return Err(Error::Config(
                "max_list_values must be greater than zero".to_string(),
            ));
        }
        if let KeyEncoding::Custom(rules) = &self.encoding {
            if rules.iter().any(|rule| rule.from.is_empty()) {
                return Err(Error::Config(
                    "custom key encoding rules need a non-empty pattern".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether `key` may be filtered as a direct attribute.
    pub fn allows_attribute(&self, key: &str) -> bool {
        match &self.attributes {
            Some(allowed) => allowed.contains(key),
            None => self.unrestricted,
        }
    }

    /// Whether `head` may start a relation path.
    pub fn allows_relation(&self, head: &str) -> bool {
        match self.relation_policy {
            RelationPolicy::Permissive => true,
            RelationPolicy::Strict => match &self.relations {
                Some(allowed) => allowed.contains(head),
                None => self.unrestricted,
            },
        }
    }

    /// Whether `raw_key` is a pagination/meta key.
    pub fn is_reserved(&self, raw_key: &str) -> bool {
        self.reserved_keys.iter().any(|k| k == raw_key)
    }
}

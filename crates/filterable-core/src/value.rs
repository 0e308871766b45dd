//! Raw filter values as received from a request.
//!
//! A filter map entry is either a scalar (`filter[name]=ann`), an operator
//! map (`filter[status][equal]=open`) or, inside operator maps, a list
//! (`filter[age][between][]=18&filter[age][between][]=30`).

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered map of raw filter keys to values.
pub type RawFilterMap = IndexMap<String, FilterValue>;

/// A single untrusted filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FilterValue>),
    Map(IndexMap<String, FilterValue>),
}

impl FilterValue {
    /// Build an operator map from `(operator, operand)` pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FilterValue>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value.
    pub fn list<V: Into<FilterValue>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// True when the value means "filter not provided".
    ///
    /// Only `null` and the empty string qualify. `"0"`, `0` and `false` are
    /// meaningful values and must not be skipped.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// String form of a scalar value, `None` for lists, maps and null.
    pub fn as_scalar(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Bool(true) => Some(Cow::Borrowed("1")),
            Self::Bool(false) => Some(Cow::Borrowed("0")),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<V: Into<FilterValue>> From<Vec<V>> for FilterValue {
    fn from(items: Vec<V>) -> Self {
        Self::list(items)
    }
}

/// Percent-decode one layer of URL encoding (`+` decodes to a space).
///
/// Total: malformed escapes are kept literally and invalid UTF-8 is replaced.
pub fn url_decode(input: &str) -> String {
    let spaced = input.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

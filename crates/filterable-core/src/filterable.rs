//! Per-model filter declarations.
//!
//! A model opts in by implementing [`Filterable`] and listing what clients
//! may filter on:
//!
//! ```
//! use filterable_core::{Filterable, RecordingQuery};
//!
//! struct Post;
//!
//! impl Filterable for Post {
//!     const FILTERABLE: Option<&'static [&'static str]> = Some(&["title", "status"]);
//!     const FILTERABLE_RELATIONS: Option<&'static [&'static str]> = Some(&["author"]);
//! }
//!
//! let query = Post::apply_request_filters(RecordingQuery::new(), "filter[status][equal]=open")?;
//! assert_eq!(query.where_sql(), "(status = 'open')");
//! # Ok::<(), filterable_core::Error>(())
//! ```

use crate::config::FilterConfig;
use crate::defaults;
use crate::engine::FilterEngine;
use crate::error::Result;
use crate::query::QueryBuilder;
use crate::value::RawFilterMap;

pub trait Filterable {
    /// Direct attributes clients may filter on. `None` allows nothing unless
    /// `filter_config` opts in to unrestricted filtering.
    const FILTERABLE: Option<&'static [&'static str]> = None;

    /// Relation base names clients may filter through.
    const FILTERABLE_RELATIONS: Option<&'static [&'static str]> = None;

    /// Request parameter the filter map is nested under.
    const FILTER_REQUEST_KEY: &'static str = defaults::REQUEST_KEY;

    /// Engine configuration for this model. Override to change the key
    /// encoding, caps or relation policy.
    fn filter_config() -> FilterConfig {
        let mut config = FilterConfig::new().with_request_key(Self::FILTER_REQUEST_KEY);
        if let Some(attributes) = Self::FILTERABLE {
            config = config.with_attributes(attributes.iter().copied());
        }
        if let Some(relations) = Self::FILTERABLE_RELATIONS {
            config = config.with_relations(relations.iter().copied());
        }
        config
    }

    fn filter_engine() -> Result<FilterEngine> {
        FilterEngine::new(Self::filter_config())
    }

    /// Apply an already-extracted filter map.
    fn apply_filters<Q: QueryBuilder>(query: Q, params: &RawFilterMap) -> Result<Q> {
        Self::filter_engine()?.filter(query, params)
    }

    /// Apply the filters found in a raw query string under
    /// `FILTER_REQUEST_KEY`. A query string without them leaves the query
    /// untouched.
    fn apply_request_filters<Q: QueryBuilder>(mut query: Q, raw_query: &str) -> Result<Q> {
        Self::filter_engine()?.apply_query_string(&mut query, raw_query)?;
        Ok(query)
    }
}

//! Filter engine orchestration.
//!
//! One linear pass over the raw filter map: strip reserved keys, normalize,
//! classify, parse, emit. Client input never produces an error; only the
//! query builder can fail, and its errors propagate unchanged.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FilterConfig;
use crate::emit::emit;
use crate::error::Result;
use crate::key::{classify, KeyClass};
use crate::logging::{
    APPLIED_COUNT, COMPONENT, DROPPED_COUNT, FILTER_KEY, KEY_COUNT, OPERATION, REASON, SUBSYSTEM,
};
use crate::operator::parse;
use crate::query::QueryBuilder;
use crate::query_string::{extract_filters, parse_query};
use crate::value::RawFilterMap;

/// Why a raw key produced no predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Pagination or meta key.
    Reserved,
    /// Not in the allow-lists.
    Rejected,
    /// Empty string or null value.
    Empty,
    /// Value had no usable directives (unknown operators, bad operands).
    NoDirectives,
    /// Beyond `max_filter_keys`.
    KeyCap,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Rejected => "rejected",
            Self::Empty => "empty",
            Self::NoDirectives => "no_directives",
            Self::KeyCap => "key_cap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedKey {
    pub key: String,
    pub reason: DropReason,
}

/// What one `apply` call did with each raw key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    /// Raw keys that produced predicates, in input order.
    pub applied: Vec<String>,
    pub dropped: Vec<DroppedKey>,
}

impl FilterOutcome {
    fn drop_key(&mut self, key: &str, reason: DropReason) {
        self.dropped.push(DroppedKey {
            key: key.to_string(),
            reason,
        });
    }
}

/// Applies untrusted filter maps to a query builder under a fixed
/// configuration.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    config: FilterConfig,
}

impl FilterEngine {
    /// Create an engine, rejecting configurations it cannot work with.
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Apply `params` to `query` and hand the query back.
    pub fn filter<Q: QueryBuilder>(&self, mut query: Q, params: &RawFilterMap) -> Result<Q> {
        self.apply(&mut query, params)?;
        Ok(query)
    }

    /// Apply every recognized, allowed key of `params` to `query`.
    ///
    /// Keys are processed in map order. Dropped keys are reported in the
    /// returned outcome and logged at DEBUG; nothing about them reaches the
    /// builder.
    pub fn apply(&self, query: &mut dyn QueryBuilder, params: &RawFilterMap) -> Result<FilterOutcome> {
        let mut outcome = FilterOutcome::default();
        let mut considered = 0usize;

        for (raw_key, value) in params {
            if self.config.is_reserved(raw_key) {
                outcome.drop_key(raw_key, DropReason::Reserved);
                continue;
            }

            let key = self.config.encoding.normalize(raw_key);
            let target = classify(&key, &self.config);
            if target == KeyClass::Rejected {
                debug!(
                    { FILTER_KEY } = %raw_key,
                    { REASON } = DropReason::Rejected.as_str(),
                    "filter: key dropped"
                );
                outcome.drop_key(raw_key, DropReason::Rejected);
                continue;
            }

            // only allowed keys count toward the cap
            considered += 1;
            if considered > self.config.max_filter_keys {
                outcome.drop_key(raw_key, DropReason::KeyCap);
                continue;
            }

            if value.is_blank() {
                outcome.drop_key(raw_key, DropReason::Empty);
                continue;
            }

            let Some(filter) = parse(value, &self.config) else {
                debug!(
                    { FILTER_KEY } = %raw_key,
                    { REASON } = DropReason::NoDirectives.as_str(),
                    "filter: key dropped"
                );
                outcome.drop_key(raw_key, DropReason::NoDirectives);
                continue;
            };

            emit(query, &target, &filter)?;
            outcome.applied.push(raw_key.clone());
        }

        let capped = outcome
            .dropped
            .iter()
            .filter(|d| d.reason == DropReason::KeyCap)
            .count();
        if capped > 0 {
            warn!(
                { REASON } = DropReason::KeyCap.as_str(),
                { DROPPED_COUNT } = capped,
                max = self.config.max_filter_keys,
                "filter: too many filter keys, extra keys ignored"
            );
        }

        debug!(
            { SUBSYSTEM } = "filter",
            { COMPONENT } = "engine",
            { OPERATION } = "apply",
            { KEY_COUNT } = params.len(),
            { APPLIED_COUNT } = outcome.applied.len(),
            { DROPPED_COUNT } = outcome.dropped.len(),
            "filter: applied"
        );
        Ok(outcome)
    }

    /// Parse a raw query string, take the map under the configured request
    /// key and apply it.
    pub fn apply_query_string(&self, query: &mut dyn QueryBuilder, raw: &str) -> Result<FilterOutcome> {
        let params = parse_query(raw);
        let filters = extract_filters(&params, &self.config.request_key);
        self.apply(query, &filters)
    }
}

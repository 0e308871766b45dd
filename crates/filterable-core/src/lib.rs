//! # filterable-core
//!
//! Allow-listed request filtering for query builders.
//!
//! An untrusted filter map (`filter[name]=ann`, `filter[age][gte]=18`,
//! `filter[author.name][in]=ann,bob`) is normalized, checked against the
//! model's allow-lists, parsed into operator directives and emitted into a
//! [`QueryBuilder`]. Relation-qualified keys become an existence scope plus a
//! matching eager load. The backend that renders SQL lives outside this crate
//! (see `filterable-db`).

pub mod config;
pub mod defaults;
pub mod emit;
pub mod engine;
pub mod error;
pub mod filterable;
pub mod key;
pub mod logging;
pub mod operator;
pub mod query;
pub mod query_string;
pub mod recording;
pub mod value;

// Re-export commonly used types at crate root
pub use config::{FilterConfig, RelationPolicy};
pub use engine::{DropReason, DroppedKey, FilterEngine, FilterOutcome};
pub use error::{Error, Result};
pub use filterable::Filterable;
pub use key::{classify, KeyClass, KeyEncoding, RewriteRule};
pub use operator::{Directive, FieldFilter, Operator};
pub use query::{BuildFn, CompareOp, Condition, Connective, Predicate, QueryBuilder};
pub use query_string::{extract_filters, parse_query};
pub use recording::{EagerLoadRecord, QueryNode, RecordingQuery};
pub use value::{FilterValue, RawFilterMap};

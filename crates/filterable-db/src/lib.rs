//! # filterable-db
//!
//! PostgreSQL backend for `filterable-core`.
//!
//! This crate provides:
//! - Table and relation declarations with typed columns
//! - A [`QueryBuilder`](filterable_core::QueryBuilder) that renders
//!   parameterized WHERE fragments and correlated `EXISTS` relation scopes
//! - Eager-load queries filtered by the same predicates
//! - Execution helpers over `sqlx::PgPool`
//!
//! ## Example
//!
//! ```rust,ignore
//! use filterable_core::{FilterConfig, FilterEngine};
//! use filterable_db::{ColumnType, FilteredSelect, PgFilterQuery, TableSchema};
//!
//! let author = TableSchema::new("author");
//! let schema = TableSchema::new("post")
//!     .column("age", ColumnType::Integer)
//!     .belongs_to("author", author, "author_id");
//!
//! let engine = FilterEngine::new(
//!     FilterConfig::new().with_attributes(["age"]).with_relations(["author"]),
//! )?;
//! let mut query = PgFilterQuery::new(&schema);
//! engine.apply_query_string(&mut query, "filter[age][gte]=18&filter[author.name]=ann")?;
//!
//! let rows: Vec<Post> = FilteredSelect::new(query.build()).fetch_all(&pool).await?;
//! ```

pub mod params;
pub mod pg_query;
pub mod schema;
pub mod select;

pub use params::{bind_query, bind_query_as, QueryParam};
pub use pg_query::{EagerLoad, FilterSql, Hop, PgFilterQuery, ROOT_ALIAS};
pub use schema::{quote_ident, validate_identifier, ColumnType, RelationDef, RelationKind, TableSchema};
pub use select::{FilteredSelect, SortDirection};

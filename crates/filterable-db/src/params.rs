//! Bound parameters for rendered filter SQL.
//!
//! Every operand is bound as text and cast in SQL (`$1::bigint`), so one
//! parameter type covers every column type.

use serde::Serialize;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryAs};

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueryParam {
    /// Single text value, cast in SQL.
    Text(String),
    /// Text array for `ANY`/`ALL` comparisons.
    TextArray(Vec<String>),
}

/// Bind `params` onto a query in placeholder order.
pub fn bind_query<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Text(value) => query.bind(value),
            QueryParam::TextArray(values) => query.bind(values),
        };
    }
    query
}

/// Bind `params` onto a typed query in placeholder order.
pub fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    params: &'q [QueryParam],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Text(value) => query.bind(value),
            QueryParam::TextArray(values) => query.bind(values),
        };
    }
    query
}

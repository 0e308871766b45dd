//! Executing filtered queries.

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{FromRow, Row};
use tracing::debug;

use filterable_core::logging::{COMPONENT, DB_TABLE, OPERATION, PARAM_COUNT, RELATION, SUBSYSTEM};
use filterable_core::{Error, Result};

use crate::params::{bind_query, bind_query_as, QueryParam};
use crate::pg_query::{EagerLoad, FilterSql, ROOT_ALIAS};
use crate::schema::quote_ident;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// `SELECT` over the root table restricted by a rendered filter.
#[derive(Debug, Clone)]
pub struct FilteredSelect {
    filter: FilterSql,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl FilteredSelect {
    pub fn new(filter: FilterSql) -> Self {
        Self {
            filter,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn filter(&self) -> &FilterSql {
        &self.filter
    }

    /// Add a sort column. Fails on names that are not plain identifiers.
    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Result<Self> {
        self.order_by.push(format!(
            "\"{}\".{} {}",
            self.filter.alias,
            quote_ident(column)?,
            direction.as_sql()
        ));
        Ok(self)
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn to_sql(&self) -> Result<String> {
        let mut sql = format!(
            "SELECT \"{alias}\".* FROM {table} AS \"{alias}\" WHERE {where_clause}",
            alias = self.filter.alias,
            table = quote_ident(&self.filter.table)?,
            where_clause = self.filter.where_clause,
        );
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        // LIMIT and OFFSET bind after the filter parameters
        let mut next_param = self.filter.params.len() + 1;
        if self.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${}", next_param));
            next_param += 1;
        }
        if self.offset.is_some() {
            sql.push_str(&format!(" OFFSET ${}", next_param));
        }
        Ok(sql)
    }

    pub fn count_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*) AS count FROM {} AS \"{}\" WHERE {}",
            quote_ident(&self.filter.table)?,
            self.filter.alias,
            self.filter.where_clause
        ))
    }

    /// Fetch the filtered rows.
    pub async fn fetch_all<T>(&self, pool: &PgPool) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = self.to_sql()?;
        debug!(
            { SUBSYSTEM } = "db",
            { COMPONENT } = "select",
            { OPERATION } = "fetch_all",
            { DB_TABLE } = %self.filter.table,
            { PARAM_COUNT } = self.filter.params.len(),
            "filter: fetching rows"
        );

        let mut query = bind_query_as(sqlx::query_as::<_, T>(&sql), &self.filter.params);
        if let Some(limit) = self.limit {
            query = query.bind(limit);
        }
        if let Some(offset) = self.offset {
            query = query.bind(offset);
        }
        query.fetch_all(pool).await.map_err(Error::Database)
    }

    /// Count the filtered rows, ignoring LIMIT and OFFSET.
    pub async fn count(&self, pool: &PgPool) -> Result<i64> {
        let sql = self.count_sql()?;
        let row = bind_query(sqlx::query(&sql), &self.filter.params)
            .fetch_one(pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("count"))
    }
}

impl EagerLoad {
    /// Column on the root table whose values are passed as parent keys.
    pub fn parent_key(&self) -> &str {
        self.hops
            .first()
            .map(|hop| hop.parent_key.as_str())
            .unwrap_or_default()
    }

    /// Query for the related rows of a set of parent keys.
    ///
    /// The parent keys bind to `$1` as a text array; the load's own
    /// parameters follow. Multi-hop paths return the rows of the final
    /// relation reachable from those parents.
    pub fn select_sql(&self) -> Result<String> {
        let Some(last) = self.hops.last() else {
            return Err(Error::UnknownRelation(self.relation_path.clone()));
        };

        let mut link = String::new();
        for (i, hop) in self.hops.iter().enumerate() {
            let alias = hop_alias(i, self.hops.len());
            let related_key = quote_ident(&hop.related_key)?;
            let step = if i == 0 {
                match self.parent_key_type {
                    Some(key_type) => format!(
                        "\"{}\".{} = ANY($1::{}[])",
                        alias,
                        related_key,
                        key_type.sql_type()
                    ),
                    None => format!("\"{}\".{}::text = ANY($1::text[])", alias, related_key),
                }
            } else {
                let parent = hop_alias(i - 1, self.hops.len());
                format!(
                    "EXISTS (SELECT 1 FROM {} AS \"{}\" WHERE \"{}\".{} = \"{}\".{} AND {})",
                    quote_ident(&self.hops[i - 1].table)?,
                    parent,
                    alias,
                    related_key,
                    parent,
                    quote_ident(&hop.parent_key)?,
                    link
                )
            };
            link = step;
        }

        let mut sql = format!(
            "SELECT \"{alias}\".* FROM {table} AS \"{alias}\" WHERE {link}",
            alias = ROOT_ALIAS,
            table = quote_ident(&last.table)?,
            link = link,
        );
        if let Some(conditions) = &self.where_clause {
            sql.push_str(&format!(" AND ({})", conditions));
        }
        Ok(sql)
    }

    /// Fetch the related rows for `parent_keys`.
    pub async fn fetch_related<T>(&self, pool: &PgPool, parent_keys: Vec<String>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = self.select_sql()?;
        debug!(
            { SUBSYSTEM } = "db",
            { COMPONENT } = "select",
            { OPERATION } = "fetch_related",
            { RELATION } = %self.relation_path,
            parent_count = parent_keys.len(),
            "filter: fetching eager load"
        );

        let keys = [QueryParam::TextArray(parent_keys)];
        let query = bind_query_as(sqlx::query_as::<_, T>(&sql), &keys);
        bind_query_as(query, &self.params)
            .fetch_all(pool)
            .await
            .map_err(Error::Database)
    }
}

/// Alias of hop `i` in an eager-load query. The final hop is the selected
/// table.
fn hop_alias(i: usize, len: usize) -> String {
    if i + 1 == len {
        ROOT_ALIAS.to_string()
    } else {
        format!("e{}", i)
    }
}

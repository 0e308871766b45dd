//! PostgreSQL query builder.
//!
//! Renders filter predicates into a parameterized WHERE fragment. Relation
//! scopes become correlated `EXISTS` subqueries, one per hop; eager loads
//! become standalone related-row queries keyed by the parent rows.
//!
//! ```text
//! filter[age][gte]=18&filter[author.name]=ann
//!
//! ("t0"."age" >= $1::bigint)
//!   AND EXISTS (SELECT 1 FROM "author" AS "r1"
//!               WHERE "r1"."id" = "t0"."author_id" AND ("r1"."name"::text LIKE $2))
//! ```

use serde::Serialize;
use tracing::{debug, trace};

use filterable_core::logging::{COMPONENT, DB_TABLE, OPERATION, PARAM_COUNT, RELATION, SUBSYSTEM};
use filterable_core::query::{BuildFn, CompareOp, Condition, Connective, Predicate, QueryBuilder};
use filterable_core::{Error, Result};

use crate::params::QueryParam;
use crate::schema::{quote_ident, ColumnType, RelationKind, TableSchema};

/// Alias of the root table in rendered SQL.
pub const ROOT_ALIAS: &str = "t0";

/// One join step of an eager-loaded relation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub relation: String,
    pub kind: RelationKind,
    pub table: String,
    pub parent_key: String,
    pub related_key: String,
}

/// Related rows to fetch alongside the primary query, filtered by the same
/// predicates that scoped the primary rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EagerLoad {
    pub relation_path: String,
    /// Join steps from the root table, outermost first. Never empty.
    pub hops: Vec<Hop>,
    /// Declared type of the first join, taken from the related column or
    /// else the root column. `None` compares both sides as text.
    pub parent_key_type: Option<ColumnType>,
    /// Conditions on the final table, aliased `t0`. `$1` is reserved for the
    /// parent keys, so these placeholders start at `$2`.
    pub where_clause: Option<String>,
    pub params: Vec<QueryParam>,
}

/// Rendered output of a [`PgFilterQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSql {
    pub table: String,
    pub alias: String,
    /// WHERE fragment without the keyword. `TRUE` when nothing was applied.
    pub where_clause: String,
    /// Parameters in placeholder order.
    pub params: Vec<QueryParam>,
    pub eager_loads: Vec<EagerLoad>,
}

/// [`QueryBuilder`] that renders PostgreSQL.
#[derive(Debug)]
pub struct PgFilterQuery<'s> {
    schema: &'s TableSchema,
    alias: String,
    param_offset: usize,
    params: Vec<QueryParam>,
    clauses: Vec<(Connective, String)>,
    next_alias: usize,
    eager_loads: Vec<EagerLoad>,
    nested: bool,
}

impl<'s> PgFilterQuery<'s> {
    pub fn new(schema: &'s TableSchema) -> Self {
        Self::with_param_offset(schema, 0)
    }

    /// Start placeholders after `param_offset` parameters the surrounding
    /// statement already uses.
    pub fn with_param_offset(schema: &'s TableSchema, param_offset: usize) -> Self {
        Self {
            schema,
            alias: ROOT_ALIAS.to_string(),
            param_offset,
            params: Vec::new(),
            clauses: Vec::new(),
            next_alias: 1,
            eager_loads: Vec::new(),
            nested: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.eager_loads.is_empty()
    }

    pub fn build(self) -> FilterSql {
        let where_clause = if self.clauses.is_empty() {
            "TRUE".to_string()
        } else {
            join_clauses(&self.clauses)
        };

        debug!(
            { SUBSYSTEM } = "db",
            { COMPONENT } = "pg_query",
            { OPERATION } = "build",
            { DB_TABLE } = %self.schema.table,
            { PARAM_COUNT } = self.params.len(),
            eager_load_count = self.eager_loads.len(),
            "filter: sql built"
        );

        FilterSql {
            table: self.schema.table.clone(),
            alias: self.alias,
            where_clause,
            params: self.params,
            eager_loads: self.eager_loads,
        }
    }

    /// Builder for a nested scope whose placeholders continue after ours.
    fn scope<'a>(&self, schema: &'a TableSchema, alias: String) -> PgFilterQuery<'a> {
        PgFilterQuery {
            schema,
            alias,
            param_offset: self.param_offset + self.params.len(),
            params: Vec::new(),
            clauses: Vec::new(),
            next_alias: self.next_alias,
            eager_loads: Vec::new(),
            nested: true,
        }
    }

    /// Take back what a nested scope rendered. Returns its joined clauses.
    fn absorb(&mut self, inner: PgFilterQuery<'_>) -> Option<String> {
        self.next_alias = inner.next_alias;
        self.params.extend(inner.params);
        if inner.clauses.is_empty() {
            None
        } else {
            Some(join_clauses(&inner.clauses))
        }
    }

    fn allocate_alias(&mut self) -> String {
        let alias = format!("r{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    fn bind(&mut self, param: QueryParam) -> String {
        self.params.push(param);
        format!("${}", self.param_offset + self.params.len())
    }

    fn render(&mut self, predicate: Predicate) -> Result<String> {
        let column = format!("\"{}\".{}", self.alias, quote_ident(&predicate.field)?);
        let cast = self.schema.column_type(&predicate.field)?.sql_type();

        let sql = match predicate.condition {
            Condition::Compare { op, value } if op.is_pattern() => {
                let placeholder = self.bind(QueryParam::Text(value));
                format!("{}::text {} {}", column, op.as_sql(), placeholder)
            }
            Condition::Compare { op, value } => {
                let placeholder = self.bind(QueryParam::Text(value));
                format!("{} {} {}::{}", column, compare_sql(op), placeholder, cast)
            }
            Condition::In { values, negated } if values.is_empty() => {
                // matches nothing, or excludes nothing
                let constant = if negated { "TRUE" } else { "FALSE" };
                constant.to_string()
            }
            Condition::In { values, negated } => {
                let placeholder = self.bind(QueryParam::TextArray(values));
                if negated {
                    format!("{} <> ALL({}::{}[])", column, placeholder, cast)
                } else {
                    format!("{} = ANY({}::{}[])", column, placeholder, cast)
                }
            }
            Condition::Between { low, high, negated } => {
                let low = self.bind(QueryParam::Text(low));
                let high = self.bind(QueryParam::Text(high));
                let op = if negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {} {}::{} AND {}::{}", column, op, low, cast, high, cast)
            }
            Condition::Null { negated } => {
                let op = if negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", column, op)
            }
        };

        trace!({ DB_TABLE } = %self.schema.table, sql = %sql, "filter: predicate rendered");
        Ok(sql)
    }
}

impl QueryBuilder for PgFilterQuery<'_> {
    fn push_predicate(&mut self, connective: Connective, predicate: Predicate) -> Result<()> {
        let sql = self.render(predicate)?;
        self.clauses.push((connective, sql));
        Ok(())
    }

    fn push_group(&mut self, connective: Connective, build: &BuildFn<'_>) -> Result<()> {
        let mut inner = self.scope(self.schema, self.alias.clone());
        build(&mut inner)?;
        if let Some(body) = self.absorb(inner) {
            self.clauses.push((connective, format!("({})", body)));
        }
        Ok(())
    }

    fn push_exists(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()> {
        let schema = self.schema;
        let hops = schema.resolve(relation_path)?;
        let aliases: Vec<String> = hops.iter().map(|_| self.allocate_alias()).collect();

        let mut tables = Vec::with_capacity(hops.len());
        let mut joins = Vec::with_capacity(hops.len());
        for (i, (_, relation)) in hops.iter().enumerate() {
            let parent = if i == 0 { &self.alias } else { &aliases[i - 1] };
            tables.push(quote_ident(&relation.target.table)?);
            joins.push(format!(
                "\"{}\".{} = \"{}\".{}",
                aliases[i],
                quote_ident(&relation.related_key)?,
                parent,
                quote_ident(&relation.parent_key)?
            ));
        }

        // predicates apply to the innermost hop
        let Some((_, last)) = hops.last() else {
            return Err(Error::UnknownRelation(relation_path.to_string()));
        };
        let innermost = aliases.last().cloned().unwrap_or_default();
        let mut inner = self.scope(&last.target, innermost);
        build(&mut inner)?;
        let conditions = self.absorb(inner);

        let mut sql = String::new();
        for i in (0..hops.len()).rev() {
            let body = if i == hops.len() - 1 {
                match &conditions {
                    Some(conditions) => format!("{} AND ({})", joins[i], conditions),
                    None => joins[i].clone(),
                }
            } else {
                format!("{} AND {}", joins[i], sql)
            };
            sql = format!(
                "EXISTS (SELECT 1 FROM {} AS \"{}\" WHERE {})",
                tables[i], aliases[i], body
            );
        }

        trace!({ RELATION } = %relation_path, sql = %sql, "filter: exists rendered");
        self.clauses.push((Connective::And, sql));
        Ok(())
    }

    fn push_eager_load(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()> {
        if self.nested {
            return Err(nested_eager_load());
        }

        let resolved = self.schema.resolve(relation_path)?;
        let Some((_, last)) = resolved.last() else {
            return Err(Error::UnknownRelation(relation_path.to_string()));
        };

        // repeated registrations of one path narrow the same load
        let existing = self
            .eager_loads
            .iter()
            .position(|load| load.relation_path == relation_path);
        let offset = 1 + existing.map_or(0, |i| self.eager_loads[i].params.len());

        let mut inner = PgFilterQuery::with_param_offset(&last.target, offset);
        inner.nested = true;
        build(&mut inner)?;
        let conditions = if inner.clauses.is_empty() {
            None
        } else {
            Some(join_clauses(&inner.clauses))
        };

        match existing {
            Some(i) => {
                let load = &mut self.eager_loads[i];
                load.params.extend(inner.params);
                load.where_clause = match (load.where_clause.take(), conditions) {
                    (Some(a), Some(b)) => Some(format!("({}) AND ({})", a, b)),
                    (a, b) => a.or(b),
                };
            }
            None => {
                let first = resolved[0].1;
                let parent_key_type = first
                    .target
                    .declared_type(&first.related_key)
                    .or_else(|| self.schema.declared_type(&first.parent_key));
                let hops = resolved
                    .iter()
                    .map(|(name, relation)| Hop {
                        relation: name.to_string(),
                        kind: relation.kind,
                        table: relation.target.table.clone(),
                        parent_key: relation.parent_key.clone(),
                        related_key: relation.related_key.clone(),
                    })
                    .collect();
                self.eager_loads.push(EagerLoad {
                    relation_path: relation_path.to_string(),
                    hops,
                    parent_key_type,
                    where_clause: conditions,
                    params: inner.params,
                });
            }
        }

        trace!({ RELATION } = %relation_path, "filter: eager load registered");
        Ok(())
    }
}

fn compare_sql(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Ne => "<>",
        other => other.as_sql(),
    }
}

fn join_clauses(clauses: &[(Connective, String)]) -> String {
    let mut out = String::new();
    for (i, (connective, sql)) in clauses.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            out.push_str(connective.as_sql());
            out.push(' ');
        }
        out.push_str(sql);
    }
    out
}

fn nested_eager_load() -> Error {
    Error::InvalidInput("eager loads must be registered on the root query".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn schema() -> TableSchema {
        let publisher = TableSchema::new("publisher");
        let author = TableSchema::new("author")
            .column("age", ColumnType::Integer)
            .belongs_to("publisher", publisher, "publisher_id");
        let comment = TableSchema::new("comment").column("votes", ColumnType::Integer);

        TableSchema::new("post")
            .column("age", ColumnType::Integer)
            .column("author_id", ColumnType::Integer)
            .belongs_to("author", author, "author_id")
            .has_many("comments", comment, "post_id")
    }

    fn text(value: &str) -> QueryParam {
        QueryParam::Text(value.to_string())
    }

    #[test]
    fn test_empty_query_is_true() {
        let schema = schema();
        let sql = PgFilterQuery::new(&schema).build();
        assert_eq!(sql.where_clause, "TRUE");
        assert!(sql.params.is_empty());
        assert_eq!(sql.alias, "t0");
    }

    #[test]
    fn test_compare_casts_to_column_type() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query.add_where("age", CompareOp::Gte, "18").unwrap();
        query.add_or_where("title", CompareOp::Ne, "draft").unwrap();
        let sql = query.build();

        assert_eq!(
            sql.where_clause,
            "\"t0\".\"age\" >= $1::bigint OR \"t0\".\"title\" <> $2::text"
        );
        assert_eq!(sql.params, vec![text("18"), text("draft")]);
    }

    #[test]
    fn test_like_compares_as_text() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query.add_where("age", CompareOp::NotLike, "%1%").unwrap();
        assert_eq!(
            query.build().where_clause,
            "\"t0\".\"age\"::text NOT LIKE $1"
        );
    }

    #[test]
    fn test_in_and_not_in() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query
            .add_where_in("age", vec!["1".to_string(), "2".to_string()])
            .unwrap();
        query.add_where_not_in("title", vec!["x".to_string()]).unwrap();
        query.add_where_in("title", Vec::new()).unwrap();
        let sql = query.build();

        assert_eq!(
            sql.where_clause,
            "\"t0\".\"age\" = ANY($1::bigint[]) AND \"t0\".\"title\" <> ALL($2::text[]) AND FALSE"
        );
        assert_eq!(
            sql.params,
            vec![
                QueryParam::TextArray(vec!["1".to_string(), "2".to_string()]),
                QueryParam::TextArray(vec!["x".to_string()]),
            ]
        );
    }

    #[test]
    fn test_between_and_null() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query.add_where_not_between("age", "1", "5").unwrap();
        query.add_where_null("deleted_at").unwrap();
        assert_eq!(
            query.build().where_clause,
            "\"t0\".\"age\" NOT BETWEEN $1::bigint AND $2::bigint AND \"t0\".\"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn test_param_offset() {
        let schema = schema();
        let mut query = PgFilterQuery::with_param_offset(&schema, 2);
        query.add_where("age", CompareOp::Eq, "3").unwrap();
        assert_eq!(query.build().where_clause, "\"t0\".\"age\" = $3::bigint");
    }

    #[test]
    fn test_group_is_parenthesized() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query.add_where("title", CompareOp::Eq, "a").unwrap();
        query
            .add_where_group(&|group| {
                group.add_where("age", CompareOp::Gt, "1")?;
                group.add_or_where("age", CompareOp::Lt, "0")
            })
            .unwrap();
        let sql = query.build();

        assert_eq!(
            sql.where_clause,
            "\"t0\".\"title\" = $1::text AND (\"t0\".\"age\" > $2::bigint OR \"t0\".\"age\" < $3::bigint)"
        );
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn test_empty_group_renders_nothing() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query.add_where_group(&|_| Ok(())).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_exists_belongs_to() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query
            .add_where_exists("author", &|related| {
                related.add_where("age", CompareOp::Gt, "40")
            })
            .unwrap();

        assert_eq!(
            query.build().where_clause,
            "EXISTS (SELECT 1 FROM \"author\" AS \"r1\" WHERE \"r1\".\"id\" = \"t0\".\"author_id\" \
             AND (\"r1\".\"age\" > $1::bigint))"
        );
    }

    #[test]
    fn test_exists_has_many() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query
            .add_where_exists("comments", &|related| {
                related.add_where("votes", CompareOp::Gte, "10")
            })
            .unwrap();

        assert_eq!(
            query.build().where_clause,
            "EXISTS (SELECT 1 FROM \"comment\" AS \"r1\" WHERE \"r1\".\"post_id\" = \"t0\".\"id\" \
             AND (\"r1\".\"votes\" >= $1::bigint))"
        );
    }

    #[test]
    fn test_exists_multi_hop() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query
            .add_where_exists("author.publisher", &|related| related.add_where_not_null("name"))
            .unwrap();

        assert_eq!(
            query.build().where_clause,
            "EXISTS (SELECT 1 FROM \"author\" AS \"r1\" WHERE \"r1\".\"id\" = \"t0\".\"author_id\" \
             AND EXISTS (SELECT 1 FROM \"publisher\" AS \"r2\" WHERE \"r2\".\"id\" = \"r1\".\"publisher_id\" \
             AND (\"r2\".\"name\" IS NOT NULL)))"
        );
    }

    #[test]
    fn test_sibling_exists_scopes_get_distinct_aliases() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        for _ in 0..2 {
            query
                .add_where_exists("author", &|related| related.add_where_null("name"))
                .unwrap();
        }
        let sql = query.build().where_clause;
        assert!(sql.contains("AS \"r1\""));
        assert!(sql.contains("AS \"r2\""));
    }

    #[test]
    fn test_unknown_relation_fails() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        let result = query.add_where_exists("editor", &|_| Ok(()));
        assert!(matches!(result, Err(Error::UnknownRelation(_))));
    }

    #[test]
    fn test_invalid_column_fails() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        let result = query.add_where("meta.color", CompareOp::Eq, "red");
        assert!(matches!(result, Err(Error::InvalidIdentifier(_))));
    }

    #[test]
    fn test_eager_load_conditions_start_after_parent_keys() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query.add_where("title", CompareOp::Eq, "x").unwrap();
        query
            .add_eager_load("author", &|related| related.add_where("age", CompareOp::Lt, "30"))
            .unwrap();
        let sql = query.build();

        let load = &sql.eager_loads[0];
        assert_eq!(load.relation_path, "author");
        assert_eq!(load.parent_key_type, Some(ColumnType::Integer));
        assert_eq!(
            load.where_clause.as_deref(),
            Some("\"t0\".\"age\" < $2::bigint")
        );
        assert_eq!(load.params, vec![text("30")]);
        assert_eq!(sql.params, vec![text("x")]);
    }

    #[test]
    fn test_repeated_eager_load_narrows() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        query
            .add_eager_load("author", &|related| related.add_where("age", CompareOp::Gt, "20"))
            .unwrap();
        query
            .add_eager_load("author", &|related| related.add_where_not_null("name"))
            .unwrap();
        query
            .add_eager_load("author", &|related| related.add_where("age", CompareOp::Lt, "60"))
            .unwrap();
        let sql = query.build();

        assert_eq!(sql.eager_loads.len(), 1);
        assert_eq!(
            sql.eager_loads[0].where_clause.as_deref(),
            Some(
                "((\"t0\".\"age\" > $2::bigint) AND (\"t0\".\"name\" IS NOT NULL)) \
                 AND (\"t0\".\"age\" < $3::bigint)"
            )
        );
        assert_eq!(sql.eager_loads[0].params, vec![text("20"), text("60")]);
    }

    #[test]
    fn test_eager_load_inside_scope_is_rejected() {
        let schema = schema();
        let mut query = PgFilterQuery::new(&schema);
        let result = query.add_where_group(&|group| group.add_eager_load("author", &|_| Ok(())));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

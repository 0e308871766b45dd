//! The query-builder seam.
//!
//! The engine never renders SQL itself. It calls into a [`QueryBuilder`],
//! which owns how predicates, groups, relation-existence scopes and eager
//! loads are expressed for a concrete backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Callback that adds predicates to a nested builder (group, relation scope
/// or eager load). Builders may invoke it once per scope they open.
pub type BuildFn<'a> = dyn Fn(&mut dyn QueryBuilder) -> Result<()> + 'a;

/// How a predicate joins the one before it.
///
/// The first entry of any group has no predecessor, so its connective is
/// ignored when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }

    pub fn is_pattern(self) -> bool {
        matches!(self, Self::Like | Self::NotLike)
    }
}

/// A comparison without its target field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Compare { op: CompareOp, value: String },
    In { values: Vec<String>, negated: bool },
    Between { low: String, high: String, negated: bool },
    Null { negated: bool },
}

impl Condition {
    /// Attach the condition to a field.
    pub fn on(&self, field: impl Into<String>) -> Predicate {
        Predicate {
            field: field.into(),
            condition: self.clone(),
        }
    }
}

/// A single condition on a named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub condition: Condition,
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<String>) -> Self {
        Condition::Compare {
            op,
            value: value.into(),
        }
        .on(field)
    }
}

/// Quote a value for diagnostic rendering. Not for execution.
fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.condition {
            Condition::Compare { op, value } => {
                write!(f, "{} {} {}", field, op.as_sql(), quoted(value))
            }
            Condition::In { values, negated } => {
                let list: Vec<String> = values.iter().map(|v| quoted(v)).collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{} {} ({})", field, op, list.join(", "))
            }
            Condition::Between { low, high, negated } => {
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                write!(f, "{} {} {} AND {}", field, op, quoted(low), quoted(high))
            }
            Condition::Null { negated } => {
                let op = if *negated { "IS NOT NULL" } else { "IS NULL" };
                write!(f, "{} {}", field, op)
            }
        }
    }
}

/// Backend that accumulates filter predicates.
///
/// Required methods are the four primitive mutations; the `add_*` methods
/// are conveniences over them.
pub trait QueryBuilder {
    /// Add a single predicate joined with `connective`.
    fn push_predicate(&mut self, connective: Connective, predicate: Predicate) -> Result<()>;

    /// Add a parenthesized block of predicates produced by `build`.
    fn push_group(&mut self, connective: Connective, build: &BuildFn<'_>) -> Result<()>;

    /// Restrict results to rows with at least one related row (through
    /// `relation_path`) matching the predicates produced by `build`.
    fn push_exists(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()>;

    /// Register an eager load of `relation_path` whose related rows are
    /// filtered by the predicates produced by `build`.
    fn push_eager_load(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()>;

    fn add_where(&mut self, field: &str, op: CompareOp, value: &str) -> Result<()> {
        self.push_predicate(Connective::And, Predicate::compare(field, op, value))
    }

    fn add_or_where(&mut self, field: &str, op: CompareOp, value: &str) -> Result<()> {
        self.push_predicate(Connective::Or, Predicate::compare(field, op, value))
    }

    fn add_where_in(&mut self, field: &str, values: Vec<String>) -> Result<()> {
        let condition = Condition::In {
            values,
            negated: false,
        };
        self.push_predicate(Connective::And, condition.on(field))
    }

    fn add_where_not_in(&mut self, field: &str, values: Vec<String>) -> Result<()> {
        let condition = Condition::In {
            values,
            negated: true,
        };
        self.push_predicate(Connective::And, condition.on(field))
    }

    fn add_where_between(&mut self, field: &str, low: &str, high: &str) -> Result<()> {
        let condition = Condition::Between {
            low: low.to_string(),
            high: high.to_string(),
            negated: false,
        };
        self.push_predicate(Connective::And, condition.on(field))
    }

    fn add_where_not_between(&mut self, field: &str, low: &str, high: &str) -> Result<()> {
        let condition = Condition::Between {
            low: low.to_string(),
            high: high.to_string(),
            negated: true,
        };
        self.push_predicate(Connective::And, condition.on(field))
    }

    fn add_where_null(&mut self, field: &str) -> Result<()> {
        self.push_predicate(Connective::And, Condition::Null { negated: false }.on(field))
    }

    fn add_where_not_null(&mut self, field: &str) -> Result<()> {
        self.push_predicate(Connective::And, Condition::Null { negated: true }.on(field))
    }

    fn add_where_group(&mut self, build: &BuildFn<'_>) -> Result<()> {
        self.push_group(Connective::And, build)
    }

    fn add_where_exists(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()> {
        self.push_exists(relation_path, build)
    }

    fn add_eager_load(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()> {
        self.push_eager_load(relation_path, build)
    }
}

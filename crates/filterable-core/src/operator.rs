//! Operator parsing.
//!
//! Turns one raw filter value into the directives to apply to a field. A
//! scalar becomes a single substring match; an operator map becomes one
//! directive per recognized entry. Anything unrecognized or malformed is
//! dropped without failing the request.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::FilterConfig;
use crate::defaults::{escape_like, LIKE_WILDCARD};
use crate::logging::{OPERATOR, REASON};
use crate::query::{CompareOp, Condition, Connective};
use crate::value::{url_decode, FilterValue};

/// Operators accepted inside an operator map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Like,
    NotLike,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

/// Operand shape an operator expects.
enum Arity {
    Nullary,
    Unary,
    List,
    Pair,
}

impl Operator {
    /// Match a raw operator token.
    ///
    /// Matching trims whitespace and ignores case. Word tokens also ignore
    /// `_`, `-` and spaces, so `not_equal`, `not-equal` and `NotEqual` are
    /// the same operator.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        let symbolic = match token.as_str() {
            "=" | "==" => Some(Self::Equal),
            "!=" | "<>" => Some(Self::NotEqual),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterOrEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessOrEqual),
            _ => None,
        };
        if symbolic.is_some() {
            return symbolic;
        }

        let word: String = token
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();
        let operator = match word.as_str() {
            "equal" | "equals" | "eq" => Self::Equal,
            "notequal" | "ne" | "neq" => Self::NotEqual,
            "gt" | "greaterthan" => Self::GreaterThan,
            "gte" | "greaterorequal" | "greaterthanorequal" => Self::GreaterOrEqual,
            "lt" | "lessthan" => Self::LessThan,
            "lte" | "lessorequal" | "lessthanorequal" => Self::LessOrEqual,
            "like" | "contains" => Self::Like,
            "notlike" => Self::NotLike,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "in" => Self::In,
            "notin" => Self::NotIn,
            "between" => Self::Between,
            "notbetween" => Self::NotBetween,
            "null" | "isnull" => Self::IsNull,
            "notnull" | "isnotnull" => Self::IsNotNull,
            _ => return None,
        };
        Some(operator)
    }

    /// How this operator joins its predecessor inside a field's group.
    ///
    /// `equal` anchors the group and `gte`/`lte` refine a range, so they
    /// join with AND; every other operator is an alternative and joins with
    /// OR.
    pub fn connective(self) -> Connective {
        match self {
            Self::Equal | Self::GreaterOrEqual | Self::LessOrEqual => Connective::And,
            _ => Connective::Or,
        }
    }

    fn arity(self) -> Arity {
        match self {
            Self::IsNull | Self::IsNotNull => Arity::Nullary,
            Self::In | Self::NotIn => Arity::List,
            Self::Between | Self::NotBetween => Arity::Pair,
            _ => Arity::Unary,
        }
    }
}

/// A parsed operator with decoded operands, not yet bound to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub operator: Operator,
    pub condition: Condition,
}

/// The directives produced for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    /// A scalar value: one ungrouped predicate.
    Bare(Directive),
    /// An operator map: one parenthesized group, never empty.
    Grouped(Vec<Directive>),
}

impl FieldFilter {
    pub fn directives(&self) -> &[Directive] {
        match self {
            Self::Bare(directive) => std::slice::from_ref(directive),
            Self::Grouped(directives) => directives,
        }
    }
}

/// Parse a raw value into the directives for one field.
///
/// Returns `None` when nothing survives: blank scalars, lists or null at the
/// top level, and operator maps whose entries were all dropped.
pub fn parse(value: &FilterValue, config: &FilterConfig) -> Option<FieldFilter> {
    match value {
        FilterValue::Map(entries) => {
            let directives: Vec<Directive> = entries
                .iter()
                .filter_map(|(token, operand)| parse_entry(token, operand, config))
                .collect();
            if directives.is_empty() {
                None
            } else {
                Some(FieldFilter::Grouped(directives))
            }
        }
        FilterValue::List(_) | FilterValue::Null => None,
        scalar => {
            let raw = scalar.as_scalar()?;
            if raw.is_empty() {
                return None;
            }
            Some(FieldFilter::Bare(Directive {
                operator: Operator::Like,
                condition: pattern(CompareOp::Like, &url_decode(&raw), true, true, config),
            }))
        }
    }
}

fn parse_entry(token: &str, operand: &FilterValue, config: &FilterConfig) -> Option<Directive> {
    let token = if config.strip_operator_quotes {
        token.replace('\'', "")
    } else {
        token.to_string()
    };

    let Some(operator) = Operator::from_token(&token) else {
        trace!({ OPERATOR } = %token, { REASON } = "unknown_operator", "filter: operator dropped");
        return None;
    };

    let condition = match operator.arity() {
        Arity::Nullary => Condition::Null {
            negated: operator == Operator::IsNotNull,
        },
        Arity::Unary => {
            let Some(raw) = operand.as_scalar() else {
                trace!({ OPERATOR } = %token, { REASON } = "unsupported_value", "filter: operator dropped");
                return None;
            };
            unary_condition(operator, &url_decode(&raw), config)
        }
        Arity::List => {
            let values = list_operand(operand)?;
            if values.len() > config.max_list_values {
                warn!(
                    { OPERATOR } = %token,
                    { REASON } = "too_many_values",
                    count = values.len(),
                    max = config.max_list_values,
                    "filter: list operand over limit, operator dropped"
                );
                return None;
            }
            Condition::In {
                values,
                negated: operator == Operator::NotIn,
            }
        }
        Arity::Pair => {
            let (low, high) = pair_operand(operand)?;
            Condition::Between {
                low,
                high,
                negated: operator == Operator::NotBetween,
            }
        }
    };

    Some(Directive {
        operator,
        condition,
    })
}

fn unary_condition(operator: Operator, value: &str, config: &FilterConfig) -> Condition {
    let compare = |op| Condition::Compare {
        op,
        value: value.to_string(),
    };
    match operator {
        Operator::Equal => compare(CompareOp::Eq),
        Operator::NotEqual => compare(CompareOp::Ne),
        Operator::GreaterThan => compare(CompareOp::Gt),
        Operator::GreaterOrEqual => compare(CompareOp::Gte),
        Operator::LessThan => compare(CompareOp::Lt),
        Operator::LessOrEqual => compare(CompareOp::Lte),
        Operator::NotLike => pattern(CompareOp::NotLike, value, true, true, config),
        Operator::StartsWith => pattern(CompareOp::Like, value, false, true, config),
        Operator::EndsWith => pattern(CompareOp::Like, value, true, false, config),
        _ => pattern(CompareOp::Like, value, true, true, config),
    }
}

/// Build a LIKE condition with wildcards on the requested sides.
fn pattern(op: CompareOp, value: &str, leading: bool, trailing: bool, config: &FilterConfig) -> Condition {
    let body = if config.escape_like_wildcards {
        escape_like(value)
    } else {
        value.to_string()
    };

    let mut value = String::with_capacity(body.len() + 2);
    if leading {
        value.push(LIKE_WILDCARD);
    }
    value.push_str(&body);
    if trailing {
        value.push(LIKE_WILDCARD);
    }
    Condition::Compare { op, value }
}

/// `in` operands: a real list, or a comma-joined string. Each element is
/// decoded on its own.
fn list_operand(operand: &FilterValue) -> Option<Vec<String>> {
    match operand {
        FilterValue::List(items) => items
            .iter()
            .map(|item| item.as_scalar().map(|raw| url_decode(&raw)))
            .collect(),
        other => {
            let raw = other.as_scalar()?;
            Some(raw.split(',').map(url_decode).collect())
        }
    }
}

/// `between` operands: exactly two scalar elements.
fn pair_operand(operand: &FilterValue) -> Option<(String, String)> {
    let FilterValue::List(items) = operand else {
        trace!({ REASON } = "bad_arity", "filter: range operand is not a list");
        return None;
    };
    match items.as_slice() {
        [low, high] => Some((url_decode(&low.as_scalar()?), url_decode(&high.as_scalar()?))),
        _ => {
            trace!({ REASON } = "bad_arity", len = items.len(), "filter: range operand needs two values");
            None
        }
    }
}

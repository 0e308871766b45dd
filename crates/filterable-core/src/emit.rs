//! Predicate emission.
//!
//! Binds parsed directives to their target field and pushes them into a
//! [`QueryBuilder`]. Relation targets are emitted twice through the same
//! callback: once as an existence scope on the base query and once as an
//! eager load, so the related rows that come back match the filter too.

use tracing::trace;

use crate::error::Result;
use crate::key::KeyClass;
use crate::logging::{ATTRIBUTE, DIRECTIVE_COUNT, RELATION};
use crate::operator::{Directive, FieldFilter};
use crate::query::{Connective, QueryBuilder};

/// Push the predicates for one classified key.
///
/// `Rejected` targets are a no-op. Builder failures propagate unchanged.
pub fn emit(query: &mut dyn QueryBuilder, target: &KeyClass, filter: &FieldFilter) -> Result<()> {
    match target {
        KeyClass::Direct { attribute } => {
            trace!(
                { ATTRIBUTE } = %attribute,
                { DIRECTIVE_COUNT } = filter.directives().len(),
                "filter: emit direct"
            );
            apply_conditions(query, attribute, filter)
        }
        KeyClass::Relation { path, attribute } => {
            trace!(
                { RELATION } = %path,
                { ATTRIBUTE } = %attribute,
                { DIRECTIVE_COUNT } = filter.directives().len(),
                "filter: emit relation"
            );
            let scoped = |related: &mut dyn QueryBuilder| apply_conditions(related, attribute, filter);
            query.push_exists(path, &scoped)?;
            query.push_eager_load(path, &scoped)
        }
        KeyClass::Rejected => Ok(()),
    }
}

fn apply_conditions(query: &mut dyn QueryBuilder, field: &str, filter: &FieldFilter) -> Result<()> {
    match filter {
        FieldFilter::Bare(directive) => {
            query.push_predicate(Connective::And, directive.condition.on(field))
        }
        FieldFilter::Grouped(directives) => {
            let (anchors, alternatives): (Vec<&Directive>, Vec<&Directive>) = directives
                .iter()
                .partition(|d| d.operator.connective() == Connective::And);

            let build = |group: &mut dyn QueryBuilder| -> Result<()> {
                for directive in &anchors {
                    group.push_predicate(Connective::And, directive.condition.on(field))?;
                }
                if anchors.is_empty() {
                    push_alternatives(group, field, &alternatives)
                } else if !alternatives.is_empty() {
                    let nested =
                        |any: &mut dyn QueryBuilder| push_alternatives(any, field, &alternatives);
                    group.push_group(Connective::And, &nested)
                } else {
                    Ok(())
                }
            };
            query.push_group(Connective::And, &build)
        }
    }
}

/// Anchors (`equal`, `gte`, `lte`) are ANDed; everything else is one OR
/// block ANDed after them. Input order only affects order within a class.
fn push_alternatives(query: &mut dyn QueryBuilder, field: &str, alternatives: &[&Directive]) -> Result<()> {
    for directive in alternatives {
        query.push_predicate(Connective::Or, directive.condition.on(field))?;
    }
    Ok(())
}

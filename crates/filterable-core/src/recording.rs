//! In-memory [`QueryBuilder`] that records every call.
//!
//! Useful for inspecting what a filter map turns into without a database,
//! and for comparing two filter runs structurally. `where_sql` renders a
//! readable SQL-like form for diagnostics; it is not meant for execution.

use crate::error::Result;
use crate::query::{BuildFn, Connective, Predicate, QueryBuilder};

/// One recorded WHERE entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Predicate {
        connective: Connective,
        predicate: Predicate,
    },
    Group {
        connective: Connective,
        nodes: Vec<QueryNode>,
    },
    Exists {
        relation: String,
        nodes: Vec<QueryNode>,
    },
}

impl QueryNode {
    fn connective(&self) -> Connective {
        match self {
            Self::Predicate { connective, .. } | Self::Group { connective, .. } => *connective,
            Self::Exists { .. } => Connective::And,
        }
    }
}

/// One recorded eager-load registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EagerLoadRecord {
    pub relation: String,
    pub nodes: Vec<QueryNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingQuery {
    pub nodes: Vec<QueryNode>,
    pub eager_loads: Vec<EagerLoadRecord>,
}

impl RecordingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.eager_loads.is_empty()
    }

    /// Render the recorded WHERE entries.
    pub fn where_sql(&self) -> String {
        render(&self.nodes)
    }

    /// Render the first eager load registered for `relation`.
    pub fn eager_load_sql(&self, relation: &str) -> Option<String> {
        self.eager_loads
            .iter()
            .find(|load| load.relation == relation)
            .map(|load| render(&load.nodes))
    }

    /// Every predicate, including those nested in groups and relation
    /// scopes, in call order.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        collect(&self.nodes, &mut out);
        out
    }

    /// Run `build` against a fresh recorder, lifting any eager loads it
    /// registers.
    fn record(&mut self, build: &BuildFn<'_>) -> Result<Vec<QueryNode>> {
        let mut nested = RecordingQuery::new();
        build(&mut nested)?;
        self.eager_loads.append(&mut nested.eager_loads);
        Ok(nested.nodes)
    }
}

impl QueryBuilder for RecordingQuery {
    fn push_predicate(&mut self, connective: Connective, predicate: Predicate) -> Result<()> {
        self.nodes.push(QueryNode::Predicate {
            connective,
            predicate,
        });
        Ok(())
    }

    fn push_group(&mut self, connective: Connective, build: &BuildFn<'_>) -> Result<()> {
        let nodes = self.record(build)?;
        if !nodes.is_empty() {
            self.nodes.push(QueryNode::Group { connective, nodes });
        }
        Ok(())
    }

    fn push_exists(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()> {
        let nodes = self.record(build)?;
        self.nodes.push(QueryNode::Exists {
            relation: relation_path.to_string(),
            nodes,
        });
        Ok(())
    }

    fn push_eager_load(&mut self, relation_path: &str, build: &BuildFn<'_>) -> Result<()> {
        let nodes = self.record(build)?;
        self.eager_loads.push(EagerLoadRecord {
            relation: relation_path.to_string(),
            nodes,
        });
        Ok(())
    }
}

fn render(nodes: &[QueryNode]) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            out.push_str(node.connective().as_sql());
            out.push(' ');
        }
        match node {
            QueryNode::Predicate { predicate, .. } => out.push_str(&predicate.to_string()),
            QueryNode::Group { nodes, .. } => {
                out.push('(');
                out.push_str(&render(nodes));
                out.push(')');
            }
            QueryNode::Exists { relation, nodes } => {
                out.push_str(&format!("EXISTS {} ({})", relation, render(nodes)));
            }
        }
    }
    out
}

fn collect<'a>(nodes: &'a [QueryNode], out: &mut Vec<&'a Predicate>) {
    for node in nodes {
        match node {
            QueryNode::Predicate { predicate, .. } => out.push(predicate),
            QueryNode::Group { nodes, .. } | QueryNode::Exists { nodes, .. } => collect(nodes, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CompareOp;

    #[test]
    fn test_first_connective_is_ignored() {
        let mut query = RecordingQuery::new();
        query.add_or_where("a", CompareOp::Eq, "1").unwrap();
        query.add_where("b", CompareOp::Eq, "2").unwrap();
        query.add_or_where("c", CompareOp::Eq, "3").unwrap();

        assert_eq!(query.where_sql(), "a = '1' AND b = '2' OR c = '3'");
    }

    #[test]
    fn test_convenience_methods() {
        let mut query = RecordingQuery::new();
        query
            .add_where_in("status", vec!["open".to_string(), "closed".to_string()])
            .unwrap();
        query.add_where_not_in("kind", vec!["spam".to_string()]).unwrap();
        query.add_where_between("age", "18", "30").unwrap();
        query.add_where_not_between("score", "0", "10").unwrap();
        query.add_where_null("deleted_at").unwrap();
        query.add_where_not_null("published_at").unwrap();

        assert_eq!(
            query.where_sql(),
            "status IN ('open', 'closed') AND kind NOT IN ('spam') \
             AND age BETWEEN '18' AND '30' AND score NOT BETWEEN '0' AND '10' \
             AND deleted_at IS NULL AND published_at IS NOT NULL"
        );
    }

    #[test]
    fn test_empty_group_is_not_recorded() {
        let mut query = RecordingQuery::new();
        query.add_where_group(&|_group| Ok(())).unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_nested_eager_loads_are_lifted() {
        let mut query = RecordingQuery::new();
        query
            .add_where_group(&|group| {
                group.add_eager_load("author", &|related| {
                    related.add_where("name", CompareOp::Eq, "ann")
                })
            })
            .unwrap();

        assert_eq!(query.eager_loads.len(), 1);
        assert_eq!(
            query.eager_load_sql("author").as_deref(),
            Some("name = 'ann'")
        );
        assert_eq!(query.eager_load_sql("editor"), None);
    }

    #[test]
    fn test_predicates_flattens_nested_nodes() {
        let mut query = RecordingQuery::new();
        query.add_where("a", CompareOp::Eq, "1").unwrap();
        query
            .add_where_exists("author", &|related| {
                related.add_where_group(&|group| group.add_where_null("deleted_at"))
            })
            .unwrap();

        let fields: Vec<&str> = query.predicates().iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "deleted_at"]);
    }
}

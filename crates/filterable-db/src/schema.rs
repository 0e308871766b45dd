//! Table and relation declarations for the PostgreSQL builder.
//!
//! Filter keys name relations and columns; the schema maps those names to
//! tables, join keys and parameter casts. Every name that reaches SQL is
//! validated as a plain identifier and double-quoted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use filterable_core::{Error, Result};

/// PostgreSQL identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a plain SQL identifier.
///
/// Identifiers must:
/// - Not be empty
/// - Not exceed 63 characters
/// - Start with a letter or underscore
/// - Contain only ASCII alphanumerics and underscores
///
/// ```
/// use filterable_db::schema::validate_identifier;
///
/// assert!(validate_identifier("author_id").is_ok());
/// assert!(validate_identifier("1st").is_err());
/// assert!(validate_identifier("name; DROP TABLE post").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidIdentifier(format!(
            "identifier exceeds {} character limit: {}",
            MAX_IDENTIFIER_LEN, name
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::InvalidIdentifier(format!(
                "identifier must start with a letter or underscore: {}",
                name
            )));
        }
    }

    if let Some(ch) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::InvalidIdentifier(format!(
            "identifier contains invalid character '{}': {}",
            ch, name
        )));
    }

    Ok(())
}

/// Validate and double-quote an identifier.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Column type used to cast bound text parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Numeric,
    Boolean,
    Timestamp,
    Uuid,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "bigint",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamptz",
            Self::Uuid => "uuid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The parent row holds the foreign key (`post.author_id -> author.id`).
    BelongsTo,
    /// The related rows hold the foreign key (`post.id <- comment.post_id`).
    /// Also covers one-to-one relations.
    HasMany,
}

/// A named relation from one table to another.
///
/// Rows join on `related.related_key = parent.parent_key` regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    pub kind: RelationKind,
    pub target: TableSchema,
    pub parent_key: String,
    pub related_key: String,
}

/// A table, its typed columns and its outgoing relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub primary_key: String,
    pub columns: IndexMap<String, ColumnType>,
    pub relations: IndexMap<String, RelationDef>,
    /// Reject columns that are not declared instead of comparing them as
    /// text.
    #[serde(default)]
    pub strict_columns: bool,
}

impl TableSchema {
    /// A table whose primary key is `id`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            columns: IndexMap::new(),
            relations: IndexMap::new(),
            strict_columns: false,
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.insert(name.into(), column_type);
        self
    }

    pub fn strict_columns(mut self, strict: bool) -> Self {
        self.strict_columns = strict;
        self
    }

    /// Declare a relation where this table holds `foreign_key`.
    pub fn belongs_to(
        mut self,
        name: impl Into<String>,
        target: TableSchema,
        foreign_key: impl Into<String>,
    ) -> Self {
        let related_key = target.primary_key.clone();
        self.relations.insert(
            name.into(),
            RelationDef {
                kind: RelationKind::BelongsTo,
                target,
                parent_key: foreign_key.into(),
                related_key,
            },
        );
        self
    }

    /// Declare a relation where `target` rows hold `foreign_key`.
    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: TableSchema,
        foreign_key: impl Into<String>,
    ) -> Self {
        let parent_key = self.primary_key.clone();
        self.relations.insert(
            name.into(),
            RelationDef {
                kind: RelationKind::HasMany,
                target,
                parent_key,
                related_key: foreign_key.into(),
            },
        );
        self
    }

    /// Resolve a dotted relation path into its hops, outermost first.
    pub fn resolve(&self, path: &str) -> Result<Vec<(&str, &RelationDef)>> {
        let mut hops = Vec::new();
        let mut current = self;
        for segment in path.split('.') {
            let Some((name, relation)) = current.relations.get_key_value(segment) else {
                return Err(Error::UnknownRelation(format!("{}.{}", self.table, path)));
            };
            hops.push((name.as_str(), relation));
            current = &relation.target;
        }
        Ok(hops)
    }

    /// Type of `column`. Undeclared columns compare as text unless
    /// `strict_columns` is set.
    /// Type of `column` if it was declared.
    pub fn declared_type(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    pub fn column_type(&self, column: &str) -> Result<ColumnType> {
        match self.columns.get(column) {
            Some(column_type) => Ok(*column_type),
            None if self.strict_columns => Err(Error::UnknownColumn(format!(
                "{}.{}",
                self.table, column
            ))),
            None => Ok(ColumnType::Text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts() -> TableSchema {
        let publisher = TableSchema::new("publisher").column("name", ColumnType::Text);
        let author = TableSchema::new("author")
            .column("name", ColumnType::Text)
            .belongs_to("publisher", publisher, "publisher_id");
        let comment = TableSchema::new("comment").column("votes", ColumnType::Integer);

        TableSchema::new("post")
            .column("age", ColumnType::Integer)
            .belongs_to("author", author, "author_id")
            .has_many("comments", comment, "post_id")
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("name").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("created_at2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("meta.color").is_err());
        assert!(validate_identifier("name\"--").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("order").unwrap(), "\"order\"");
        assert!(matches!(
            quote_ident("a b"),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_relation_keys() {
        let schema = posts();
        let author = &schema.relations["author"];
        assert_eq!(author.kind, RelationKind::BelongsTo);
        assert_eq!(author.parent_key, "author_id");
        assert_eq!(author.related_key, "id");

        let comments = &schema.relations["comments"];
        assert_eq!(comments.kind, RelationKind::HasMany);
        assert_eq!(comments.parent_key, "id");
        assert_eq!(comments.related_key, "post_id");
    }

    #[test]
    fn test_resolve_multi_hop() {
        let schema = posts();
        let hops = schema.resolve("author.publisher").unwrap();
        let names: Vec<&str> = hops.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["author", "publisher"]);
        assert_eq!(hops[1].1.target.table, "publisher");
    }

    #[test]
    fn test_resolve_unknown_relation() {
        let err = posts().resolve("author.agent").unwrap_err();
        assert_eq!(err.to_string(), "Unknown relation: post.author.agent");
    }

    #[test]
    fn test_column_type() {
        let schema = posts();
        assert_eq!(schema.column_type("age").unwrap(), ColumnType::Integer);
        assert_eq!(schema.column_type("title").unwrap(), ColumnType::Text);

        let strict = posts().strict_columns(true);
        assert!(matches!(
            strict.column_type("title"),
            Err(Error::UnknownColumn(c)) if c == "post.title"
        ));
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"{
            "table": "post",
            "primary_key": "id",
            "columns": {"age": "integer", "published_at": "timestamp"},
            "relations": {}
        }"#;
        let schema: TableSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.column_type("published_at").unwrap(), ColumnType::Timestamp);
        assert!(!schema.strict_columns);
    }
}

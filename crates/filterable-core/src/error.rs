//! Error types for filterable.
//!
//! The filter engine itself never fails on client input: unknown keys,
//! unknown operators and malformed operands are dropped silently. The
//! variants below are raised by query-builder backends (and by
//! configuration/decoding helpers) and travel through the engine unchanged.

use thiserror::Error;

/// Result type alias using filterable's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for filterable operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Relation path could not be resolved by the query builder
    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    /// Column is not known to the query builder
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Name cannot be used as a SQL identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

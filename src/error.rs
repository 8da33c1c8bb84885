//! Crate error type and result alias.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::loader::BatchLoaderError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AgeError>;

/// Boxed transport error carried by [`AgeError::Database`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Per-field validation detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field (or structural element) the message refers to.
    pub field: String,
    /// Human readable explanation.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors surfaced by the query builder, staging store and batch loader.
#[derive(Debug, Error)]
pub enum AgeError {
    /// A record or query failed validation.
    #[error("validation failed for {context}: {}", join_fields(.issues))]
    Validation {
        /// What was being validated (label, record, query).
        context: String,
        /// Individual failures.
        issues: Vec<FieldError>,
    },
    /// The engine rejected the statement or returned an unexpected shape.
    #[error("query failed: {message}")]
    Query {
        /// Engine (or decoder) message.
        message: String,
        /// Statement that was being executed.
        statement: String,
    },
    /// Transport or connection failure reported by the executor.
    #[error("database error: {message}")]
    Database {
        /// Description of the failure.
        message: String,
        /// Underlying driver error, when available.
        #[source]
        source: Option<BoxError>,
    },
    /// The operation exceeded its time budget.
    #[error(
        "operation timed out after {elapsed:?} (budget {budget:?}); \
         {vertices_created} vertices and {edges_created} edges were committed"
    )]
    Timeout {
        /// Time spent before giving up.
        elapsed: Duration,
        /// Configured budget.
        budget: Duration,
        /// Vertices committed before the timeout.
        vertices_created: u64,
        /// Edges committed before the timeout.
        edges_created: u64,
    },
    /// Edge endpoints could not be matched to existing vertices.
    #[error(
        "edge '{edge_type}' record {index} references a missing vertex \
         (from {from} on '{from_label}', to {to} on '{to_label}')"
    )]
    UnresolvedReference {
        /// Edge type being created.
        edge_type: String,
        /// Position of the record within its type.
        index: usize,
        /// Source vertex label.
        from_label: String,
        /// Source identifier as supplied.
        from: String,
        /// Target vertex label.
        to_label: String,
        /// Target identifier as supplied.
        to: String,
    },
    /// Failure during bulk loading, wrapped with phase/type/record context.
    #[error(transparent)]
    BatchLoader(Box<BatchLoaderError>),
    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl AgeError {
    /// Builds a [`AgeError::Validation`] error.
    pub fn validation(context: impl Into<String>, issues: Vec<FieldError>) -> Self {
        AgeError::Validation {
            context: context.into(),
            issues,
        }
    }

    /// Builds a [`AgeError::Query`] error.
    pub fn query(message: impl Into<String>, statement: impl Into<String>) -> Self {
        AgeError::Query {
            message: message.into(),
            statement: statement.into(),
        }
    }

    /// Builds a [`AgeError::Database`] error without an underlying source.
    pub fn database(message: impl Into<String>) -> Self {
        AgeError::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`AgeError::Database`] error wrapping a driver error.
    pub fn database_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        AgeError::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            AgeError::Validation { .. } => "ValidationError",
            AgeError::Query { .. } => "QueryError",
            AgeError::Database { .. } => "DatabaseError",
            AgeError::Timeout { .. } => "TimeoutError",
            AgeError::UnresolvedReference { .. } => "UnresolvedReference",
            AgeError::BatchLoader(_) => "BatchLoaderError",
            AgeError::Serialization(_) => "SerializationError",
            AgeError::InvalidArgument(_) => "InvalidArgument",
        }
    }

    /// Returns true for transport failures that are safe to retry for
    /// idempotent statements, including loader errors caused by one.
    pub fn is_transient(&self) -> bool {
        match self {
            AgeError::Database { .. } => true,
            AgeError::BatchLoader(err) => err.source.is_transient(),
            _ => false,
        }
    }
}

impl From<BatchLoaderError> for AgeError {
    fn from(value: BatchLoaderError) -> Self {
        AgeError::BatchLoader(Box::new(value))
    }
}

fn join_fields(issues: &[FieldError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

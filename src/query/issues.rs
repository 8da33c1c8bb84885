#![allow(missing_docs)]

use thiserror::Error;

use crate::error::FieldError;
use crate::query::part::PartKind;

/// Problems detected while assembling or validating a query.
///
/// Construction problems are recorded as they happen and surfaced by
/// `validate_query`, `to_cypher` and `execute`, so fluent chains never panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryIssue {
    /// The query has no parts.
    #[error("query has no clauses")]
    EmptyQuery,
    /// The query does not end in a RETURN projection.
    #[error("query must end with a RETURN clause")]
    MissingReturn,
    /// Label, alias, property or graph name is not a Cypher identifier.
    #[error("{kind} '{value}' is not a valid identifier")]
    InvalidIdentifier { kind: &'static str, value: String },
    /// Alias bound twice within one builder.
    #[error("alias '{alias}' is already bound")]
    DuplicateAlias { alias: String },
    /// Alias referenced before a vertex pattern bound it.
    #[error("alias '{alias}' used as {context} is not bound to a vertex")]
    UnboundAlias { alias: String, context: &'static str },
    /// Constraint or predicate value is null or not finite.
    #[error("constraint '{alias}.{prop}' rejected: {reason}")]
    InvalidConstraint {
        alias: String,
        prop: String,
        reason: &'static str,
    },
    /// Clause appears after one it must precede.
    #[error("{part} cannot follow {after}")]
    OutOfOrder { part: PartKind, after: PartKind },
    /// WHERE with nothing to filter.
    #[error("WHERE must follow MATCH, UNWIND or WITH")]
    WhereWithoutSource,
    /// ORDER BY / SKIP / LIMIT without a projection.
    #[error("{part} requires a preceding RETURN or WITH")]
    RequiresProjection { part: PartKind },
    /// SKIP or LIMIT given twice for one projection.
    #[error("{part} given more than once for the same projection")]
    DuplicateClause { part: PartKind },
    /// Clause other than ORDER BY / SKIP / LIMIT after RETURN.
    #[error("{part} cannot follow RETURN")]
    ClauseAfterReturn { part: PartKind },
    /// Projection without items.
    #[error("{part} requires at least one item")]
    EmptyProjection { part: PartKind },
    /// `group_by` without a RETURN to extend.
    #[error("group_by requires a RETURN clause")]
    NothingToGroup,
    /// Raw text contains the `$$` dollar-quote delimiter.
    #[error("clause text must not contain '$$'")]
    DollarQuote,
    /// Label not present in the schema.
    #[error("unknown vertex label '{label}'")]
    UnknownLabel { label: String },
    /// Edge label not present in the schema.
    #[error("unknown edge label '{label}'")]
    UnknownEdgeLabel { label: String },
    /// Property not declared for the label.
    #[error("property '{prop}' is not defined on label '{label}'")]
    UnknownProperty { label: String, prop: String },
    /// `$name` referenced but never bound.
    #[error("parameter '${name}' is referenced but not bound")]
    MissingParameter { name: String },
    /// Same parameter name bound to different values.
    #[error("parameter '${name}' is bound to conflicting values")]
    ParameterConflict { name: String },
    /// Staging key rejected.
    #[error("staging key '{key}' is invalid: {reason}")]
    InvalidStagingKey { key: String, reason: String },
}

impl QueryIssue {
    /// Returns a machine-readable code for the issue.
    pub fn code(&self) -> &'static str {
        match self {
            QueryIssue::EmptyQuery => "EmptyQuery",
            QueryIssue::MissingReturn => "MissingReturn",
            QueryIssue::InvalidIdentifier { .. } => "InvalidIdentifier",
            QueryIssue::DuplicateAlias { .. } => "DuplicateAlias",
            QueryIssue::UnboundAlias { .. } => "UnboundAlias",
            QueryIssue::InvalidConstraint { .. } => "InvalidConstraint",
            QueryIssue::OutOfOrder { .. } => "OutOfOrder",
            QueryIssue::WhereWithoutSource => "OutOfOrder",
            QueryIssue::RequiresProjection { .. } => "OutOfOrder",
            QueryIssue::DuplicateClause { .. } => "DuplicateClause",
            QueryIssue::ClauseAfterReturn { .. } => "OutOfOrder",
            QueryIssue::EmptyProjection { .. } => "EmptyProjection",
            QueryIssue::NothingToGroup => "NothingToGroup",
            QueryIssue::DollarQuote => "DollarQuote",
            QueryIssue::UnknownLabel { .. } => "UnknownLabel",
            QueryIssue::UnknownEdgeLabel { .. } => "UnknownLabel",
            QueryIssue::UnknownProperty { .. } => "UnknownProperty",
            QueryIssue::MissingParameter { .. } => "MissingParameter",
            QueryIssue::ParameterConflict { .. } => "ParameterConflict",
            QueryIssue::InvalidStagingKey { .. } => "InvalidStagingKey",
        }
    }

    /// True for ordering problems.
    pub fn is_ordering(&self) -> bool {
        self.code() == "OutOfOrder" || matches!(self, QueryIssue::DuplicateClause { .. })
    }
}

impl From<&QueryIssue> for FieldError {
    fn from(issue: &QueryIssue) -> Self {
        FieldError::new(issue.code(), issue.to_string())
    }
}

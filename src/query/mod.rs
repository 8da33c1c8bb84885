#![forbid(unsafe_code)]

//! Cypher query construction.
//!
//! A query is an ordered list of [`QueryPart`]s assembled through the fluent
//! [`QueryBuilder`]. Rendering produces Cypher text with `$name` parameter
//! references; execution stages the parameter values in the staging store
//! and replaces each reference with a retrieval call, because AGE cannot bind
//! parameters into the text passed to `cypher()`.

/// Fluent builder, rendering and execution.
pub mod builder;

/// Vertex, edge and return scoped clauses.
pub mod clause;

/// Problems recorded while assembling a query.
pub mod issues;

/// Renderable clause units.
pub mod part;

/// Vertex and edge patterns.
pub mod pattern;

pub(crate) mod render;
mod validate;

pub use builder::{CypherQuery, QueryBuilder};
pub use clause::{CompareOp, EdgeMatch, ReturnClause, VertexMatch};
pub use issues::QueryIssue;
pub use part::{Order, PartKind, Projection, ProjectionExpr, QueryPart};
pub use pattern::{Direction, EdgePattern, Pattern, VertexPattern};

//! Query building, parameter staging and bulk loading for Apache AGE.
//!
//! AGE runs Cypher inside SQL through `ag_catalog.cypher()`, whose query text
//! is a literal that cannot carry bind parameters. This crate works around
//! that by writing dynamic values to a staging table with ordinary SQL binds
//! and reading them back inside Cypher through retrieval functions:
//!
//! - [`query::QueryBuilder`] assembles Cypher clause by clause and executes
//!   it with its parameters staged.
//! - [`staging::StagingStore`] owns the staging table and its entry points.
//! - [`loader::BatchLoader`] validates and loads vertices and edges in
//!   chunks.
//!
//! Connections are supplied by the caller through [`executor::Executor`].

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod ident;
pub mod loader;
pub mod model;
pub mod query;
pub mod schema;
pub mod staging;
pub mod value;

pub use config::{ClientConfig, ConfigError};
pub use error::{AgeError, FieldError, Result};
pub use executor::{in_transaction, AutoCommit, Executor, Row, Session, Transaction};
pub use loader::{
    Atomicity, BatchLoader, BatchLoaderError, KeyScope, LoadIssue, LoadOptions, LoadPhase,
    LoadProgress, LoadResult, LoadWarning, ProgressBarReporter,
};
pub use model::{EntityKind, GraphData, Record};
pub use query::{CompareOp, CypherQuery, Direction, Order, QueryBuilder, QueryIssue};
pub use schema::{
    EdgeDefinition, GraphSchema, PropertyDefinition, PropertyType, SchemaProvider,
    VertexDefinition,
};
pub use staging::{Namespace, StagingKey, StagingStore};
pub use value::Value;

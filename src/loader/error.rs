use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::error::AgeError;
use crate::model::EntityKind;

/// Load phase an issue or progress event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    /// Records checked against the schema.
    Validation,
    /// Chunk written to the staging table.
    Storing,
    /// Creation query run against the staged chunk.
    Creating,
}

impl LoadPhase {
    /// Lowercase phase name.
    pub fn as_str(self) -> &'static str {
        match self {
            LoadPhase::Validation => "validation",
            LoadPhase::Storing => "storing",
            LoadPhase::Creating => "creating",
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure during bulk loading, with the context needed to find the
/// offending data.
#[derive(Debug, Error)]
#[error("{phase} of {kind} '{type_name}'{} failed: {source}", location(*.index, *.batch))]
pub struct BatchLoaderError {
    /// Phase that failed.
    pub phase: LoadPhase,
    /// Vertex or edge.
    pub kind: EntityKind,
    /// Vertex or edge type.
    pub type_name: String,
    /// Position of the record within its type (chunk start for chunk-wide
    /// failures).
    pub index: Option<usize>,
    /// Offending record, when a single one is to blame.
    pub record: Option<JsonValue>,
    /// Zero-based chunk number.
    pub batch: Option<usize>,
    /// Underlying failure.
    #[source]
    pub source: AgeError,
}

fn location(index: Option<usize>, batch: Option<usize>) -> String {
    match (index, batch) {
        (Some(index), Some(batch)) => format!(" record {index} (batch {batch})"),
        (Some(index), None) => format!(" record {index}"),
        (None, Some(batch)) => format!(" batch {batch}"),
        (None, None) => String::new(),
    }
}

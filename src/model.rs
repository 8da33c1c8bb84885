//! Bulk-load data model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A single vertex or edge record.
pub type Record = Map<String, JsonValue>;

/// Whether a record describes a vertex or an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Vertex record.
    Vertex,
    /// Edge record.
    Edge,
}

impl EntityKind {
    /// Lowercase name used in staging keys and entry-point names.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Vertex => "vertex",
            EntityKind::Edge => "edge",
        }
    }

    /// Plural suffix of generated retrieval entry points.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Vertex => "vertices",
            EntityKind::Edge => "edges",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vertices and edges grouped by type name.
///
/// Every edge record carries `from` / `to` fields holding the identifier
/// property of its endpoint vertices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Vertex records keyed by vertex label.
    #[serde(default)]
    pub vertices: BTreeMap<String, Vec<Record>>,
    /// Edge records keyed by edge label.
    #[serde(default)]
    pub edges: BTreeMap<String, Vec<Record>>,
}

impl GraphData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex record.
    pub fn vertex(mut self, label: impl Into<String>, record: Record) -> Self {
        self.vertices.entry(label.into()).or_default().push(record);
        self
    }

    /// Appends an edge record.
    pub fn edge(mut self, label: impl Into<String>, record: Record) -> Self {
        self.edges.entry(label.into()).or_default().push(record);
        self
    }

    /// Total number of vertex records.
    pub fn vertex_total(&self) -> usize {
        self.vertices.values().map(Vec::len).sum()
    }

    /// Total number of edge records.
    pub fn edge_total(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Records of one kind, keyed by type.
    pub fn records(&self, kind: EntityKind) -> &BTreeMap<String, Vec<Record>> {
        match kind {
            EntityKind::Vertex => &self.vertices,
            EntityKind::Edge => &self.edges,
        }
    }
}

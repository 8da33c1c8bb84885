use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::loader::error::{BatchLoaderError, LoadPhase};
use crate::model::EntityKind;

/// Non-fatal per-record failure collected under `continue_on_error`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadIssue {
    /// Phase the failure happened in.
    pub phase: LoadPhase,
    /// Vertex or edge.
    pub kind: EntityKind,
    /// Type of the record.
    pub type_name: String,
    /// Position of the record within its type.
    pub index: Option<usize>,
    /// The record itself, when a single one is to blame.
    pub record: Option<JsonValue>,
    /// Code of the underlying error.
    pub code: &'static str,
    /// Human readable message.
    pub message: String,
}

impl From<&BatchLoaderError> for LoadIssue {
    fn from(err: &BatchLoaderError) -> Self {
        Self {
            phase: err.phase,
            kind: err.kind,
            type_name: err.type_name.clone(),
            index: err.index,
            record: err.record.clone(),
            code: err.source.code(),
            message: err.source.to_string(),
        }
    }
}

/// Something worth knowing that did not prevent any record from loading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    /// Machine-readable code.
    pub code: &'static str,
    /// Human readable message.
    pub message: String,
}

/// Outcome of a load call. Read-only once returned.
#[derive(Clone, Debug)]
pub struct LoadResult {
    batch_id: String,
    started_at: OffsetDateTime,
    duration: Duration,
    vertex_counts: BTreeMap<String, u64>,
    edge_counts: BTreeMap<String, u64>,
    warnings: Vec<LoadWarning>,
    errors: Vec<LoadIssue>,
}

impl LoadResult {
    /// True when no record failed.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Vertices created across all types.
    pub fn vertex_count(&self) -> u64 {
        self.vertex_counts.values().sum()
    }

    /// Edges created across all types.
    pub fn edge_count(&self) -> u64 {
        self.edge_counts.values().sum()
    }

    /// Vertices created per type.
    pub fn vertex_counts(&self) -> &BTreeMap<String, u64> {
        &self.vertex_counts
    }

    /// Edges created per type.
    pub fn edge_counts(&self) -> &BTreeMap<String, u64> {
        &self.edge_counts
    }

    /// Wall time of the call.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// When the call started.
    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// Warnings in the order they were raised.
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Per-record failures in the order they were found.
    pub fn errors(&self) -> &[LoadIssue] {
        &self.errors
    }

    /// Namespace the call staged its data under.
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

impl fmt::Display for LoadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let started = self
            .started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.started_at.unix_timestamp().to_string());
        write!(
            f,
            "load {} started {}: {} vertices, {} edges in {:.0}ms ({} errors, {} warnings)",
            self.batch_id,
            started,
            self.vertex_count(),
            self.edge_count(),
            self.duration.as_secs_f64() * 1_000.0,
            self.errors.len(),
            self.warnings.len()
        )
    }
}

/// Append-only accumulator sealed into a [`LoadResult`].
#[derive(Debug)]
pub(crate) struct LoadTally {
    batch_id: String,
    started_at: OffsetDateTime,
    vertex_counts: BTreeMap<String, u64>,
    edge_counts: BTreeMap<String, u64>,
    warnings: Vec<LoadWarning>,
    errors: Vec<LoadIssue>,
}

impl LoadTally {
    pub(crate) fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            started_at: OffsetDateTime::now_utc(),
            vertex_counts: BTreeMap::new(),
            edge_counts: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn counts(&mut self, kind: EntityKind) -> &mut BTreeMap<String, u64> {
        match kind {
            EntityKind::Vertex => &mut self.vertex_counts,
            EntityKind::Edge => &mut self.edge_counts,
        }
    }

    /// Registers a type so it is reported even when nothing was created.
    pub(crate) fn register(&mut self, kind: EntityKind, type_name: &str) {
        self.counts(kind).entry(type_name.to_owned()).or_insert(0);
    }

    pub(crate) fn created(&mut self, kind: EntityKind, type_name: &str, count: u64) {
        *self.counts(kind).entry(type_name.to_owned()).or_insert(0) += count;
    }

    pub(crate) fn error(&mut self, issue: LoadIssue) {
        self.errors.push(issue);
    }

    pub(crate) fn warn(&mut self, code: &'static str, message: impl Into<String>) {
        self.warnings.push(LoadWarning {
            code,
            message: message.into(),
        });
    }

    pub(crate) fn committed(&self) -> (u64, u64) {
        (
            self.vertex_counts.values().sum(),
            self.edge_counts.values().sum(),
        )
    }

    pub(crate) fn seal(self, duration: Duration) -> LoadResult {
        LoadResult {
            batch_id: self.batch_id,
            started_at: self.started_at,
            duration,
            vertex_counts: self.vertex_counts,
            edge_counts: self.edge_counts,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}

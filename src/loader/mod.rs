//! Bulk loading of vertices and edges through the staging table.
//!
//! A load runs in strictly ordered phases:
//!
//! 1. **Validation** of every record of every type against the schema. By
//!    default the first invalid record aborts the call before anything is
//!    staged; with `continue_on_error` invalid records are reported and left
//!    out.
//! 2. **Storing** and **creating**, one chunk of `batch_size` records at a
//!    time: the chunk is upserted under its type's staging key, a statement
//!    unwinding that key creates the records, and the key is deleted, all in
//!    one transaction. Every vertex type finishes before the first edge type
//!    starts, since an edge may reference any vertex type.
//!
//! With the default [`Atomicity::Chunked`] a failing chunk rolls back alone;
//! chunks committed before it stay committed. Large loads therefore make
//! partial progress instead of being all-or-nothing. Use
//! [`Atomicity::Atomic`] to trade that for a single transaction.
//!
//! Staging rows written by a call are swept when the call returns, on every
//! exit path.

mod error;
mod options;
mod progress;
mod result;
mod synth;

pub use error::{BatchLoaderError, LoadPhase};
pub use options::{
    Atomicity, KeyScope, LoadOptions, ProgressCallback, DEFAULT_BATCH_SIZE,
    DEFAULT_TRANSACTION_TIMEOUT,
};
pub use progress::{LoadProgress, ProgressBarReporter};
pub use result::{LoadIssue, LoadResult, LoadWarning};

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{AgeError, FieldError, Result};
use crate::executor::{in_transaction, AutoCommit, Executor, Session, Transaction};
use crate::ident::is_identifier;
use crate::model::{EntityKind, GraphData, Record};
use crate::schema::{SchemaProvider, EDGE_FROM_FIELD, EDGE_TO_FIELD};
use crate::staging::{Namespace, StagingKey, StagingStore};

use result::LoadTally;
use synth::{Endpoints, CREATED_COLUMN, INDEX_COLUMN, INDEX_FIELD};

/// Loads [`GraphData`] into an AGE graph in chunks.
pub struct BatchLoader {
    executor: Arc<dyn Executor>,
    schema: Arc<dyn SchemaProvider>,
    graph: String,
    staging: StagingStore,
}

/// Records of one type as handed in by the caller.
struct TypeInput<'d> {
    kind: EntityKind,
    type_name: &'d str,
    records: &'d [Record],
}

/// Validated, tagged records of one type plus their creation statement.
struct TypeJob {
    kind: EntityKind,
    type_name: String,
    key: StagingKey,
    statement: String,
    rows: Vec<JsonValue>,
    endpoints: Option<Endpoints>,
}

struct RecordFailure {
    index: Option<usize>,
    issues: Vec<FieldError>,
}

struct ChunkOutcome {
    created: u64,
    unresolved: Vec<BatchLoaderError>,
}

struct RunContext<'a> {
    options: &'a LoadOptions,
    started: Instant,
    atomic: bool,
    tally: Mutex<LoadTally>,
    abort: AtomicBool,
}

impl RunContext<'_> {
    fn check_deadline(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        let budget = self.options.transaction_timeout;
        if elapsed < budget {
            return Ok(());
        }
        // An atomic load rolls back entirely, so nothing stays committed.
        let (vertices_created, edges_created) = if self.atomic {
            (0, 0)
        } else {
            self.tally.lock().committed()
        };
        Err(AgeError::Timeout {
            elapsed,
            budget,
            vertices_created,
            edges_created,
        })
    }

    fn report(&self, progress: LoadProgress) {
        if let Some(callback) = &self.options.progress {
            callback(&progress);
        }
    }
}

impl BatchLoader {
    /// Creates a loader writing to `graph`.
    pub fn new(
        executor: Arc<dyn Executor>,
        schema: Arc<dyn SchemaProvider>,
        graph: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            schema,
            graph: graph.into(),
            staging: StagingStore::default(),
        }
    }

    /// Uses a non-default staging store.
    pub fn with_staging(mut self, staging: StagingStore) -> Self {
        self.staging = staging;
        self
    }

    /// Target graph.
    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Loads every vertex type, then every edge type.
    pub fn load_graph_data(&self, data: &GraphData, options: &LoadOptions) -> Result<LoadResult> {
        self.run(inputs(data), options)
    }

    /// Loads records of a single vertex type.
    pub fn load_vertices(
        &self,
        type_name: &str,
        records: &[Record],
        options: &LoadOptions,
    ) -> Result<LoadResult> {
        let input = TypeInput {
            kind: EntityKind::Vertex,
            type_name,
            records,
        };
        self.run(vec![input], options)
    }

    /// Loads records of a single edge type. Endpoint vertices must already
    /// exist; edges whose endpoints do not match are reported per record.
    pub fn load_edges(
        &self,
        type_name: &str,
        records: &[Record],
        options: &LoadOptions,
    ) -> Result<LoadResult> {
        let input = TypeInput {
            kind: EntityKind::Edge,
            type_name,
            records,
        };
        self.run(vec![input], options)
    }

    /// Checks every record without loading anything.
    pub fn validate_graph_data(&self, data: &GraphData) -> Vec<LoadIssue> {
        inputs(data)
            .iter()
            .flat_map(|input| {
                self.check_type(input)
                    .into_iter()
                    .map(|failure| LoadIssue::from(&validation_error(input, failure)))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn run(&self, inputs: Vec<TypeInput<'_>>, options: &LoadOptions) -> Result<LoadResult> {
        options.check()?;
        if !is_identifier(&self.graph) {
            return Err(AgeError::InvalidArgument(format!(
                "graph name '{}' is not a valid identifier",
                self.graph
            )));
        }
        let namespace = Namespace::generate();
        let ctx = RunContext {
            options,
            started: Instant::now(),
            atomic: options.atomicity == Atomicity::Atomic,
            tally: Mutex::new(LoadTally::new(namespace.as_str())),
            abort: AtomicBool::new(false),
        };
        info!(
            batch_id = %namespace,
            graph = %self.graph,
            types = inputs.len(),
            records = inputs.iter().map(|i| i.records.len()).sum::<usize>(),
            atomicity = ?options.atomicity,
            "loader.load.begin"
        );

        let jobs = self.prepare(&inputs, &ctx, &namespace)?;
        let _scope = StagingScope::new(self, &namespace, options.key_scope, &jobs);

        let split = jobs
            .iter()
            .position(|job| job.kind == EntityKind::Edge)
            .unwrap_or(jobs.len());
        let (vertex_jobs, edge_jobs) = jobs.split_at(split);
        let outcome = if ctx.atomic {
            in_transaction(self.executor.as_ref(), |tx| {
                for job in &jobs {
                    self.load_type(&ctx, job, Some(&mut *tx))?;
                }
                Ok(())
            })
        } else {
            let workers = options.workers();
            self.run_jobs(&ctx, vertex_jobs, workers)
                .and_then(|()| self.run_jobs(&ctx, edge_jobs, workers))
        };
        if let Err(err) = outcome {
            warn!(batch_id = %namespace, error = %err, "loader.load.failed");
            return Err(err);
        }

        let result = ctx.tally.into_inner().seal(ctx.started.elapsed());
        info!(
            batch_id = %namespace,
            vertices = result.vertex_count(),
            edges = result.edge_count(),
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            elapsed_ms = result.duration().as_millis() as u64,
            "loader.load.completed"
        );
        Ok(result)
    }

    /// Validates every type, then synthesizes one job per type with records.
    fn prepare(
        &self,
        inputs: &[TypeInput<'_>],
        ctx: &RunContext<'_>,
        namespace: &Namespace,
    ) -> Result<Vec<TypeJob>> {
        let mut excluded = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut skip = HashSet::new();
            let mut skip_all = false;
            for failure in self.check_type(input) {
                let err = validation_error(input, failure);
                if !ctx.options.continue_on_error {
                    return Err(err.into());
                }
                match err.index {
                    Some(index) => {
                        skip.insert(index);
                    }
                    None => skip_all = true,
                }
                ctx.tally.lock().error(LoadIssue::from(&err));
            }
            excluded.push((skip, skip_all));
        }

        let mut jobs = Vec::new();
        for (input, (skip, skip_all)) in inputs.iter().zip(excluded) {
            ctx.tally.lock().register(input.kind, input.type_name);
            if skip_all {
                continue;
            }
            let kept: Vec<(usize, &Record)> = input
                .records
                .iter()
                .enumerate()
                .filter(|(index, _)| !skip.contains(index))
                .collect();
            if kept.is_empty() {
                continue;
            }
            jobs.push(self.job(input, &kept, ctx, namespace)?);
        }
        Ok(jobs)
    }

    fn job(
        &self,
        input: &TypeInput<'_>,
        kept: &[(usize, &Record)],
        ctx: &RunContext<'_>,
        namespace: &Namespace,
    ) -> Result<TypeJob> {
        let columns = synth::columns(
            self.schema.as_ref(),
            input.kind,
            input.type_name,
            kept.iter().map(|(_, record)| *record),
        );
        if !columns.dropped.is_empty() {
            ctx.tally.lock().warn(
                "UndeclaredFields",
                format!(
                    "{} '{}': fields {} are not declared and were not stored",
                    input.kind,
                    input.type_name,
                    columns.dropped.join(", ")
                ),
            );
        }

        let (key, source) = match ctx.options.key_scope {
            KeyScope::PerCall => {
                let key = namespace.key(&format!("{}_{}", input.kind, input.type_name))?;
                let source = self.staging.array_retrieval_call(&key);
                (key, source)
            }
            KeyScope::Shared => {
                let key = StagingStore::shared_key(input.kind, input.type_name)?;
                let source = self
                    .staging
                    .ensure_type_entry_points(
                        &mut AutoCommit::new(self.executor.as_ref()),
                        input.kind,
                        input.type_name,
                    )
                    .map_err(|source| {
                        AgeError::from(BatchLoaderError {
                            phase: LoadPhase::Storing,
                            kind: input.kind,
                            type_name: input.type_name.to_owned(),
                            index: None,
                            record: None,
                            batch: None,
                            source,
                        })
                    })?;
                (key, source)
            }
        };

        let (statement, endpoints) = match input.kind {
            EntityKind::Vertex => (
                synth::vertex_statement(&self.graph, &source, input.type_name, &columns.stored),
                None,
            ),
            EntityKind::Edge => {
                let endpoints = Endpoints::resolve(self.schema.as_ref(), input.type_name)
                    .ok_or_else(|| {
                        AgeError::InvalidArgument(format!(
                            "edge type '{}' has no declared endpoints",
                            input.type_name
                        ))
                    })?;
                let statement = synth::edge_statement(
                    &self.graph,
                    &source,
                    input.type_name,
                    &endpoints,
                    &columns.stored,
                );
                (statement, Some(endpoints))
            }
        };

        let rows = kept
            .iter()
            .map(|(index, record)| {
                let mut tagged = (*record).clone();
                tagged.insert(INDEX_FIELD.to_owned(), JsonValue::from(*index));
                JsonValue::Object(tagged)
            })
            .collect();
        Ok(TypeJob {
            kind: input.kind,
            type_name: input.type_name.to_owned(),
            key,
            statement,
            rows,
            endpoints,
        })
    }

    fn check_type(&self, input: &TypeInput<'_>) -> Vec<RecordFailure> {
        let schema = self.schema.as_ref();
        let type_name = input.type_name;
        let known = match input.kind {
            EntityKind::Vertex => schema.is_vertex_label(type_name),
            EntityKind::Edge => schema.is_edge_label(type_name),
        };
        let type_issue = if !known {
            Some(format!("unknown {} type '{type_name}'", input.kind))
        } else if !is_identifier(type_name) {
            Some(format!("'{type_name}' is not a valid identifier"))
        } else if input.kind == EntityKind::Edge {
            match schema.edge_endpoints(type_name) {
                Some((from, to)) if schema.is_vertex_label(from) && schema.is_vertex_label(to) => {
                    None
                }
                Some((from, to)) => Some(format!(
                    "endpoints {from} -> {to} of '{type_name}' are not both vertex types"
                )),
                None => Some(format!("edge type '{type_name}' has no declared endpoints")),
            }
        } else {
            None
        };
        if let Some(message) = type_issue {
            return vec![RecordFailure {
                index: None,
                issues: vec![FieldError::new("type", message)],
            }];
        }

        let id_property = synth::vertex_id_property(schema, type_name);
        let mut seen_ids = HashSet::new();
        let mut failures = Vec::new();
        for (index, record) in input.records.iter().enumerate() {
            let mut issues = Vec::new();
            for key in record.keys() {
                if key == INDEX_FIELD {
                    issues.push(FieldError::new(key, "is reserved"));
                } else if !is_identifier(key) {
                    issues.push(FieldError::new(key, "is not a valid property name"));
                }
            }
            match input.kind {
                EntityKind::Vertex => match record.get(id_property) {
                    None | Some(JsonValue::Null) => {
                        issues.push(FieldError::new(id_property, "is required"));
                    }
                    Some(value) if !is_scalar(value) => {
                        issues.push(FieldError::new(id_property, "must be a scalar identifier"));
                    }
                    Some(value) => {
                        if !seen_ids.insert(value.to_string()) {
                            issues.push(FieldError::new(
                                id_property,
                                format!("duplicate identifier {value}"),
                            ));
                        }
                    }
                },
                EntityKind::Edge => {
                    for field in [EDGE_FROM_FIELD, EDGE_TO_FIELD] {
                        match record.get(field) {
                            None | Some(JsonValue::Null) => {
                                issues.push(FieldError::new(field, "is required"));
                            }
                            Some(value) if !is_scalar(value) => {
                                issues.push(FieldError::new(field, "must be a scalar identifier"));
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
            for issue in schema.validate(type_name, record) {
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
            if !issues.is_empty() {
                failures.push(RecordFailure {
                    index: Some(index),
                    issues,
                });
            }
        }
        failures
    }

    /// Loads jobs with up to `workers` types in flight. Each worker owns one
    /// type at a time, and types have distinct staging keys.
    fn run_jobs(&self, ctx: &RunContext<'_>, jobs: &[TypeJob], workers: usize) -> Result<()> {
        if workers <= 1 || jobs.len() <= 1 {
            for job in jobs {
                self.load_type(ctx, job, None)?;
            }
            return Ok(());
        }
        let next = AtomicUsize::new(0);
        let failure: Mutex<Option<AgeError>> = Mutex::new(None);
        thread::scope(|scope| {
            for _ in 0..workers.min(jobs.len()) {
                scope.spawn(|| loop {
                    if ctx.abort.load(Ordering::Acquire) {
                        break;
                    }
                    let Some(job) = jobs.get(next.fetch_add(1, Ordering::AcqRel)) else {
                        break;
                    };
                    if let Err(err) = self.load_type(ctx, job, None) {
                        ctx.abort.store(true, Ordering::Release);
                        let mut slot = failure.lock();
                        if slot.is_none() {
                            *slot = Some(err);
                        }
                        break;
                    }
                });
            }
        });
        match failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Loads one type chunk by chunk, in its own transaction per chunk or
    /// inside `tx` for atomic loads.
    fn load_type(
        &self,
        ctx: &RunContext<'_>,
        job: &TypeJob,
        mut tx: Option<&mut (dyn Transaction + '_)>,
    ) -> Result<()> {
        let batch_size = ctx.options.batch_size;
        let total = job.rows.len();
        let total_batches = total.div_ceil(batch_size);
        for (batch, chunk) in job.rows.chunks(batch_size).enumerate() {
            if ctx.abort.load(Ordering::Acquire) {
                return Ok(());
            }
            ctx.check_deadline()?;
            let start = batch * batch_size;
            let outcome = match tx.as_deref_mut() {
                Some(tx) => self
                    .stage_chunk(tx, job, chunk, start, batch)
                    .and_then(|()| self.create_chunk(tx, ctx, job, chunk, batch)),
                None => self.staging.with_staged(
                    self.executor.as_ref(),
                    |tx| self.stage_chunk(tx, job, chunk, start, batch),
                    |tx| self.create_chunk(tx, ctx, job, chunk, batch),
                ),
            };
            match outcome {
                Ok(outcome) => {
                    let mut tally = ctx.tally.lock();
                    tally.created(job.kind, &job.type_name, outcome.created);
                    for err in &outcome.unresolved {
                        tally.error(LoadIssue::from(err));
                    }
                    debug!(
                        kind = %job.kind,
                        type_name = %job.type_name,
                        batch,
                        created = outcome.created,
                        unresolved = outcome.unresolved.len(),
                        "loader.chunk.completed"
                    );
                }
                Err(err) => {
                    let err = match err {
                        AgeError::BatchLoader(inner) => *inner,
                        other => job.wrap(LoadPhase::Creating, Some(start), None, batch, other),
                    };
                    if !ctx.options.continue_on_error || ctx.atomic {
                        return Err(err.into());
                    }
                    warn!(
                        kind = %job.kind,
                        type_name = %job.type_name,
                        batch,
                        error = %err,
                        "loader.chunk.failed"
                    );
                    ctx.tally.lock().error(LoadIssue::from(&err));
                }
            }
            ctx.report(LoadProgress {
                phase: LoadPhase::Creating,
                kind: job.kind,
                type_name: job.type_name.clone(),
                processed: start + chunk.len(),
                total,
                batch: batch + 1,
                total_batches,
                elapsed: ctx.started.elapsed(),
            });
        }
        Ok(())
    }

    /// Writes one chunk under the job's staging key.
    fn stage_chunk<S: Session + ?Sized>(
        &self,
        session: &mut S,
        job: &TypeJob,
        chunk: &[JsonValue],
        start: usize,
        batch: usize,
    ) -> Result<()> {
        let payload = JsonValue::Array(chunk.to_vec());
        self.staging
            .upsert(session, &job.key, &payload)
            .map_err(|e| job.error(LoadPhase::Storing, start, batch, e))
    }

    /// Runs the creation statement over the staged chunk and deletes the key.
    fn create_chunk<S: Session + ?Sized>(
        &self,
        session: &mut S,
        ctx: &RunContext<'_>,
        job: &TypeJob,
        chunk: &[JsonValue],
        batch: usize,
    ) -> Result<ChunkOutcome> {
        let start = batch * ctx.options.batch_size;
        let rows = session
            .execute(&job.statement, &[])
            .map_err(|e| job.error(LoadPhase::Creating, start, batch, e))?;
        self.staging
            .delete(session, &job.key)
            .map_err(|e| job.error(LoadPhase::Storing, start, batch, e))?;

        match job.kind {
            EntityKind::Vertex => {
                let created = rows
                    .first()
                    .and_then(|row| row.get(CREATED_COLUMN))
                    .and_then(as_count)
                    .ok_or_else(|| {
                        let err = AgeError::query(
                            "vertex creation returned no count",
                            job.statement.clone(),
                        );
                        job.error(LoadPhase::Creating, start, batch, err)
                    })?;
                Ok(ChunkOutcome {
                    created,
                    unresolved: Vec::new(),
                })
            }
            EntityKind::Edge => {
                let created: BTreeSet<u64> = rows
                    .iter()
                    .filter_map(|row| row.get(INDEX_COLUMN).and_then(as_count))
                    .collect();
                let mut unresolved: Vec<BatchLoaderError> = chunk
                    .iter()
                    .filter_map(|row| {
                        let index = row.get(INDEX_FIELD).and_then(JsonValue::as_u64)?;
                        (!created.contains(&index)).then(|| job.unresolved(row, index, batch))
                    })
                    .collect();
                if !unresolved.is_empty() && !ctx.options.continue_on_error {
                    return Err(unresolved.swap_remove(0).into());
                }
                // Records loaded, not edges: an endpoint id matching several
                // vertices yields one row per edge created.
                Ok(ChunkOutcome {
                    created: created.len() as u64,
                    unresolved,
                })
            }
        }
    }
}

impl TypeJob {
    fn error(&self, phase: LoadPhase, index: usize, batch: usize, source: AgeError) -> AgeError {
        AgeError::from(self.wrap(phase, Some(index), None, batch, source))
    }

    fn wrap(
        &self,
        phase: LoadPhase,
        index: Option<usize>,
        record: Option<JsonValue>,
        batch: usize,
        source: AgeError,
    ) -> BatchLoaderError {
        BatchLoaderError {
            phase,
            kind: self.kind,
            type_name: self.type_name.clone(),
            index,
            record,
            batch: Some(batch),
            source,
        }
    }

    fn unresolved(&self, row: &JsonValue, index: u64, batch: usize) -> BatchLoaderError {
        let index = index as usize;
        let mut record = row.clone();
        if let JsonValue::Object(map) = &mut record {
            map.remove(INDEX_FIELD);
        }
        let (from_label, to_label) = self
            .endpoints
            .as_ref()
            .map(|e| (e.from_label.clone(), e.to_label.clone()))
            .unwrap_or_default();
        let source = AgeError::UnresolvedReference {
            edge_type: self.type_name.clone(),
            index,
            from_label,
            from: endpoint_text(record.get(EDGE_FROM_FIELD)),
            to_label,
            to: endpoint_text(record.get(EDGE_TO_FIELD)),
        };
        self.wrap(LoadPhase::Creating, Some(index), Some(record), batch, source)
    }
}

/// Sweeps the staging rows of one call when dropped.
struct StagingScope<'a> {
    executor: &'a dyn Executor,
    staging: &'a StagingStore,
    prefix: Option<String>,
    keys: Vec<StagingKey>,
}

impl<'a> StagingScope<'a> {
    fn new(
        loader: &'a BatchLoader,
        namespace: &Namespace,
        scope: KeyScope,
        jobs: &[TypeJob],
    ) -> Self {
        let (prefix, keys) = match scope {
            KeyScope::PerCall => (Some(namespace.prefix()), Vec::new()),
            KeyScope::Shared => (None, jobs.iter().map(|job| job.key.clone()).collect()),
        };
        Self {
            executor: loader.executor.as_ref(),
            staging: &loader.staging,
            prefix,
            keys,
        }
    }
}

impl Drop for StagingScope<'_> {
    fn drop(&mut self) {
        let mut session = AutoCommit::new(self.executor);
        if let Some(prefix) = &self.prefix {
            match self.staging.delete_prefix(&mut session, prefix) {
                Ok(0) => {}
                Ok(removed) => debug!(prefix = %prefix, removed, "loader.cleanup"),
                Err(err) => warn!(prefix = %prefix, error = %err, "loader.cleanup.failed"),
            }
        }
        for key in &self.keys {
            if let Err(err) = self.staging.delete(&mut session, key) {
                warn!(key = %key, error = %err, "loader.cleanup.failed");
            }
        }
    }
}

fn inputs(data: &GraphData) -> Vec<TypeInput<'_>> {
    let vertices = data.vertices.iter().map(|(type_name, records)| TypeInput {
        kind: EntityKind::Vertex,
        type_name,
        records,
    });
    let edges = data.edges.iter().map(|(type_name, records)| TypeInput {
        kind: EntityKind::Edge,
        type_name,
        records,
    });
    vertices.chain(edges).collect()
}

fn validation_error(input: &TypeInput<'_>, failure: RecordFailure) -> BatchLoaderError {
    let context = match failure.index {
        Some(index) => format!("{}[{index}]", input.type_name),
        None => input.type_name.to_owned(),
    };
    BatchLoaderError {
        phase: LoadPhase::Validation,
        kind: input.kind,
        type_name: input.type_name.to_owned(),
        index: failure.index,
        record: failure
            .index
            .and_then(|index| input.records.get(index))
            .map(|record| JsonValue::Object(record.clone())),
        batch: None,
        source: AgeError::validation(context, failure.issues),
    }
}

fn is_scalar(value: &JsonValue) -> bool {
    matches!(
        value,
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)
    )
}

/// Counts come back as agtype, which drivers may surface as text.
fn as_count(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn endpoint_text(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_owned(),
    }
}

//! In-memory stand-in for a PostgreSQL + AGE connection.
//!
//! Understands the staging table statements, the loader's creation
//! statements and per-type entry points. Any other Cypher is answered with a
//! single row echoing the text and the staged values it references, which is
//! enough to check what a builder sent.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Once;

use agebridge::{AgeError, Executor, Result, Row, Session, Transaction};
use parking_lot::{Mutex, MutexGuard};
use serde_json::{json, Map, Value as JsonValue};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("agebridge=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}

pub fn record(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[derive(Clone, Debug)]
pub struct StoredVertex {
    pub label: String,
    pub props: Map<String, JsonValue>,
}

#[derive(Clone, Debug)]
pub struct StoredEdge {
    pub label: String,
    pub from: usize,
    pub to: usize,
    pub props: Map<String, JsonValue>,
}

#[derive(Clone, Debug, Default)]
struct State {
    params: BTreeMap<String, JsonValue>,
    functions: BTreeMap<String, String>,
    vertices: Vec<StoredVertex>,
    edges: Vec<StoredEdge>,
}

#[derive(Clone, Debug)]
struct Fault {
    needle: String,
    skip: usize,
    times: usize,
    transient: bool,
}

#[derive(Default)]
struct Inner {
    state: State,
    log: Vec<String>,
    faults: Vec<Fault>,
    begun: usize,
    committed: usize,
    rolled_back: usize,
}

impl Inner {
    fn run(&mut self, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>> {
        self.log.push(statement.to_owned());
        self.inject(statement)?;
        let before = self.state.clone();
        let outcome = apply(&mut self.state, statement, params);
        if outcome.is_err() {
            self.state = before;
        }
        outcome
    }

    fn inject(&mut self, statement: &str) -> Result<()> {
        for fault in &mut self.faults {
            if !statement.contains(&fault.needle) {
                continue;
            }
            if fault.skip > 0 {
                fault.skip -= 1;
                continue;
            }
            if fault.times > 0 {
                fault.times -= 1;
                let message = format!("injected failure on '{}'", fault.needle);
                return Err(if fault.transient {
                    AgeError::database(message)
                } else {
                    AgeError::query(message, statement)
                });
            }
        }
        Ok(())
    }
}

/// Emulated database. Transactions serialize on one lock, so a parallel
/// loader sees chunks committed one at a time.
#[derive(Default)]
pub struct MemoryAge {
    inner: Mutex<Inner>,
}

impl MemoryAge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `times` statements containing `needle` after letting
    /// `skip` of them through.
    pub fn fail_on(&self, needle: &str, skip: usize, times: usize) {
        self.inner.lock().faults.push(Fault {
            needle: needle.to_owned(),
            skip,
            times,
            transient: false,
        });
    }

    /// Like [`fail_on`](Self::fail_on) with a transport error.
    pub fn fail_transiently(&self, needle: &str, times: usize) {
        self.inner.lock().faults.push(Fault {
            needle: needle.to_owned(),
            skip: 0,
            times,
            transient: true,
        });
    }

    pub fn staged_keys(&self) -> Vec<String> {
        self.inner.lock().state.params.keys().cloned().collect()
    }

    pub fn staged(&self, key: &str) -> Option<JsonValue> {
        self.inner.lock().state.params.get(key).cloned()
    }

    pub fn stage(&self, key: &str, value: JsonValue) {
        self.inner.lock().state.params.insert(key.to_owned(), value);
    }

    pub fn vertices(&self, label: &str) -> Vec<Map<String, JsonValue>> {
        self.inner
            .lock()
            .state
            .vertices
            .iter()
            .filter(|v| v.label == label)
            .map(|v| v.props.clone())
            .collect()
    }

    /// `(from id, to id, props)` of every edge with `label`, reading ids
    /// from the `id` property of the endpoints.
    pub fn edges(&self, label: &str) -> Vec<(JsonValue, JsonValue, Map<String, JsonValue>)> {
        let inner = self.inner.lock();
        let state = &inner.state;
        let id = |index: usize| {
            state.vertices[index]
                .props
                .get("id")
                .cloned()
                .unwrap_or(JsonValue::Null)
        };
        state
            .edges
            .iter()
            .filter(|e| e.label == label)
            .map(|e| (id(e.from), id(e.to), e.props.clone()))
            .collect()
    }

    pub fn functions(&self) -> Vec<String> {
        self.inner.lock().state.functions.keys().cloned().collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().log.clone()
    }

    pub fn statements_containing(&self, needle: &str) -> usize {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }

    /// `(begun, committed, rolled back)` transaction counts.
    pub fn transactions(&self) -> (usize, usize, usize) {
        let inner = self.inner.lock();
        (inner.begun, inner.committed, inner.rolled_back)
    }
}

impl Executor for MemoryAge {
    fn execute(&self, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>> {
        self.inner.lock().run(statement, params)
    }

    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>> {
        let mut guard = self.inner.lock();
        guard.begun += 1;
        let snapshot = guard.state.clone();
        Ok(Box::new(MemoryTx {
            guard,
            snapshot: Some(snapshot),
            aborted: false,
        }))
    }
}

/// Behaves like a PostgreSQL transaction: after the first failed statement
/// every later one is refused until rollback.
struct MemoryTx<'a> {
    guard: MutexGuard<'a, Inner>,
    snapshot: Option<State>,
    aborted: bool,
}

impl Session for MemoryTx<'_> {
    fn execute(&mut self, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>> {
        if self.aborted {
            self.guard.log.push(statement.to_owned());
            return Err(AgeError::query(
                "current transaction is aborted, commands ignored until end of transaction block",
                statement,
            ));
        }
        let outcome = self.guard.run(statement, params);
        self.aborted = outcome.is_err();
        outcome
    }
}

impl Transaction for MemoryTx<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        if self.aborted {
            self.restore();
            return Err(AgeError::query("commit of an aborted transaction", "COMMIT"));
        }
        self.snapshot = None;
        self.guard.committed += 1;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.restore();
        Ok(())
    }
}

impl MemoryTx<'_> {
    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.guard.state = snapshot;
            self.guard.rolled_back += 1;
        }
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

fn between<'t>(text: &'t str, start: &str, end: &str) -> Option<&'t str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

fn text_param(params: &[JsonValue], index: usize) -> Result<String> {
    match params.get(index) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        other => Err(AgeError::query(
            format!("expected text parameter ${}, got {other:?}", index + 1),
            "",
        )),
    }
}

fn key_rows<'k>(keys: impl IntoIterator<Item = &'k String>) -> Vec<Row> {
    keys.into_iter()
        .map(|key| {
            let mut row = Row::new();
            row.insert("key".into(), JsonValue::String(key.clone()));
            row
        })
        .collect()
}

fn apply(state: &mut State, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>> {
    if statement.starts_with("CREATE SCHEMA") || statement.starts_with("CREATE TABLE") {
        return Ok(Vec::new());
    }
    if statement.starts_with("CREATE OR REPLACE FUNCTION") {
        let name = between(statement, "FUNCTION ", "(").unwrap_or_default();
        let name = name.rsplit('.').next().unwrap_or_default().to_owned();
        let key = between(statement, "get_array('\"", "\"'")
            .unwrap_or_default()
            .to_owned();
        state.functions.insert(name, key);
        return Ok(Vec::new());
    }
    if statement.starts_with("INSERT INTO") {
        let key = text_param(params, 0)?;
        let value = params.get(1).cloned().unwrap_or(JsonValue::Null);
        state.params.insert(key, value);
        return Ok(Vec::new());
    }
    if statement.starts_with("SELECT value FROM") {
        let key = text_param(params, 0)?;
        return Ok(state
            .params
            .get(&key)
            .map(|value| {
                let mut row = Row::new();
                row.insert("value".into(), value.clone());
                row
            })
            .into_iter()
            .collect());
    }
    if statement.starts_with("SELECT key FROM") {
        let prefix = text_param(params, 0)?;
        let keys: Vec<String> = state
            .params
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        return Ok(key_rows(&keys));
    }
    if statement.starts_with("DELETE FROM") && statement.contains("starts_with") {
        let prefix = text_param(params, 0)?;
        let keys: Vec<String> = state
            .params
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in &keys {
            state.params.remove(key);
        }
        return Ok(key_rows(&keys));
    }
    if statement.starts_with("DELETE FROM") {
        let key = text_param(params, 0)?;
        let removed = state.params.remove(&key).map(|_| key);
        return Ok(key_rows(removed.iter()));
    }
    if statement.starts_with("SELECT * FROM ag_catalog.cypher(") {
        let start = statement
            .find("$$ ")
            .ok_or_else(|| AgeError::query("missing dollar quote", statement))?;
        let end = statement
            .rfind(" $$)")
            .ok_or_else(|| AgeError::query("missing dollar quote", statement))?;
        let cypher = &statement[start + 3..end];
        return run_cypher(state, cypher);
    }
    Err(AgeError::query("unsupported statement", statement))
}

fn run_cypher(state: &mut State, cypher: &str) -> Result<Vec<Row>> {
    if cypher.starts_with("UNWIND ") && cypher.contains(" CREATE (v:") {
        return create_vertices(state, cypher);
    }
    if cypher.starts_with("UNWIND ") && cypher.contains(" MATCH (source:") {
        return create_edges(state, cypher);
    }
    let mut staged = Map::new();
    let mut rest = cypher;
    while let Some(pos) = rest.find(".get('") {
        let tail = &rest[pos + 6..];
        if let Some(end) = tail.find("')") {
            let key = &tail[..end];
            let value = state.params.get(key).cloned().unwrap_or(JsonValue::Null);
            staged.insert(key.to_owned(), value);
        }
        rest = tail;
    }
    let mut row = Row::new();
    row.insert("cypher".into(), JsonValue::String(cypher.to_owned()));
    row.insert("staged".into(), JsonValue::Object(staged));
    Ok(vec![row])
}

fn source_rows(state: &State, cypher: &str) -> Vec<JsonValue> {
    let source = between(cypher, "UNWIND ", " AS row").unwrap_or_default();
    let key = if let Some(key) = between(source, "get_array('", "')") {
        Some(key.to_owned())
    } else {
        source
            .strip_suffix("()")
            .and_then(|call| call.rsplit('.').next())
            .and_then(|name| state.functions.get(name).cloned())
    };
    match key.and_then(|key| state.params.get(&key).cloned()) {
        Some(JsonValue::Array(rows)) => rows,
        _ => Vec::new(),
    }
}

fn columns(map: Option<&str>) -> Vec<String> {
    map.map(|body| {
        body.split(", ")
            .filter_map(|entry| entry.split(':').next())
            .map(|c| c.trim().to_owned())
            .collect()
    })
    .unwrap_or_default()
}

fn project(row: &JsonValue, columns: &[String]) -> Map<String, JsonValue> {
    columns
        .iter()
        .filter_map(|c| match row.get(c) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some((c.clone(), value.clone())),
        })
        .collect()
}

fn create_vertices(state: &mut State, cypher: &str) -> Result<Vec<Row>> {
    let pattern = between(cypher, "CREATE (v:", ")")
        .ok_or_else(|| AgeError::query("bad vertex pattern", cypher))?;
    let label = pattern.split([' ', '{']).next().unwrap_or_default().to_owned();
    let columns = columns(between(pattern, "{", "}"));
    let rows = source_rows(state, cypher);
    for row in &rows {
        state.vertices.push(StoredVertex {
            label: label.clone(),
            props: project(row, &columns),
        });
    }
    let mut out = Row::new();
    out.insert("created".into(), json!(rows.len()));
    Ok(vec![out])
}

fn create_edges(state: &mut State, cypher: &str) -> Result<Vec<Row>> {
    let bad = || AgeError::query("bad edge pattern", cypher);
    let from_label = between(cypher, "MATCH (source:", ")").ok_or_else(bad)?.to_owned();
    let to_label = between(cypher, "(target:", ")").ok_or_else(bad)?.to_owned();
    let from_id = between(cypher, "WHERE source.", " = row.from").ok_or_else(bad)?.to_owned();
    let to_id = between(cypher, "AND target.", " = row.to").ok_or_else(bad)?.to_owned();
    let pattern = between(cypher, "-[e:", "]->").ok_or_else(bad)?;
    let label = pattern.split([' ', '{']).next().unwrap_or_default().to_owned();
    let columns = columns(between(pattern, "{", "}"));

    let find = |vertices: &[StoredVertex], label: &str, prop: &str, value: Option<&JsonValue>| {
        vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.label == label && value.is_some() && v.props.get(prop) == value)
            .map(|(i, _)| i)
            .collect::<Vec<_>>()
    };

    let mut out = Vec::new();
    for row in source_rows(state, cypher) {
        let sources = find(&state.vertices, &from_label, &from_id, row.get("from"));
        let targets = find(&state.vertices, &to_label, &to_id, row.get("to"));
        for &from in &sources {
            for &to in &targets {
                state.edges.push(StoredEdge {
                    label: label.clone(),
                    from,
                    to,
                    props: project(&row, &columns),
                });
                let index = row.get("__index").cloned().unwrap_or(JsonValue::Null);
                let mut result = Row::new();
                result.insert("idx".into(), index);
                out.push(result);
            }
        }
    }
    Ok(out)
}

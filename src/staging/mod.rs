//! Parameter staging store.
//!
//! AGE treats the Cypher text passed to `cypher()` as a literal, so dynamic
//! values cannot be bound into it. Instead they are written to a key/value
//! table through ordinary SQL bind parameters and read back inside Cypher with
//! retrieval entry points such as `age_params.get_array('key')`.

pub mod ddl;
mod key;

pub use key::{Namespace, StagingKey, MAX_KEY_LEN, NAMESPACE_SEPARATOR};

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::{AgeError, Result};
use crate::executor::{in_transaction, Executor, Session, Transaction};
use crate::ident::is_identifier;
use crate::model::EntityKind;

/// Default schema holding the staging table and entry points.
pub const DEFAULT_SCHEMA: &str = "age_params";

/// Default number of extra attempts for a failed upsert.
pub const DEFAULT_UPSERT_RETRIES: u32 = 2;

/// Handle to the staging table.
///
/// The store holds no connection; every operation runs on the [`Session`]
/// passed in, which lets callers group staging writes with the query that
/// consumes them in one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingStore {
    schema: String,
    upsert_retries: u32,
}

impl Default for StagingStore {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_owned(),
            upsert_retries: DEFAULT_UPSERT_RETRIES,
        }
    }
}

impl StagingStore {
    /// Store in the default `age_params` schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store in a custom schema.
    pub fn with_schema(schema: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        if !is_identifier(&schema) {
            return Err(AgeError::InvalidArgument(format!(
                "staging schema '{schema}' is not a valid identifier"
            )));
        }
        Ok(Self {
            schema,
            ..Self::default()
        })
    }

    /// Sets how many times a failed upsert is retried. Upserts are
    /// idempotent, so retrying a transport failure cannot duplicate data.
    pub fn upsert_retries(mut self, retries: u32) -> Self {
        self.upsert_retries = retries;
        self
    }

    /// Schema holding the table and entry points.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Creates the schema, table and generic entry points. Idempotent.
    pub fn install<S: Session + ?Sized>(&self, session: &mut S) -> Result<()> {
        let statements = [
            ddl::create_schema(&self.schema),
            ddl::create_table(&self.schema),
            ddl::create_get(&self.schema),
            ddl::create_get_array(&self.schema),
            ddl::create_get_all(&self.schema),
        ];
        for statement in &statements {
            session.execute(statement, &[])?;
        }
        debug!(schema = %self.schema, "staging.install");
        Ok(())
    }

    /// Inserts or replaces the value stored under `key`.
    ///
    /// Returns once the session acknowledged the write; on an auto-commit
    /// session the value is durable and visible to the next statement.
    /// Transient failures are retried only on sessions that survive them
    /// (see [`Session::retryable`]); inside a transaction use
    /// [`with_staged`](Self::with_staged) to repeat the whole transaction.
    pub fn upsert<S: Session + ?Sized>(
        &self,
        session: &mut S,
        key: &StagingKey,
        value: &JsonValue,
    ) -> Result<()> {
        let statement = ddl::upsert(&self.schema);
        let params = [JsonValue::String(key.as_str().to_owned()), value.clone()];
        let mut attempt = 0;
        loop {
            match session.execute(&statement, &params) {
                Ok(_) => {
                    debug!(key = %key, attempt, "staging.upsert");
                    return Ok(());
                }
                Err(err)
                    if session.retryable() && err.is_transient() && attempt < self.upsert_retries =>
                {
                    attempt += 1;
                    warn!(key = %key, attempt, error = %err, "staging.upsert.retry");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Runs `stage` and then `consume` in one transaction.
    ///
    /// A transient failure inside `stage` rolls the transaction back and
    /// starts a fresh one, up to the configured number of retries. Once
    /// `consume` has started the transaction is never repeated, so a
    /// creation statement runs at most once.
    pub fn with_staged<T, S, C>(
        &self,
        executor: &dyn Executor,
        mut stage: S,
        mut consume: C,
    ) -> Result<T>
    where
        S: FnMut(&mut (dyn Transaction + '_)) -> Result<()>,
        C: FnMut(&mut (dyn Transaction + '_)) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let mut staged = false;
            let outcome = in_transaction(executor, |tx| {
                stage(&mut *tx)?;
                staged = true;
                consume(tx)
            });
            match outcome {
                Err(err) if !staged && err.is_transient() && attempt < self.upsert_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "staging.transaction.retry");
                }
                other => return other,
            }
        }
    }

    /// Reads the value stored under `key`.
    pub fn get<S: Session + ?Sized>(
        &self,
        session: &mut S,
        key: &StagingKey,
    ) -> Result<Option<JsonValue>> {
        let statement = ddl::select_value(&self.schema);
        let rows = session.execute(&statement, &[JsonValue::String(key.to_string())])?;
        Ok(rows.into_iter().next().and_then(|mut row| row.remove("value")))
    }

    /// Removes `key`. Returns whether a row was deleted.
    pub fn delete<S: Session + ?Sized>(&self, session: &mut S, key: &StagingKey) -> Result<bool> {
        let statement = ddl::delete_key(&self.schema);
        let rows = session.execute(&statement, &[JsonValue::String(key.to_string())])?;
        Ok(!rows.is_empty())
    }

    /// Removes every key starting with `prefix`. Returns the number removed.
    pub fn delete_prefix<S: Session + ?Sized>(&self, session: &mut S, prefix: &str) -> Result<usize> {
        if prefix.is_empty() {
            return Err(AgeError::InvalidArgument(
                "refusing to delete staging rows with an empty prefix".into(),
            ));
        }
        let statement = ddl::delete_prefix(&self.schema);
        let rows = session.execute(&statement, &[JsonValue::String(prefix.to_owned())])?;
        Ok(rows.len())
    }

    /// Lists keys starting with `prefix`, sorted.
    pub fn keys<S: Session + ?Sized>(&self, session: &mut S, prefix: &str) -> Result<Vec<String>> {
        let statement = ddl::select_keys(&self.schema);
        let rows = session.execute(&statement, &[JsonValue::String(prefix.to_owned())])?;
        rows.into_iter()
            .map(|mut row| match row.remove("key") {
                Some(JsonValue::String(key)) => Ok(key),
                other => Err(AgeError::query(
                    format!("expected text key column, got {other:?}"),
                    statement.clone(),
                )),
            })
            .collect()
    }

    /// Creates `get_<type>_vertices()` / `get_<type>_edges()` bound to the
    /// shared key for `type_name`. Returns the qualified call expression.
    pub fn ensure_type_entry_points<S: Session + ?Sized>(
        &self,
        session: &mut S,
        kind: EntityKind,
        type_name: &str,
    ) -> Result<String> {
        let key = Self::shared_key(kind, type_name)?;
        let statement = ddl::create_type_function(&self.schema, kind, type_name, key.as_str());
        session.execute(&statement, &[])?;
        debug!(kind = %kind, type_name, "staging.entry_point.created");
        Ok(self.type_retrieval_call(kind, type_name))
    }

    /// Unscoped key shared by every caller loading `type_name`.
    pub fn shared_key(kind: EntityKind, type_name: &str) -> Result<StagingKey> {
        if !is_identifier(type_name) {
            return Err(AgeError::InvalidArgument(format!(
                "type name '{type_name}' is not a valid identifier"
            )));
        }
        StagingKey::new(format!("{}_{type_name}", kind.as_str()))
    }

    /// Cypher expression reading a single staged value.
    pub fn retrieval_call(&self, key: &StagingKey) -> String {
        format!("{}.get('{}')", self.schema, key)
    }

    /// Cypher expression reading a staged array, for use with `UNWIND`.
    pub fn array_retrieval_call(&self, key: &StagingKey) -> String {
        format!("{}.get_array('{}')", self.schema, key)
    }

    /// Cypher expression reading every staged value as a map.
    pub fn all_retrieval_call(&self) -> String {
        format!("{}.get_all()", self.schema)
    }

    /// Cypher expression calling a generated per-type entry point.
    pub fn type_retrieval_call(&self, kind: EntityKind, type_name: &str) -> String {
        format!(
            "{}.{}()",
            self.schema,
            ddl::type_function_name(kind, type_name)
        )
    }
}

//! Executor collaborator seams.
//!
//! Connection management, pooling and transport live behind these traits. The
//! crate only ever hands an executor complete statement text plus JSON bind
//! parameters, and expects rows back as JSON objects.

use serde_json::{Map, Value as JsonValue};

use crate::error::Result;

/// A result row keyed by column name.
pub type Row = Map<String, JsonValue>;

/// Anything that can run a statement: an auto-commit connection or an open
/// transaction.
pub trait Session {
    /// Runs `statement` with positional bind parameters (`$1`, `$2`, ...).
    fn execute(&mut self, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>>;

    /// Whether a failed statement leaves the session usable, so that an
    /// idempotent statement may be sent again. False for open transactions:
    /// PostgreSQL rejects every statement after the first error until the
    /// transaction ends.
    fn retryable(&self) -> bool {
        false
    }
}

/// An open transaction. Dropping it without calling [`Transaction::commit`]
/// must roll it back.
pub trait Transaction: Session {
    /// Commits all statements run inside the transaction.
    fn commit(self: Box<Self>) -> Result<()>;
    /// Discards all statements run inside the transaction.
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Black-box statement executor backed by a connection or pool.
///
/// Implementations may retry idempotent connection acquisition, but must
/// never transparently retry a statement: a repeated staging upsert is
/// harmless, a repeated creation query duplicates records.
pub trait Executor: Send + Sync {
    /// Runs a single statement outside any explicit transaction.
    fn execute(&self, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>>;

    /// Opens a transaction on a dedicated session.
    fn begin_transaction(&self) -> Result<Box<dyn Transaction + '_>>;
}

/// [`Session`] adapter that runs every statement in auto-commit mode.
pub struct AutoCommit<'a> {
    executor: &'a dyn Executor,
}

impl<'a> AutoCommit<'a> {
    /// Wraps an executor.
    pub fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }
}

impl Session for AutoCommit<'_> {
    fn execute(&mut self, statement: &str, params: &[JsonValue]) -> Result<Vec<Row>> {
        self.executor.execute(statement, params)
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// Runs `work` inside a transaction, committing on success and rolling back
/// on failure. The rollback error, if any, is logged and the original error
/// is returned.
pub fn in_transaction<T, F>(executor: &dyn Executor, work: F) -> Result<T>
where
    F: FnOnce(&mut (dyn Transaction + '_)) -> Result<T>,
{
    let mut tx = executor.begin_transaction()?;
    match work(&mut *tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(error = %rollback, "executor.rollback.failed");
            }
            Err(err)
        }
    }
}

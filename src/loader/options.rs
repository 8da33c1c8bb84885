use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AgeError, Result};
use crate::loader::progress::LoadProgress;

/// Default number of records staged and created per chunk.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default budget for a whole load call.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Callback invoked after every chunk.
pub type ProgressCallback = Arc<dyn Fn(&LoadProgress) + Send + Sync>;

/// Transaction boundary of a load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atomicity {
    /// One transaction per chunk. A failing chunk rolls back alone; chunks
    /// committed before it stay committed.
    #[default]
    Chunked,
    /// One transaction for the whole call. Any statement failure rolls
    /// everything back. Runs sequentially.
    Atomic,
}

/// How staging keys are scoped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// Keys live under a namespace generated for each call, so concurrent
    /// loads never share a key.
    #[default]
    PerCall,
    /// Keys are the unscoped `vertex_<Type>` / `edge_<Type>` read by the
    /// generated `get_<type>_vertices()` entry points. Concurrent loads of
    /// the same type must be serialized by the caller. Runs sequentially.
    Shared,
}

/// Options for one load call.
#[derive(Clone)]
pub struct LoadOptions {
    /// Records per chunk.
    pub batch_size: usize,
    /// Record per-record failures and keep going instead of failing fast.
    pub continue_on_error: bool,
    /// Upper bound on types loaded concurrently.
    pub max_parallel_batches: usize,
    /// Budget for the whole call, checked between chunks.
    pub transaction_timeout: Duration,
    /// Transaction boundary.
    pub atomicity: Atomicity,
    /// Staging key scoping.
    pub key_scope: KeyScope,
    /// Progress observer.
    pub progress: Option<ProgressCallback>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            continue_on_error: false,
            max_parallel_batches: 1,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            atomicity: Atomicity::default(),
            key_scope: KeyScope::default(),
            progress: None,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("batch_size", &self.batch_size)
            .field("continue_on_error", &self.continue_on_error)
            .field("max_parallel_batches", &self.max_parallel_batches)
            .field("transaction_timeout", &self.transaction_timeout)
            .field("atomicity", &self.atomicity)
            .field("key_scope", &self.key_scope)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl LoadOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Enables or disables partial-failure mode.
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Sets how many types may load concurrently.
    pub fn max_parallel_batches(mut self, workers: usize) -> Self {
        self.max_parallel_batches = workers;
        self
    }

    /// Sets the budget for the whole call.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Sets the transaction boundary.
    pub fn atomicity(mut self, atomicity: Atomicity) -> Self {
        self.atomicity = atomicity;
        self
    }

    /// Sets staging key scoping.
    pub fn key_scope(mut self, scope: KeyScope) -> Self {
        self.key_scope = scope;
        self
    }

    /// Installs a progress callback.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LoadProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Installs a shared progress callback.
    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AgeError::InvalidArgument(
                "batch_size must be greater than zero".into(),
            ));
        }
        if self.max_parallel_batches == 0 {
            return Err(AgeError::InvalidArgument(
                "max_parallel_batches must be at least one".into(),
            ));
        }
        Ok(())
    }

    /// Number of workers actually used.
    pub(crate) fn workers(&self) -> usize {
        match (self.atomicity, self.key_scope) {
            (Atomicity::Chunked, KeyScope::PerCall) => self.max_parallel_batches,
            _ => 1,
        }
    }
}

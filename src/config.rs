//! TOML client configuration.
//!
//! ```toml
//! graph = "social"
//!
//! [staging]
//! schema = "age_params"
//! upsert_retries = 2
//!
//! [loader]
//! batch_size = 500
//! continue_on_error = true
//! max_parallel_batches = 4
//! transaction_timeout_ms = 60000
//! atomicity = "chunked"
//! key_scope = "per_call"
//! ```
//!
//! Omitted keys take the library defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::ident::is_identifier;
use crate::loader::{
    Atomicity, KeyScope, LoadOptions, DEFAULT_BATCH_SIZE, DEFAULT_TRANSACTION_TIMEOUT,
};
use crate::staging::{StagingStore, DEFAULT_SCHEMA, DEFAULT_UPSERT_RETRIES};

/// Staging table settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagingConfig {
    /// Schema holding the staging table and entry points.
    pub schema: String,
    /// Extra attempts for a failed upsert.
    pub upsert_retries: u32,
}

/// Batch loader defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Records per chunk.
    pub batch_size: usize,
    /// Collect failures instead of aborting.
    pub continue_on_error: bool,
    /// Types loaded concurrently within a phase.
    pub max_parallel_batches: usize,
    /// Overall time budget of a load call.
    pub transaction_timeout: Duration,
    /// Chunked or single-transaction loads.
    pub atomicity: Atomicity,
    /// Call-scoped or shared staging keys.
    pub key_scope: KeyScope,
}

/// Validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Target graph.
    pub graph: String,
    /// Staging table settings.
    pub staging: StagingConfig,
    /// Batch loader defaults.
    pub loader: LoaderConfig,
    path: Option<PathBuf>,
}

impl ClientConfig {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        let mut config = convert(raw)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
        convert(raw)
    }

    /// File the configuration was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loader options carrying the configured defaults.
    pub fn loader_options(&self) -> LoadOptions {
        LoadOptions::new()
            .batch_size(self.loader.batch_size)
            .continue_on_error(self.loader.continue_on_error)
            .max_parallel_batches(self.loader.max_parallel_batches)
            .transaction_timeout(self.loader.transaction_timeout)
            .atomicity(self.loader.atomicity)
            .key_scope(self.loader.key_scope)
    }

    /// Staging store in the configured schema.
    pub fn staging_store(&self) -> StagingStore {
        // The schema was checked during conversion, so this cannot fail.
        StagingStore::with_schema(self.staging.schema.clone())
            .unwrap_or_default()
            .upsert_retries(self.staging.upsert_retries)
    }
}

fn convert(raw: RawConfig) -> Result<ClientConfig, ConfigError> {
    let graph = raw.graph.ok_or_else(|| ConfigError::Invalid {
        field: "graph",
        message: "is required".into(),
    })?;
    if !is_identifier(&graph) {
        return Err(ConfigError::Invalid {
            field: "graph",
            message: format!("'{graph}' is not a valid identifier"),
        });
    }

    let schema = raw.staging.schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_owned());
    if !is_identifier(&schema) {
        return Err(ConfigError::Invalid {
            field: "staging.schema",
            message: format!("'{schema}' is not a valid identifier"),
        });
    }

    let batch_size = raw.loader.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        return Err(ConfigError::Invalid {
            field: "loader.batch_size",
            message: "must be greater than zero".into(),
        });
    }
    let max_parallel_batches = raw.loader.max_parallel_batches.unwrap_or(1);
    if max_parallel_batches == 0 {
        return Err(ConfigError::Invalid {
            field: "loader.max_parallel_batches",
            message: "must be at least one".into(),
        });
    }

    Ok(ClientConfig {
        graph,
        staging: StagingConfig {
            schema,
            upsert_retries: raw.staging.upsert_retries.unwrap_or(DEFAULT_UPSERT_RETRIES),
        },
        loader: LoaderConfig {
            batch_size,
            continue_on_error: raw.loader.continue_on_error.unwrap_or(false),
            max_parallel_batches,
            transaction_timeout: raw
                .loader
                .transaction_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TRANSACTION_TIMEOUT),
            atomicity: raw.loader.atomicity.unwrap_or_default(),
            key_scope: raw.loader.key_scope.unwrap_or_default(),
        },
        path: None,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    graph: Option<String>,
    #[serde(default)]
    staging: RawStaging,
    #[serde(default)]
    loader: RawLoader,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStaging {
    schema: Option<String>,
    upsert_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLoader {
    batch_size: Option<usize>,
    continue_on_error: Option<bool>,
    max_parallel_batches: Option<usize>,
    transaction_timeout_ms: Option<u64>,
    atomicity: Option<Atomicity>,
    key_scope: Option<KeyScope>,
}

/// Failure to read or validate a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// I/O failure.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unknown keys.
    #[error("failed to parse config{}: {source}", display_path(.path))]
    Parse {
        /// File being parsed, absent for in-memory text.
        path: Option<PathBuf>,
        /// Parser failure.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        /// Dotted key of the offending value.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}

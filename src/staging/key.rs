use std::fmt;

use rand::Rng;

use crate::error::{AgeError, Result};

/// Longest accepted staging key.
pub const MAX_KEY_LEN: usize = 255;

/// Separator between a namespace and the key it scopes.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Validated staging key.
///
/// Keys are embedded verbatim in retrieval calls inside Cypher text, so only
/// `[A-Za-z0-9_:.-]` is accepted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StagingKey(String);

impl StagingKey {
    /// Validates `key`.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(AgeError::InvalidArgument(format!(
                "staging key must be 1..={MAX_KEY_LEN} characters (got {})",
                key.len()
            )));
        }
        if let Some(bad) = key.chars().find(|c| !is_key_char(*c)) {
            return Err(AgeError::InvalidArgument(format!(
                "staging key '{key}' contains unsupported character '{bad}'"
            )));
        }
        Ok(Self(key))
    }

    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the key lives under `namespace`.
    pub fn in_namespace(&self, namespace: &Namespace) -> bool {
        self.0
            .strip_prefix(namespace.as_str())
            .is_some_and(|rest| rest.starts_with(NAMESPACE_SEPARATOR))
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-')
}

/// Call-local key prefix.
///
/// Every operation that stages data generates its own namespace so concurrent
/// callers never write under the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Generates a fresh `batch_<16 hex>` namespace.
    pub fn generate() -> Self {
        let id: u64 = rand::thread_rng().gen();
        Self(format!("batch_{id:016x}"))
    }

    /// Uses a caller-chosen namespace.
    pub fn named(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.contains(NAMESPACE_SEPARATOR) {
            return Err(AgeError::InvalidArgument(format!(
                "namespace '{name}' must not contain '{NAMESPACE_SEPARATOR}'"
            )));
        }
        StagingKey::new(name.clone())?;
        Ok(Self(name))
    }

    /// Returns the namespace text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scopes `name` under this namespace.
    pub fn key(&self, name: &str) -> Result<StagingKey> {
        StagingKey::new(format!("{}{NAMESPACE_SEPARATOR}{name}", self.0))
    }

    /// Prefix matching every key of this namespace.
    pub fn prefix(&self) -> String {
        format!("{}{NAMESPACE_SEPARATOR}", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Deterministic cache keys.
//!
//! Format: `"{namespace}:{model}:{operation}:{json(params)}"`. Parameters are
//! serialized with `serde_json`, so struct fields keep declaration order and
//! maps (`serde_json::Map` is a `BTreeMap`) are key-sorted. Equal inputs always
//! produce equal keys.

use std::fmt;

use serde::Serialize;

/// Namespace shared with existing cache entries written by the query layer.
pub const DEFAULT_NAMESPACE: &str = "prisma";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key under the default namespace.
    pub fn new<P>(model: &str, operation: &str, params: &P) -> Result<Self, serde_json::Error>
    where
        P: Serialize + ?Sized,
    {
        Self::namespaced(DEFAULT_NAMESPACE, model, operation, params)
    }

    pub fn namespaced<P>(
        namespace: &str,
        model: &str,
        operation: &str,
        params: &P,
    ) -> Result<Self, serde_json::Error>
    where
        P: Serialize + ?Sized,
    {
        let params = serde_json::to_string(params)?;
        Ok(Self(format!("{namespace}:{model}:{operation}:{params}")))
    }

    /// Use an already-built key verbatim.
    pub fn raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

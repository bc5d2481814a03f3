//! Pattern-based invalidation after writes.
//!
//! A write reports the fields it changed. Every cached entry whose key
//! contains `"field":value` for one of those fields, or for a differing
//! original value, is deleted. The write path never needs to know the exact
//! key formats of the reads it affects.
//!
//! The match is a substring match on serialized params, so `"id":5` also hits
//! keys containing `"id":55`. Over-invalidation only costs a refetch.
//!
//! Each pattern costs a full key scan. Fine for the current key volume; an
//! auxiliary set per tag would replace the scan if it ever shows up in latency.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::{CacheError, QueryCache};
use crate::observability::metrics;
use crate::store::escape_pattern;

impl QueryCache {
    /// Glob patterns selecting entries of `model` affected by a write.
    pub fn invalidation_patterns(
        &self,
        model: &str,
        changed: &Map<String, Value>,
        original: Option<&Map<String, Value>>,
    ) -> Vec<String> {
        let prefix = format!("{}:{}:", escape_pattern(&self.namespace), escape_pattern(model));
        let pattern = |field: &str, value: &Value| {
            let needle = format!("{}:{}", Value::String(field.to_string()), value);
            format!("{prefix}*{}*", escape_pattern(&needle))
        };

        let mut patterns: Vec<String> = changed.iter().map(|(f, v)| pattern(f, v)).collect();

        if let Some(original) = original {
            for (field, value) in original {
                if changed.get(field) != Some(value) {
                    patterns.push(pattern(field, value));
                }
            }
        }

        patterns
    }

    /// Delete cached entries of `model` that reference changed field values.
    ///
    /// `changed` and `original` must serialize to JSON objects. Returns the
    /// number of deleted entries.
    pub async fn invalidate_model_cache<C, O>(
        &self,
        model: &str,
        changed: &C,
        original: Option<&O>,
    ) -> Result<u64, CacheError>
    where
        C: Serialize + ?Sized,
        O: Serialize + ?Sized,
    {
        let changed = fields_of(changed)?;
        let original = original.map(fields_of).transpose()?;
        let patterns = self.invalidation_patterns(model, &changed, original.as_ref());

        let mut keys = BTreeSet::new();
        for pattern in &patterns {
            keys.extend(self.store.keys(pattern).await?);
        }

        let mut removed = 0;
        for key in &keys {
            removed += self.store.del(key).await?;
        }

        tracing::debug!(model = %model, patterns = patterns.len(), removed, "Model cache invalidated");
        metrics::record_cache_invalidation(model, removed);
        Ok(removed)
    }
}

fn fields_of<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>, CacheError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(CacheError::InvalidFields(other.to_string())),
    }
}

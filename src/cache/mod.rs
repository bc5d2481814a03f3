//! Cache-aside layer for expensive reads.
//!
//! # Data Flow
//! ```text
//! Read:   cached_query(key, ttl, fetch)
//!             → store.get(key) ── hit ──→ deserialize → return (fetch skipped)
//!             └─ miss → fetch() → store.set(key, json, ttl) → return
//!
//! Write:  relational write → invalidate_model_cache(model, changed, original)
//!             → glob pattern per field value → store.keys → store.del
//! ```
//!
//! # Design Decisions
//! - Cache entries are derived state; the relational store stays authoritative
//! - Store errors propagate; there is no silent fallback to `fetch`
//! - Concurrent misses may both run `fetch` and both write; the results are
//!   equivalent reads, so last write wins
//! - A cached value that no longer decodes is treated as a miss and rewritten

pub mod invalidation;
pub mod key;
pub mod ttl;

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::observability::metrics;
use crate::store::{KvStore, StoreError};

pub use self::key::{CacheKey, DEFAULT_NAMESPACE};
pub use self::ttl::{CacheTtl, TtlPolicy};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalidation fields must be a JSON object, got {0}")]
    InvalidFields(String),
}

/// Read-through cache over the shared store.
#[derive(Debug, Clone)]
pub struct QueryCache {
    store: Arc<dyn KvStore>,
    namespace: String,
    ttl: TtlPolicy,
}

impl QueryCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_policy(store, DEFAULT_NAMESPACE, TtlPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn KvStore>, namespace: impl Into<String>, ttl: TtlPolicy) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        self.ttl
    }

    /// Build a key in this cache's namespace.
    pub fn key<P>(&self, model: &str, operation: &str, params: &P) -> Result<CacheKey, CacheError>
    where
        P: Serialize + ?Sized,
    {
        Ok(CacheKey::namespaced(&self.namespace, model, operation, params)?)
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    pub async fn cached_query<T, E, F, Fut>(&self, key: &CacheKey, ttl: CacheTtl, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(expiry) = self.ttl.resolve(ttl) else {
            return fetch().await;
        };

        let cached = self
            .store
            .get(key.as_str())
            .await
            .map_err(|e| E::from(CacheError::Store(e)))?;

        if let Some(raw) = cached {
            match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    tracing::trace!(key = %key, "Cache hit");
                    metrics::record_cache_lookup(true);
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                }
            }
        }

        tracing::trace!(key = %key, "Cache miss");
        metrics::record_cache_lookup(false);

        let value = fetch().await?;
        let raw = serde_json::to_string(&value).map_err(|e| E::from(CacheError::Serialization(e)))?;
        self.store
            .set(key.as_str(), &raw, expiry)
            .await
            .map_err(|e| E::from(CacheError::Store(e)))?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Recipe {
        id: i64,
        title: String,
    }

    fn cache() -> (QueryCache, MemoryStore) {
        let store = MemoryStore::new();
        (QueryCache::new(Arc::new(store.clone())), store)
    }

    async fn load(cache: &QueryCache, key: &CacheKey, calls: &AtomicUsize, ttl: CacheTtl) -> Recipe {
        cache
            .cached_query(key, ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(Recipe {
                    id: 1,
                    title: "Goulash".into(),
                })
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let (cache, _) = cache();
        let key = cache.key("recipe", "findUnique", &json!({ "id": 1 })).unwrap();
        let calls = AtomicUsize::new(0);

        let first = load(&cache, &key, &calls, CacheTtl::Short).await;
        let second = load(&cache, &key, &calls, CacheTtl::Short).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bypass_never_touches_store() {
        let (cache, store) = cache();
        let key = cache.key("recipe", "findUnique", &json!({ "id": 1 })).unwrap();
        let calls = AtomicUsize::new(0);

        load(&cache, &key, &calls, CacheTtl::Bypass).await;
        load(&cache, &key, &calls, CacheTtl::Bypass).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let (cache, store) = cache();
        let key = cache.key("recipe", "findUnique", &json!({ "id": 9 })).unwrap();

        let res: Result<Recipe, LoadError> = cache
            .cached_query(&key, CacheTtl::Long, || async { Err(LoadError::Db("db down")) })
            .await;
        assert_eq!(res.unwrap_err(), LoadError::Db("db down"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_refetched() {
        let (cache, store) = cache();
        let key = cache.key("recipe", "findUnique", &json!({ "id": 1 })).unwrap();
        store
            .set(key.as_str(), "{not json", std::time::Duration::from_secs(60))
            .await
            .unwrap();
        let calls = AtomicUsize::new(0);

        load(&cache, &key, &calls, CacheTtl::Short).await;
        load(&cache, &key, &calls, CacheTtl::Short).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[derive(Debug)]
    struct DownStore;

    #[async_trait::async_trait]
    impl KvStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: std::time::Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn del(&self, _key: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_store_error_propagates_without_fetch() {
        let cache = QueryCache::new(Arc::new(DownStore));
        let key = cache.key("recipe", "findUnique", &json!({ "id": 1 })).unwrap();
        let calls = AtomicUsize::new(0);

        let res: Result<Recipe, CacheError> = cache
            .cached_query(&key, CacheTtl::Short, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Recipe {
                    id: 1,
                    title: "Goulash".into(),
                })
            })
            .await;

        assert!(matches!(res, Err(CacheError::Store(StoreError::Unavailable(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalidation_propagates_store_error() {
        let cache = QueryCache::new(Arc::new(DownStore));
        let err = cache
            .invalidate_model_cache("recipe", &json!({ "id": 1 }), None::<&serde_json::Value>)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Store(StoreError::Unavailable(_))));
    }

    #[derive(Debug, PartialEq)]
    enum LoadError {
        Db(&'static str),
        Cache(String),
    }

    impl From<CacheError> for LoadError {
        fn from(e: CacheError) -> Self {
            LoadError::Cache(e.to_string())
        }
    }
}

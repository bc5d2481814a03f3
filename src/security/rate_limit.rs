//! Distributed sliding-window rate limiter.
//!
//! The window is split into N sub-windows. Each sub-window is a counter in the
//! shared store under `"{prefix}:{index}"` with a TTL of the full window, so old
//! buckets disappear on their own. A check sums the current bucket and the
//! N-1 before it.
//!
//! # Accuracy
//! - Bursts near a sub-window boundary can be over- or under-counted by up to
//!   one sub-window of traffic. More sub-windows smooth this at the cost of more
//!   store reads per check.
//! - The increment is read-then-write, not atomic. Concurrent requests from the
//!   same identifier in the same sub-window can read the same count before
//!   either writes, so slightly more requests than the limit may be admitted.
//!   An atomic INCR + EXPIRE would close that gap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::observability::metrics;
use crate::store::{escape_pattern, KvStore, StoreError};

pub const DEFAULT_SUB_WINDOWS: u32 = 10;

type KeyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Immutable limiter configuration.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u64,
    pub sub_windows: u32,
    key_fn: KeyFn,
}

impl fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("sub_windows", &self.sub_windows)
            .finish_non_exhaustive()
    }
}

impl RateLimitConfig {
    /// `max_requests` per `window`, keys prefixed with `ratelimit:`.
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self::with_prefix(window, max_requests, "ratelimit")
    }

    /// Same as [`RateLimitConfig::new`] with a custom key prefix.
    pub fn with_prefix(window: Duration, max_requests: u64, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            window,
            max_requests,
            sub_windows: DEFAULT_SUB_WINDOWS,
            key_fn: Arc::new(move |id| format!("{prefix}:{id}")),
        }
    }

    pub fn sub_windows(mut self, sub_windows: u32) -> Self {
        self.sub_windows = sub_windows.max(1);
        self
    }

    /// Replace the identifier-to-key mapping.
    pub fn key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(f);
        self
    }

    /// Storage key prefix for an identifier.
    pub fn key_for(&self, identifier: &str) -> String {
        (self.key_fn)(identifier)
    }

    /// Length of one sub-window in milliseconds (at least 1).
    pub fn sub_window_millis(&self) -> u64 {
        (self.window.as_millis() as u64 / u64::from(self.sub_windows.max(1))).max(1)
    }
}

/// Outcome of a single check. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining_requests: u64,
    pub total_requests: u64,
}

/// Sliding-window limiter over a shared store.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    store: Arc<dyn KvStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn KvStore>, config: RateLimitConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KvStore>, config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { store, config, clock }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn bucket_keys(&self, prefix: &str, current: u64) -> Vec<String> {
        (0..u64::from(self.config.sub_windows.max(1)))
            .map_while(|offset| current.checked_sub(offset))
            .map(|bucket| format!("{prefix}:{bucket}"))
            .collect()
    }

    /// Count this request against `identifier` and report whether it may proceed.
    pub async fn check_limit(&self, identifier: &str) -> Result<RateLimitResult, StoreError> {
        let prefix = self.config.key_for(identifier);
        let current = self.clock.now_millis() / self.config.sub_window_millis();
        let keys = self.bucket_keys(&prefix, current);

        let counts = try_join_all(keys.iter().map(|key| self.store.get(key))).await?;
        let counts: Vec<u64> = counts
            .into_iter()
            .map(|value| value.and_then(|v| v.parse().ok()).unwrap_or(0))
            .collect();

        let total: u64 = counts.iter().sum();
        let allowed = total < self.config.max_requests;

        if allowed {
            let current_count = counts.first().copied().unwrap_or(0);
            self.store
                .set(&keys[0], &(current_count + 1).to_string(), self.config.window)
                .await?;
        }

        let counted = total + u64::from(allowed);
        let result = RateLimitResult {
            allowed,
            total_requests: counted,
            remaining_requests: self.config.max_requests.saturating_sub(counted),
        };

        tracing::trace!(
            identifier = %identifier,
            allowed = result.allowed,
            total = result.total_requests,
            "Rate limit checked"
        );
        metrics::record_rate_limit_check(result.allowed);
        Ok(result)
    }

    /// Drop every sub-window counter for `identifier`.
    pub async fn reset_limit(&self, identifier: &str) -> Result<u64, StoreError> {
        let pattern = format!("{}:*", escape_pattern(&self.config.key_for(identifier)));
        let keys = self.store.keys(&pattern).await?;

        let mut removed = 0;
        for key in &keys {
            removed += self.store.del(key).await?;
        }

        tracing::info!(identifier = %identifier, removed, "Rate limit reset");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    const START: u64 = 1_700_000_000_000;

    fn limiter(max: u64) -> (SlidingWindowLimiter, Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(START));
        let store = MemoryStore::with_clock(clock.clone());
        let config = RateLimitConfig::new(Duration::from_secs(60), max);
        let limiter = SlidingWindowLimiter::with_clock(Arc::new(store.clone()), config, clock.clone());
        (limiter, clock, store)
    }

    #[tokio::test]
    async fn test_saturation() {
        let (limiter, _, _) = limiter(5);

        for i in 1..=5 {
            let res = limiter.check_limit("10.0.0.1:/api/recipes").await.unwrap();
            assert!(res.allowed, "request {i} should pass");
            assert_eq!(res.total_requests, i);
            assert_eq!(res.remaining_requests, 5 - i);
        }

        let res = limiter.check_limit("10.0.0.1:/api/recipes").await.unwrap();
        assert_eq!(
            res,
            RateLimitResult {
                allowed: false,
                remaining_requests: 0,
                total_requests: 5
            }
        );
    }

    #[tokio::test]
    async fn test_within_budget_always_allowed() {
        let (limiter, clock, _) = limiter(10);

        // 10 requests spread across one window, one every 6s.
        for _ in 0..10 {
            assert!(limiter.check_limit("client").await.unwrap().allowed);
            clock.advance(Duration::from_secs(6));
        }
        // The oldest request has slid out of the window.
        assert!(limiter.check_limit("client").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_sub_windows_expire() {
        let (limiter, clock, _) = limiter(3);
        for _ in 0..3 {
            limiter.check_limit("client").await.unwrap();
        }
        assert!(!limiter.check_limit("client").await.unwrap().allowed);

        clock.advance(Duration::from_secs(60));

        let res = limiter.check_limit("client").await.unwrap();
        assert!(res.allowed);
        assert_eq!(res.total_requests, 1);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let (limiter, _, _) = limiter(1);
        assert!(limiter.check_limit("a").await.unwrap().allowed);
        assert!(!limiter.check_limit("a").await.unwrap().allowed);
        assert!(limiter.check_limit("b").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let (limiter, clock, store) = limiter(2);
        limiter.check_limit("10.0.0.1:/login").await.unwrap();
        clock.advance(Duration::from_secs(7));
        limiter.check_limit("10.0.0.1:/login").await.unwrap();
        limiter.check_limit("10.0.0.1:/other").await.unwrap();
        assert!(!limiter.check_limit("10.0.0.1:/login").await.unwrap().allowed);

        let removed = limiter.reset_limit("10.0.0.1:/login").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1, "other identifiers are untouched");

        let res = limiter.check_limit("10.0.0.1:/login").await.unwrap();
        assert_eq!(
            res,
            RateLimitResult {
                allowed: true,
                remaining_requests: 1,
                total_requests: 1
            }
        );
    }

    #[tokio::test]
    async fn test_denied_requests_are_not_counted() {
        let (limiter, _, store) = limiter(1);
        limiter.check_limit("x").await.unwrap();
        for _ in 0..5 {
            limiter.check_limit("x").await.unwrap();
        }
        let values: Vec<String> = {
            let keys = store.keys("ratelimit:x:*").await.unwrap();
            let mut out = Vec::new();
            for k in keys {
                out.push(store.get(&k).await.unwrap().unwrap());
            }
            out
        };
        assert_eq!(values, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_key_fn() {
        let clock = Arc::new(ManualClock::new(START));
        let store = MemoryStore::with_clock(clock.clone());
        let config = RateLimitConfig::new(Duration::from_secs(10), 5)
            .sub_windows(5)
            .key_fn(|id| format!("rl:login:{id}"));
        let limiter = SlidingWindowLimiter::with_clock(Arc::new(store.clone()), config, clock);

        limiter.check_limit("alice").await.unwrap();
        let keys = store.keys("rl:login:alice:*").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(limiter.config().sub_window_millis(), 2_000);
    }
}

//! Shared key-value store subsystem.
//!
//! # Data Flow
//! ```text
//! Rate limiter (sub-window counters) ─┐
//!                                     ├─→ KvStore ─→ memory.rs (DashMap, dev/tests)
//! Cache-aside (query results)   ──────┘           └→ redis.rs (ConnectionManager)
//! ```
//!
//! # Design Decisions
//! - Only four commands are consumed: get, set with TTL, del, keys(glob)
//! - One instance is built at startup and shared via `Arc<dyn KvStore>`
//! - Errors propagate; callers decide whether to fail open or closed

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors raised by a key-value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("invalid key pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The subset of key-value commands this crate relies on.
#[async_trait]
pub trait KvStore: Send + Sync + std::fmt::Debug {
    /// Read a value. Missing or expired keys yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete a key, returning how many keys were removed (0 or 1).
    async fn del(&self, key: &str) -> Result<u64, StoreError>;

    /// List live keys matching a Redis-style glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}

/// Escape glob metacharacters so `raw` matches itself literally.
///
/// Uses bracket classes (`[*]`), which both Redis and the `glob` crate
/// understand. A bare `]` is already literal outside a class.
///
/// Redis also treats `\` as an escape, while `glob` does not. A backslash
/// becomes `[\\]`: Redis reads an escaped `\` inside the class, `glob` reads a
/// class of two backslashes. Both match exactly one literal backslash.
pub fn escape_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '*' | '?' | '[' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            '\\' => escaped.push_str("[\\\\]"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Redis `KEYS` glob semantics (`stringmatchlen`), for checking patterns
/// against what the production backend would match.
#[cfg(test)]
pub(crate) fn redis_glob_matches(pattern: &str, key: &str) -> bool {
    fn matches(p: &[u8], s: &[u8]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some(b'*') => (0..=s.len()).any(|i| matches(&p[1..], &s[i..])),
            Some(b'?') => !s.is_empty() && matches(&p[1..], &s[1..]),
            Some(b'[') => {
                let Some((&c, rest)) = s.split_first() else {
                    return false;
                };
                let mut i = 1;
                let negate = p.get(i) == Some(&b'^');
                if negate {
                    i += 1;
                }
                let mut hit = false;
                loop {
                    match p.get(i) {
                        None => return false,
                        Some(b']') => break,
                        Some(b'\\') if i + 1 < p.len() => {
                            i += 1;
                            hit |= p[i] == c;
                        }
                        Some(&lo) if p.get(i + 1) == Some(&b'-') && i + 2 < p.len() && p[i + 2] != b']' => {
                            let hi = p[i + 2];
                            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                            hit |= (lo..=hi).contains(&c);
                            i += 2;
                        }
                        Some(&x) => hit |= x == c,
                    }
                    i += 1;
                }
                hit != negate && matches(&p[i + 1..], rest)
            }
            Some(b'\\') if p.len() >= 2 => s.first() == Some(&p[1]) && matches(&p[2..], &s[1..]),
            Some(&x) => s.first() == Some(&x) && matches(&p[1..], &s[1..]),
        }
    }
    matches(pattern.as_bytes(), key.as_bytes())
}

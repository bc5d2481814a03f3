//! TTL classes.
//!
//! Callers pick a class instead of a numeric literal:
//! - `Short`: high-traffic reads that tolerate about a minute of staleness
//! - `Long`: high-traffic reads of data that rarely changes
//! - `Bypass`: reads that must always be current; the store is not touched

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SHORT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_LONG_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTtl {
    Short,
    Long,
    Bypass,
}

/// Concrete durations behind the named classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub short: Duration,
    pub long: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            short: DEFAULT_SHORT_TTL,
            long: DEFAULT_LONG_TTL,
        }
    }
}

impl TtlPolicy {
    /// Duration for a class, `None` when the class skips caching.
    pub fn resolve(&self, ttl: CacheTtl) -> Option<Duration> {
        match ttl {
            CacheTtl::Short => Some(self.short),
            CacheTtl::Long => Some(self.long),
            CacheTtl::Bypass => None,
        }
    }
}

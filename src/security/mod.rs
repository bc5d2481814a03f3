//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve caller IP behind proxies)
//!     → origin.rs (allow-list check for state-changing methods)
//!     → rate_limit.rs (sliding-window counters in the shared store)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Origin checks fail closed: malformed headers never match
//! - Rate limiting fails open on store errors; availability wins over
//!   strict enforcement
//! - No trust in client input beyond what the proxy chain forwards

pub mod client_ip;
pub mod origin;
pub mod rate_limit;

pub use client_ip::{resolve_client_ip, UNKNOWN_IP};
pub use origin::AllowedOrigins;
pub use rate_limit::{RateLimitConfig, RateLimitResult, SlidingWindowLimiter};

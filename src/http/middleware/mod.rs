//! Pipeline middlewares.
//!
//! Standard order for API routes:
//! ```text
//! RequestContextLayer → OriginGuard → RateLimit → [LogServiceMethod] → handler
//! ```
//! The context layer must stay outermost: every other middleware reads the
//! active request context, and it is the one place errors become responses.

pub mod context;
pub mod logging;
pub mod origin;
pub mod rate_limit;

pub use context::{RequestContextLayer, X_REQUEST_ID};
pub use logging::LogServiceMethod;
pub use origin::OriginGuard;
pub use rate_limit::{ExceededHandler, RateLimit, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};

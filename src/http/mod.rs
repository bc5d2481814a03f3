//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout + trace layers, ConnectInfo)
//!     → pipeline route: middleware/context → middleware/origin
//!                       → middleware/rate_limit → handler
//!     → error boundary turns ApiError into JSON
//!     → Send to client (x-request-id attached)
//! ```

pub mod middleware;
pub mod server;

pub use middleware::X_REQUEST_ID;
pub use server::{AppState, HttpServer};

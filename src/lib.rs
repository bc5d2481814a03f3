//! Request-handling core of the Cookhound API.
//!
//! Cross-cutting infrastructure every route runs through: request-scoped
//! context, a composable middleware pipeline, an origin guard for
//! state-changing requests, a distributed sliding-window rate limiter, and a
//! cache-aside layer with pattern invalidation over a shared key-value store.

// Shared infrastructure
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

// Request handling
pub mod context;
pub mod http;
pub mod pipeline;

// Cross-cutting concerns
pub mod cache;
pub mod observability;
pub mod security;

pub mod admin;

pub use config::schema::AppConfig;
pub use error::ApiError;
pub use http::{AppState, HttpServer};
pub use pipeline::{Handler, Middleware, Pipeline};

//! Request-scoped ambient state.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → RequestContext::from_request (request id, identity, locale, ip, UA)
//!     → run(ctx, future): ctx bound to the task via a tokio task-local
//!     → any nested async code: request_id(), user_id(), user_locale(), ...
//!     → future completes → binding dropped
//! ```
//!
//! # Design Decisions
//! - Task-local, never process-global: concurrent requests cannot observe
//!   each other's context
//! - Nested wrapping reuses the active context instead of creating a second one
//! - Accessors outside a context fail loudly with `NoActiveContext`
//! - Task-locals do not cross `tokio::spawn`; use [`spawn`] to carry the context

pub mod locale;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::security::client_ip::{resolve_client_ip, UNKNOWN_IP};

pub use self::locale::LocaleSettings;

tokio::task_local! {
    static CURRENT: Arc<RequestContext>;
}

/// Errors raised by context accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// An accessor ran outside `run`. This is a composition bug.
    #[error("no active request context")]
    NoActiveContext,

    /// Identity was required but the request is anonymous.
    #[error("request is not authenticated")]
    Unauthenticated,
}

/// Numeric user identifier.
pub type UserId = i64;

/// Role of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Guest,
    User,
    Admin,
}

/// Authenticated identity, attached to request extensions by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: UserRole,
}

/// State bound to the lifetime of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Option<UserId>,
    pub user_role: UserRole,
    pub locale: String,
    pub ip: String,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Build a context for an anonymous caller with a fresh request id.
    pub fn anonymous(locale: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: None,
            user_role: UserRole::Guest,
            locale: locale.into(),
            ip: ip.into(),
            user_agent: None,
        }
    }

    /// Populate a context from an inbound request.
    pub fn from_request(req: &Request<Body>, locales: &LocaleSettings) -> Self {
        let identity = req.extensions().get::<Identity>().copied();
        let transport = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: identity.map(|i| i.user_id),
            user_role: identity.map(|i| i.role).unwrap_or_default(),
            locale: locales.resolve(req.headers()),
            ip: resolve_client_ip(req.headers(), transport),
            user_agent,
        }
    }

    /// Whether the client IP could not be determined.
    pub fn has_unknown_ip(&self) -> bool {
        self.ip == UNKNOWN_IP
    }
}

/// Run `future` with `ctx` as the active context.
pub async fn run<F>(ctx: RequestContext, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(Arc::new(ctx), future).await
}

/// Run `f(req)` under the active context, or under a new one built from `req`.
///
/// Nested wrapping never creates a second context for the same request.
pub async fn run_for_request<F, Fut>(req: Request<Body>, locales: &LocaleSettings, f: F) -> Fut::Output
where
    F: FnOnce(Request<Body>) -> Fut,
    Fut: Future,
{
    if is_active() {
        return f(req).await;
    }
    let ctx = RequestContext::from_request(&req, locales);
    run(ctx, f(req)).await
}

/// Whether a context is bound to the current task.
pub fn is_active() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}

/// The active context.
pub fn current() -> Result<Arc<RequestContext>, ContextError> {
    CURRENT
        .try_with(Arc::clone)
        .map_err(|_| ContextError::NoActiveContext)
}

fn with_current<T>(f: impl FnOnce(&RequestContext) -> T) -> Result<T, ContextError> {
    CURRENT
        .try_with(|ctx| f(ctx))
        .map_err(|_| ContextError::NoActiveContext)
}

pub fn request_id() -> Result<String, ContextError> {
    with_current(|ctx| ctx.request_id.clone())
}

/// The caller's user id, `None` for anonymous requests.
pub fn user_id() -> Result<Option<UserId>, ContextError> {
    with_current(|ctx| ctx.user_id)
}

/// The caller's user id, failing with `Unauthenticated` for anonymous requests.
pub fn assert_user_id() -> Result<UserId, ContextError> {
    user_id()?.ok_or(ContextError::Unauthenticated)
}

pub fn user_role() -> Result<UserRole, ContextError> {
    with_current(|ctx| ctx.user_role)
}

pub fn user_locale() -> Result<String, ContextError> {
    with_current(|ctx| ctx.locale.clone())
}

pub fn ip() -> Result<String, ContextError> {
    with_current(|ctx| ctx.ip.clone())
}

pub fn user_agent() -> Result<Option<String>, ContextError> {
    with_current(|ctx| ctx.user_agent.clone())
}

/// Spawn a task that inherits the active context, if any.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current() {
        Ok(ctx) => tokio::spawn(CURRENT.scope(ctx, future)),
        Err(_) => tokio::spawn(future),
    }
}

//! Origin allow-list.
//!
//! # Responsibilities
//! - Parse the configured allow-list once at startup
//! - Decide whether an `Origin`/`Referer` pair belongs to a recognized client
//!
//! # Design Decisions
//! - Values are compared as serialized origins (scheme, host, port), so a
//!   Referer path or a trailing slash never affects the result
//! - Unparseable header values never match (fail closed)
//! - Safe methods are exempt; the middleware decides that, not this type

use axum::http::{header, HeaderMap, Method};
use url::Url;

/// Methods that never change state and bypass the guard.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Parsed set of allowed origins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Parse allow-list entries. Returns the first entry that is not a valid origin.
    pub fn parse<I, S>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut origins = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match origin_of(entry) {
                Some(origin) => {
                    if !origins.contains(&origin) {
                        origins.push(origin);
                    }
                }
                None => return Err(entry.to_string()),
            }
        }
        Ok(Self { origins })
    }

    /// Parse a comma-separated list such as the `ALLOWED_ORIGINS` variable.
    pub fn from_comma_separated(raw: &str) -> Result<Self, String> {
        Self::parse(raw.split(','))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.origins
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Whether a single header value maps to an allowed origin.
    pub fn allows(&self, value: &str) -> bool {
        origin_of(value.trim())
            .map(|origin| self.origins.iter().any(|o| *o == origin))
            .unwrap_or(false)
    }

    /// Whether the `Origin` or `Referer` header maps to an allowed origin.
    pub fn allows_request(&self, headers: &HeaderMap) -> bool {
        [header::ORIGIN, header::REFERER]
            .iter()
            .filter_map(|name| headers.get(name))
            .filter_map(|v| v.to_str().ok())
            .any(|v| self.allows(v))
    }
}

fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

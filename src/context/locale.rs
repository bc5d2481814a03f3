//! Locale resolution.
//!
//! Order: `locale` cookie, then the first supported `Accept-Language` tag
//! (by quality), then the configured default. Tags are matched on their
//! primary subtag, so `cs-CZ` resolves to `cs`.

use axum::http::{header, HeaderMap};

const LOCALE_COOKIE: &str = "locale";

/// Supported locales and the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSettings {
    default: String,
    supported: Vec<String>,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self::new("en", vec!["en".to_string()])
    }
}

impl LocaleSettings {
    pub fn new(default: impl Into<String>, supported: Vec<String>) -> Self {
        Self {
            default: default.into().to_lowercase(),
            supported: supported.into_iter().map(|l| l.to_lowercase()).collect(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default
    }

    fn match_tag(&self, tag: &str) -> Option<&str> {
        let primary = tag.split(['-', '_']).next()?.trim().to_lowercase();
        self.supported
            .iter()
            .find(|l| **l == primary)
            .map(String::as_str)
    }

    /// Resolve the locale for a request.
    pub fn resolve(&self, headers: &HeaderMap) -> String {
        if let Some(locale) = self.from_cookie(headers) {
            return locale.to_string();
        }
        if let Some(locale) = self.from_accept_language(headers) {
            return locale.to_string();
        }
        self.default.clone()
    }

    fn from_cookie(&self, headers: &HeaderMap) -> Option<&str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == LOCALE_COOKIE)
            .find_map(|(_, value)| self.match_tag(value))
    }

    fn from_accept_language(&self, headers: &HeaderMap) -> Option<&str> {
        let raw = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;

        let mut tags: Vec<(&str, f32)> = raw
            .split(',')
            .filter_map(|item| {
                let mut parts = item.trim().split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = parts
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((tag, quality))
            })
            .collect();
        // Stable sort keeps header order among equal weights.
        tags.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        tags.into_iter().find_map(|(tag, _)| self.match_tag(tag))
    }
}

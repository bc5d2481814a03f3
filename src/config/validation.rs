//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, sub-windows fit the window)
//! - Check every allowed origin parses to a scheme + host
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::security::origin::AllowedOrigins;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if let Err(entry) = AllowedOrigins::parse(&config.security.allowed_origins) {
        errors.push(ValidationError::new(
            "security.allowed_origins",
            format!("`{entry}` is not a valid origin"),
        ));
    }

    let rl = &config.rate_limit;
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rl.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }
    if rl.sub_windows == 0 {
        errors.push(ValidationError::new("rate_limit.sub_windows", "must be greater than 0"));
    } else if rl.window_secs.saturating_mul(1000) < u64::from(rl.sub_windows) {
        errors.push(ValidationError::new(
            "rate_limit.sub_windows",
            "sub-windows must be at least 1ms long",
        ));
    }
    if rl.key_prefix.is_empty() {
        errors.push(ValidationError::new("rate_limit.key_prefix", "must not be empty"));
    }

    let cache = &config.cache;
    if cache.namespace.is_empty() {
        errors.push(ValidationError::new("cache.namespace", "must not be empty"));
    }
    if cache.short_ttl_secs == 0 {
        errors.push(ValidationError::new("cache.short_ttl_secs", "must be greater than 0"));
    }
    if cache.long_ttl_secs < cache.short_ttl_secs {
        errors.push(ValidationError::new(
            "cache.long_ttl_secs",
            "must not be shorter than cache.short_ttl_secs",
        ));
    }

    let locale = &config.locale;
    if !locale
        .supported
        .iter()
        .any(|l| l.eq_ignore_ascii_case(&locale.default))
    {
        errors.push(ValidationError::new(
            "locale.default",
            format!("`{}` is not in locale.supported", locale.default),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if config.admin.enabled && config.admin.api_key.len() < 16 {
        errors.push(ValidationError::new("admin.api_key", "must be at least 16 characters"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nope".into();
        config.security.allowed_origins = vec!["https://ok.example".into(), "ftp//broken".into()];
        config.rate_limit.window_secs = 0;
        config.cache.long_ttl_secs = 1;
        config.locale.default = "de".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "security.allowed_origins",
                "rate_limit.window_secs",
                "rate_limit.sub_windows",
                "cache.long_ttl_secs",
                "locale.default",
            ]
        );
    }

    #[test]
    fn test_admin_key_required_when_enabled() {
        let mut config = AppConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "short".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");
    }
}

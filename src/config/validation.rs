//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and shapes that
//! would otherwise only fail once traffic arrives. All problems are reported
//! together rather than stopping at the first one.

use std::path::{Component, Path};

use axum::http::HeaderValue;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(message) = validate_origin(&config.cors.origin) {
        errors.push(ValidationError::new("cors.origin", message));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than zero"));
    }
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than zero"));
    }
    if !rate_limit.path_prefix.starts_with('/') {
        errors.push(ValidationError::new("rate_limit.path_prefix", "must start with `/`"));
    }
    if rate_limit.purge_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.purge_interval_secs",
            "must be greater than zero",
        ));
    }

    if config.body.max_bytes == 0 {
        errors.push(ValidationError::new("body.max_bytes", "must be greater than zero"));
    }

    if config.shutdown.drain_timeout_ms == 0 {
        errors.push(ValidationError::new("shutdown.drain_timeout_ms", "must be greater than zero"));
    }

    for (field, name) in [
        ("assets.root_document", &config.assets.root_document),
        ("assets.admin_document", &config.assets.admin_document),
    ] {
        if !is_plain_file_name(name) {
            errors.push(ValidationError::new(field, "must be a plain file name inside assets.dir"));
        }
    }

    if let Some(address) = &config.database.address {
        if address.trim().is_empty() {
            errors.push(ValidationError::new("database.address", "must not be empty when set"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin is scheme + host (+ port), nothing else.
fn validate_origin(origin: &str) -> Result<(), String> {
    if HeaderValue::from_str(origin).is_err() {
        return Err("not a valid header value".to_string());
    }
    let url = url::Url::parse(origin).map_err(|e| format!("not an absolute URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("scheme must be http or https".to_string());
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.path() != "/" || url.query().is_some() || origin.ends_with('/') {
        return Err("must not contain a path, query or trailing slash".to_string());
    }
    Ok(())
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

//! Configuration loading: file, then environment, then validation.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    Override { key: &'static str, reason: String },

    #[error(
        "Validation failed: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    Validation(Vec<ValidationError>),
}

/// Load configuration from an optional TOML file, apply process environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML content without touching the environment.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides using the supplied lookup.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("GATEWAY_ENV") {
        config.environment = parse_override("GATEWAY_ENV", &value)?;
    }
    if let Some(value) = lookup("GATEWAY_MODE") {
        config.mode = parse_override("GATEWAY_MODE", &value)?;
    }
    if let Some(value) = lookup("PORT") {
        config.server.port = parse_override("PORT", &value)?;
    }
    if let Some(value) = lookup("CORS_ORIGIN") {
        config.cors.origin = value;
    }
    if let Some(value) = lookup("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_override("RATE_LIMIT_WINDOW_SECS", &value)?;
    }
    if let Some(value) = lookup("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_override("RATE_LIMIT_MAX", &value)?;
    }
    if let Some(value) = lookup("DATABASE_ADDRESS") {
        config.database.address = Some(value).filter(|v| !v.trim().is_empty());
    }
    Ok(())
}

fn parse_override<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Override {
        key,
        reason: e.to_string(),
    })
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address and port (daemon mode only).
    pub server: ServerConfig,

    /// Deployment environment tag.
    pub environment: Environment,

    /// Requested execution mode; `auto` defers to host markers.
    pub mode: ModeSetting,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Rate limiting for the API prefix.
    pub rate_limit: RateLimitConfig,

    /// Request body limits.
    pub body: BodyConfig,

    /// Static assets and fixed documents.
    pub assets: AssetConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Persistence backend settings.
    pub database: DatabaseConfig,

    /// Client-facing messages, localizable per deployment.
    pub messages: MessageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
///
/// Only `Development` exposes diagnostic detail to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

/// Execution mode as requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    /// Detect from host-provided environment markers.
    #[default]
    Auto,
    /// Long-running process that binds a listener.
    Daemon,
    /// Per-invocation handler inside a managed runtime.
    Hosted,
}

impl FromStr for ModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ModeSetting::Auto),
            "daemon" => Ok(ModeSetting::Daemon),
            "hosted" => Ok(ModeSetting::Hosted),
            other => Err(format!("unknown execution mode `{other}`")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Listen port. 0 asks the OS for an ephemeral port.
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// The single origin allowed to make cross-origin requests.
    pub origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per client within one window.
    pub max_requests: u32,

    /// Only paths under this prefix are rate limited.
    pub path_prefix: String,

    /// Prefer the first `X-Forwarded-For` entry over the peer address.
    pub trust_forwarded_for: bool,

    /// How often expired windows are purged (daemon mode).
    pub purge_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            path_prefix: "/api".to_string(),
            trust_forwarded_for: false,
            purge_interval_secs: 60,
        }
    }
}

/// Request body configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum accepted body size in bytes.
    pub max_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024, // 10MiB
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory static files are served from.
    pub dir: PathBuf,

    /// File served at `/`, relative to `dir`.
    pub root_document: String,

    /// File served at `/admin`, relative to `dir`.
    pub admin_document: String,
}

impl AssetConfig {
    pub fn root_document_path(&self) -> PathBuf {
        self.dir.join(&self.root_document)
    }

    pub fn admin_document_path(&self) -> PathBuf {
        self.dir.join(&self.admin_document)
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public"),
            root_document: "index.html".to_string(),
            admin_document: "admin.html".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests after a termination signal.
    pub drain_timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 10_000,
        }
    }
}

/// Persistence backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend address (e.g., "127.0.0.1:27017"). `None` runs without one.
    pub address: Option<String>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout_secs: 5,
        }
    }
}

/// Client-facing messages.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MessageConfig {
    /// Body of every 404 response.
    pub not_found: String,

    /// Body of every rate-limit rejection.
    pub rate_limited: String,

    /// Generic message replacing server error detail outside development.
    pub internal_error: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            not_found: "Resource not found".to_string(),
            rate_limited: "Too many requests from this IP, please try again later.".to_string(),
            internal_error: "Internal server error".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint (daemon mode only).
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

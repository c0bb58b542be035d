//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Colorized human output in development, JSON lines everywhere else
//! - `RUST_LOG` overrides the configured level
//! - Events go to stderr; stdout belongs to hosted-mode invocation results

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Install the global subscriber for `environment`.
///
/// Returns an error if a subscriber is already installed (e.g. in tests).
pub fn init(
    environment: Environment,
    level: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = if environment.is_development() { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("edge_gateway={level},tower_http={level}").into());

    let registry = tracing_subscriber::registry().with(filter);
    if environment.is_development() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    }
}

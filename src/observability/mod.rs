//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Per request:
//!     → access log line (http::server, AccessLog stage)
//!     → x-request-id on request and response
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing outside development
//! - Exactly one access log line per request
//! - Metrics exporter only in daemon mode (hosted mode never binds)

pub mod logging;
pub mod metrics;

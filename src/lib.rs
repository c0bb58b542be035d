//! Edge gateway library.
//!
//! An HTTP request gateway that puts a fixed, ordered policy pipeline in
//! front of application routes, and runs either as a long-lived daemon or
//! as a per-invocation handler inside a managed host.
//!
//! # Architecture Overview
//!
//! ```text
//!   request ──▶ RequestId ─▶ AccessLog ─▶ InFlight ─▶ ErrorNormalizer
//!                 ─▶ SecurityHeaders ─▶ Cors ─▶ BodyLimit ─▶ RateLimit (/api)
//!                 ─▶ DependencyGate ─▶ PanicGuard
//!                 ─▶ routes │ static files │ / /admin /health │ not-found
//!
//!   daemon:  lifecycle::Orchestrator  connect → bind → serve → drain
//!   hosted:  lifecycle::HostedGateway per-invocation, never binds or exits
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod routing;

// Collaborators
pub mod database;
pub mod health;
pub mod routes;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::Gateway;
pub use lifecycle::{ExecutionMode, HostedGateway, Orchestrator, Shutdown, Termination};

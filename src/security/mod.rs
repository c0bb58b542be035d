//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CSP and hardening headers on every response)
//!     → cors.rs (single allowed origin, preflight)
//!     → limits.rs (declared body size)
//!     → rate_limit.rs (per-client fixed window, API prefix only)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Policies are fixed at startup; nothing is reconfigurable per request
//! - Rejections are ordinary responses, never process-level failures
//! - No trust in client input (forwarded headers opt-in)

pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use rate_limit::{Decision, RateLimiter};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request that passed the policy stack
//!     → delegated routes (application handlers, mounted at /)
//!     → static files (assets.dir)
//!     → fixed endpoints: /, /admin, /health
//!     → not-found
//! ```
//!
//! # Design Decisions
//! - Routes assembled once at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - First match wins, in the fixed order above

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::build_facade;

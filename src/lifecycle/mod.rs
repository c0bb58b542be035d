//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Daemon (orchestrator.rs):
//!     Uninitialized → ConnectingDependencies → Listening
//!         → (signal) Draining → Terminated
//!     connect failure: error returned, nothing bound
//!     drain deadline missed: Forced, caller exits non-zero
//!
//! Hosted (hosted.rs):
//!     per invocation: connect if not yet connected → pipeline → response
//!     connect failure: DependencyFault on the request, 503 from the pipeline
//! ```
//!
//! # Design Decisions
//! - The mode (mode.rs) is resolved once; only the entry points branch on it
//! - States only move forward; the watch channel exposes them to observers
//! - Disconnecting the backend never fails the shutdown sequence

pub mod hosted;
pub mod inflight;
pub mod mode;
pub mod orchestrator;
pub mod shutdown;
pub mod signals;

use std::net::SocketAddr;

use crate::database::DatabaseError;

pub use hosted::HostedGateway;
pub use mode::ExecutionMode;
pub use orchestrator::Orchestrator;
pub use shutdown::Shutdown;

/// Daemon lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    ConnectingDependencies,
    Listening(SocketAddr),
    Draining,
    Terminated,
}

impl LifecycleState {
    /// Position in the forward-only sequence.
    pub fn rank(&self) -> u8 {
        match self {
            LifecycleState::Uninitialized => 0,
            LifecycleState::ConnectingDependencies => 1,
            LifecycleState::Listening(_) => 2,
            LifecycleState::Draining => 3,
            LifecycleState::Terminated => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::ConnectingDependencies => "connecting-dependencies",
            LifecycleState::Listening(_) => "listening",
            LifecycleState::Draining => "draining",
            LifecycleState::Terminated => "terminated",
        }
    }
}

/// How a daemon run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every in-flight request finished inside the drain deadline.
    Clean,
    /// The deadline passed; `abandoned` requests were still running.
    Forced { abandoned: u64 },
}

impl Termination {
    pub fn is_clean(&self) -> bool {
        matches!(self, Termination::Clean)
    }
}

/// Fatal daemon startup/serve failures.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("persistence backend unavailable: {0}")]
    DependencyConnect(#[source] DatabaseError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

//! HTTP pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (daemon) or invocation event (hosted)
//!     → server.rs (declared stage pipeline around the router facade)
//!     → request.rs (request id, client identity, body parsing)
//!     → [routing facade picks a handler]
//!     → response.rs (error normalization, not-found)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientIdentity, DependencyFault, ParsedBody};
pub use response::{ErrorPayload, ErrorPolicy};
pub use server::{Gateway, HttpServer, Stage, PIPELINE};

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util connection, request ID, tracing, timeout)
//!     → /live, /ready → endpoints.rs
//!     → gate.rs (503 once draining)
//!         → /health → endpoints.rs
//!         → business routes
//!     → Send to client
//! ```

pub mod endpoints;
pub mod gate;
pub mod server;

pub use endpoints::EndpointState;
pub use gate::request_gate;
pub use server::{build_router, HttpServer, ServerHandle};

//! Service lifecycle and health orchestration for the estate marketplace
//! backend.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod resources;

// Health and lifecycle
pub mod health;
pub mod lifecycle;

// Cross-cutting concerns
pub mod observability;

pub use config::schema::ServiceConfig;
pub use health::{HealthAggregator, HealthReport, OverallStatus, Probe, ServiceStatus};
pub use http::{build_router, EndpointState, HttpServer};
pub use lifecycle::{ShutdownCoordinator, ShutdownState, ShutdownTrigger, TerminationReason};

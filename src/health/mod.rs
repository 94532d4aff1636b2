//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint request (/health, /ready)
//!     → aggregator.rs (fan-out, per-probe timeout + panic boundary)
//!     → probes/* (database, cache, filesystem, memory, integrations)
//!     → reduce() folds ServiceStatus values into OverallStatus
//!     → HealthReport (fresh per call, serialized to the caller)
//! ```
//!
//! # Design Decisions
//! - Probes never fail outward; errors become `unhealthy` data
//! - Only critical probes can force `unhealthy`; others cap at `degraded`
//! - `not_configured` is visible in the report but ignored by the reduction
//! - The registry is fixed at start-up and shared read-only

pub mod aggregator;
pub mod probe;
pub mod probes;
pub mod status;

pub use aggregator::{reduce, HealthAggregator};
pub use probe::{Criticality, FnProbe, Probe, ProbeRegistration, ProbeRegistry, RegistryError};
pub use status::{HealthReport, HealthState, OverallStatus, ServiceStatus};

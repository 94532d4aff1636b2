//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build clients and probes → Bind listener
//!
//! Triggers (signals.rs):
//!     SIGTERM/SIGINT, uncaught panic, supervised task exit
//!         → ShutdownTrigger::trigger (CAS Running → Draining)
//!
//! Shutdown (shutdown.rs), bounded by the global deadline:
//!     Stop accepting → Drain grace window → Cleanup tasks
//!         → Disconnect resources → Terminated → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then clients, then the listener
//! - Ordered shutdown: stop accept, drain, clean up, disconnect
//! - Shutdown has a deadline: exit 1 once it expires

pub mod cleanup;
pub mod isolation;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use cleanup::{CleanupRegistry, CleanupReport, CleanupTask};
pub use shutdown::{
    DrainReport, DrainTarget, ProcessExit, ShutdownCoordinator, ShutdownOutcome, ShutdownTrigger,
    StdProcessExit, TerminationReason,
};
pub use startup::{initialize, Services, StartupError};
pub use state::{ShutdownPhase, ShutdownState};

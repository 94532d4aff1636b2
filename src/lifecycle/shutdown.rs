//! Graceful shutdown coordination.
//!
//! # Responsibilities
//! - Funnel every termination cause into one [`TerminationReason`]
//! - Collapse repeated triggers into a single shutdown
//! - Run the shutdown sequence under a global deadline
//! - Exit the process with a code reflecting the outcome
//!
//! # Design Decisions
//! - The `Running → Draining` CAS happens in [`ShutdownTrigger::trigger`], so
//!   the request gate closes at the moment of the trigger
//! - The deadline races the sequence future; on expiry the future is dropped
//!   and no later step runs
//! - Steps are best-effort: failures are logged and the sequence continues
//! - Cleanup tasks run before resources are disconnected so they can still
//!   use shared clients

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::ShutdownConfig;
use crate::lifecycle::cleanup::{CleanupRegistry, CleanupTask};
use crate::lifecycle::isolation::{isolate, panic_message};
use crate::lifecycle::state::ShutdownState;
use crate::observability::metrics;
use crate::resources::Resource;

/// Why the process is shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// An OS signal such as SIGTERM.
    Signal(&'static str),
    /// A panic outside any isolated section.
    Panic(String),
    /// A supervised background task failed or stopped.
    Fatal(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Signal(name) => write!(f, "signal {name}"),
            TerminationReason::Panic(msg) => write!(f, "panic: {msg}"),
            TerminationReason::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

/// How the shutdown sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    DeadlineExceeded,
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Completed => 0,
            ShutdownOutcome::DeadlineExceeded => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownOutcome::Completed => "completed",
            ShutdownOutcome::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Connection counts observed while draining.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections open when the listener stopped accepting.
    pub in_flight: u64,
    /// Connections still open when the grace window ended.
    pub forced: u64,
}

/// The listener side of shutdown: stop accepting, then drain.
#[async_trait]
pub trait DrainTarget: Send + Sync {
    fn stop_accepting(&self);

    /// Wait up to `grace` for open connections, then force-close the rest.
    async fn drain(&self, grace: Duration) -> DrainReport;
}

/// Terminates the process.
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32);
}

/// Calls [`std::process::exit`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdProcessExit;

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Cloneable handle that starts shutdown.
#[derive(Clone)]
pub struct ShutdownTrigger {
    state: ShutdownState,
    requests: mpsc::UnboundedSender<TerminationReason>,
}

impl ShutdownTrigger {
    /// Begin shutdown. Returns false if shutdown had already begun, in which
    /// case nothing happens beyond a log line.
    pub fn trigger(&self, reason: TerminationReason) -> bool {
        if !self.state.begin_draining() {
            tracing::info!(reason = %reason, "Shutdown already in progress, ignoring trigger");
            return false;
        }

        tracing::warn!(reason = %reason, "Shutdown triggered");
        if self.requests.send(reason).is_err() {
            tracing::error!("Shutdown coordinator is not running");
        }
        true
    }

    pub fn state(&self) -> &ShutdownState {
        &self.state
    }
}

/// Steps run once shutdown has begun.
struct ShutdownSequence {
    drain: Option<Arc<dyn DrainTarget>>,
    drain_grace: Duration,
    cleanup: CleanupRegistry,
    resources: Vec<Arc<dyn Resource>>,
}

impl ShutdownSequence {
    async fn execute(&self) {
        if let Some(target) = &self.drain {
            target.stop_accepting();
            tracing::info!("Stopped accepting new connections");

            let report = target.drain(self.drain_grace).await;
            if report.forced > 0 {
                tracing::warn!(
                    in_flight = report.in_flight,
                    forced = report.forced,
                    "Force-closed connections after grace window"
                );
            } else {
                tracing::info!(in_flight = report.in_flight, "Connections drained");
            }
        }

        if !self.cleanup.is_empty() {
            let report = self.cleanup.run_all().await;
            tracing::info!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Cleanup tasks finished"
            );
        }

        join_all(self.resources.iter().map(|resource| async move {
            match isolate(resource.disconnect()).await {
                Ok(Ok(())) => tracing::info!(resource = resource.name(), "Resource disconnected"),
                Ok(Err(e)) => tracing::error!(
                    resource = resource.name(),
                    error = %format!("{e:#}"),
                    "Resource disconnect failed"
                ),
                Err(panic) => tracing::error!(
                    resource = resource.name(),
                    panic = %panic_message(panic.as_ref()),
                    "Resource disconnect panicked"
                ),
            }
        }))
        .await;
    }
}

/// Owns the shutdown sequence and waits for the first trigger.
pub struct ShutdownCoordinator {
    state: ShutdownState,
    deadline: Duration,
    sequence: ShutdownSequence,
    exit: Arc<dyn ProcessExit>,
    trigger: ShutdownTrigger,
    requests: mpsc::UnboundedReceiver<TerminationReason>,
}

impl ShutdownCoordinator {
    pub fn new(state: ShutdownState, config: &ShutdownConfig, exit: Arc<dyn ProcessExit>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = ShutdownTrigger {
            state: state.clone(),
            requests: tx,
        };
        Self {
            state,
            deadline: config.deadline(),
            sequence: ShutdownSequence {
                drain: None,
                drain_grace: config.drain_grace(),
                cleanup: CleanupRegistry::new(),
                resources: Vec::new(),
            },
            exit,
            trigger,
            requests: rx,
        }
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    pub fn set_drain_target(&mut self, target: Arc<dyn DrainTarget>) {
        self.sequence.drain = Some(target);
    }

    pub fn register_cleanup(&mut self, task: CleanupTask) {
        self.sequence.cleanup.register(task);
    }

    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) {
        tracing::debug!(resource = resource.name(), "Resource registered for shutdown");
        self.sequence.resources.push(resource);
    }

    /// Wait for the first trigger, run the sequence, then exit.
    ///
    /// Returns the outcome after the exit hook has been called, which only
    /// happens when the hook does not terminate the process.
    pub async fn run(mut self) -> ShutdownOutcome {
        let reason = match self.requests.recv().await {
            Some(reason) => reason,
            None => TerminationReason::Fatal("shutdown channel closed".to_string()),
        };
        self.shutdown(reason).await
    }

    async fn shutdown(&self, reason: TerminationReason) -> ShutdownOutcome {
        let started = Instant::now();
        tracing::info!(
            reason = %reason,
            deadline_ms = self.deadline.as_millis() as u64,
            drain_grace_ms = self.sequence.drain_grace.as_millis() as u64,
            "Graceful shutdown started"
        );

        let outcome = tokio::select! {
            _ = self.sequence.execute() => ShutdownOutcome::Completed,
            _ = tokio::time::sleep(self.deadline) => {
                tracing::error!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Shutdown deadline exceeded, forcing exit"
                );
                ShutdownOutcome::DeadlineExceeded
            }
        };

        self.state.mark_terminated();
        let elapsed = started.elapsed();
        metrics::record_shutdown(outcome.as_str(), elapsed);
        tracing::info!(
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            exit_code = outcome.exit_code(),
            "Shutdown finished"
        );

        self.exit.exit(outcome.exit_code());
        outcome
    }
}

//! Termination sources: OS signals, panics and supervised tasks.
//!
//! # Responsibilities
//! - Register SIGTERM/SIGINT handlers and turn them into shutdown triggers
//! - Install a panic hook that starts shutdown on uncontained panics
//! - Watch background tasks and start shutdown when one stops unexpectedly
//!
//! # Design Decisions
//! - Handlers are registered before spawning so registration errors surface
//!   at start-up
//! - The listener keeps running after the first signal; later signals are
//!   collapsed by the trigger
//! - Panics inside isolated probes or cleanup tasks are left to their caller

use std::fmt::Display;
use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::isolation::{is_isolated, panic_message};
use crate::lifecycle::shutdown::{ShutdownTrigger, TerminationReason};

/// Register signal handlers and forward each delivery to `trigger`.
#[cfg(unix)]
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = sigterm.recv() => "SIGTERM",
                Some(()) = sigint.recv() => "SIGINT",
                else => break,
            };
            tracing::info!(signal = name, "Received signal");
            trigger.trigger(TerminationReason::Signal(name));
        }
    }))
}

/// Register signal handlers and forward each delivery to `trigger`.
#[cfg(not(unix))]
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(signal = "CTRL_C", "Received signal");
            trigger.trigger(TerminationReason::Signal("CTRL_C"));
        }
    }))
}

/// Chain a panic hook that starts shutdown.
///
/// Panics raised while polling an isolated future are still reported by the
/// previous hook at debug level only; they are already turned into data.
pub fn install_panic_hook(trigger: ShutdownTrigger) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if is_isolated() {
            tracing::debug!(panic = %info, "Contained panic");
            return;
        }

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = panic_message(info.payload());
        tracing::error!(panic = %message, location = %location, "Uncaught panic");

        trigger.trigger(TerminationReason::Panic(format!("{message} at {location}")));
        previous(info);
    }));
}

/// Watch a background task; its exit outside shutdown is fatal.
pub fn supervise<T, E>(
    name: &'static str,
    task: JoinHandle<Result<T, E>>,
    trigger: ShutdownTrigger,
) -> JoinHandle<()>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        let reason = match task.await {
            Ok(Ok(_)) if trigger.state().is_draining() => {
                tracing::debug!(task = name, "Supervised task finished during shutdown");
                return;
            }
            Ok(Ok(_)) => TerminationReason::Fatal(format!("{name} exited unexpectedly")),
            Ok(Err(e)) => TerminationReason::Fatal(format!("{name} failed: {e}")),
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                TerminationReason::Panic(format!("{name}: {}", panic_message(payload.as_ref())))
            }
            Err(_) => {
                tracing::debug!(task = name, "Supervised task cancelled");
                return;
            }
        };

        tracing::error!(task = name, reason = %reason, "Supervised task stopped");
        trigger.trigger(reason);
    })
}

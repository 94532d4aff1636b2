//! Process-wide shutdown phase.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Lifecycle phase of the process.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownPhase {
    Running = 0,
    Draining = 1,
    Terminated = 2,
}

impl From<u8> for ShutdownPhase {
    fn from(val: u8) -> Self {
        match val {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            _ => ShutdownPhase::Terminated,
        }
    }
}

struct Inner {
    phase: AtomicU8,
    changes: watch::Sender<ShutdownPhase>,
}

/// Shared holder of the [`ShutdownPhase`].
///
/// Transitions go through compare-and-swap so `Running → Draining` happens
/// exactly once no matter how many triggers race. Readers use the atomic for
/// per-request checks and [`ShutdownState::subscribe`] to await changes.
#[derive(Clone)]
pub struct ShutdownState {
    inner: Arc<Inner>,
}

impl ShutdownState {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(ShutdownPhase::Running);
        Self {
            inner: Arc::new(Inner {
                phase: AtomicU8::new(ShutdownPhase::Running as u8),
                changes,
            }),
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from(self.inner.phase.load(Ordering::SeqCst))
    }

    /// True once shutdown has begun (draining or terminated).
    pub fn is_draining(&self) -> bool {
        self.phase() >= ShutdownPhase::Draining
    }

    /// Move `Running → Draining`. Returns false if shutdown had already begun.
    pub fn begin_draining(&self) -> bool {
        let won = self
            .inner
            .phase
            .compare_exchange(
                ShutdownPhase::Running as u8,
                ShutdownPhase::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if won {
            self.inner.changes.send_replace(ShutdownPhase::Draining);
        }
        won
    }

    pub fn mark_terminated(&self) {
        self.inner
            .phase
            .store(ShutdownPhase::Terminated as u8, Ordering::SeqCst);
        self.inner.changes.send_replace(ShutdownPhase::Terminated);
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.inner.changes.subscribe()
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownState")
            .field("phase", &self.phase())
            .finish()
    }
}

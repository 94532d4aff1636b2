//! Cleanup tasks run during shutdown.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;

use crate::lifecycle::isolation::{isolate, panic_message};
use crate::observability::metrics;

type CleanupFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A named release step, e.g. flushing a queue or closing a file handle.
#[derive(Clone)]
pub struct CleanupTask {
    name: String,
    run: CleanupFn,
}

impl CleanupTask {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(move || run().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Result of one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// Tasks registered at start-up by the service and its collaborators.
#[derive(Default, Clone)]
pub struct CleanupRegistry {
    tasks: Vec<CleanupTask>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: CleanupTask) {
        tracing::debug!(task = %task.name, "Cleanup task registered");
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every task concurrently. A failing or panicking task is logged
    /// and does not affect the others.
    pub async fn run_all(&self) -> CleanupReport {
        let outcomes = join_all(self.tasks.iter().map(|task| async move {
            let outcome = isolate((task.run)()).await;
            let ok = match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(task = %task.name, "Cleanup task finished");
                    true
                }
                Ok(Err(e)) => {
                    tracing::error!(task = %task.name, error = %format!("{e:#}"), "Cleanup task failed");
                    false
                }
                Err(panic) => {
                    tracing::error!(
                        task = %task.name,
                        panic = %panic_message(panic.as_ref()),
                        "Cleanup task panicked"
                    );
                    false
                }
            };
            if !ok {
                metrics::record_cleanup_failure(&task.name);
            }
            (task.name.clone(), ok)
        }))
        .await;

        let mut report = CleanupReport::default();
        for (name, ok) in outcomes {
            if ok {
                report.succeeded.push(name);
            } else {
                report.failed.push(name);
            }
        }
        report
    }
}

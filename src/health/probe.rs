//! Probe abstraction and the start-up registry.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::health::status::ServiceStatus;

/// An isolated check of one dependency.
///
/// Implementations convert their own errors into [`ServiceStatus::unhealthy`];
/// timeouts and panics are handled by the aggregator.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> ServiceStatus;
}

/// Whether a probe may force the overall status to unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Critical,
    NonCritical,
}

impl Criticality {
    pub fn from_flag(critical: bool) -> Self {
        if critical {
            Criticality::Critical
        } else {
            Criticality::NonCritical
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Criticality::Critical)
    }
}

/// A probe together with how the aggregator treats it.
#[derive(Clone)]
pub struct ProbeRegistration {
    pub probe: Arc<dyn Probe>,
    pub criticality: Criticality,
    /// Overrides the aggregator's default timeout.
    pub timeout: Option<Duration>,
}

impl ProbeRegistration {
    pub fn name(&self) -> &str {
        self.probe.name()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("probe '{0}' is already registered")]
    Duplicate(String),
}

/// Probes registered at start-up. Read-only once handed to the aggregator.
#[derive(Default, Clone)]
pub struct ProbeRegistry {
    probes: Vec<ProbeRegistration>,
    names: HashSet<String>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        probe: Arc<dyn Probe>,
        criticality: Criticality,
    ) -> Result<(), RegistryError> {
        self.register_with_timeout(probe, criticality, None)
    }

    pub fn register_with_timeout(
        &mut self,
        probe: Arc<dyn Probe>,
        criticality: Criticality,
        timeout: Option<Duration>,
    ) -> Result<(), RegistryError> {
        let name = probe.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(probe = %name, critical = criticality.is_critical(), "Probe registered");
        self.probes.push(ProbeRegistration {
            probe,
            criticality,
            timeout,
        });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeRegistration> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

/// Adapts an async closure into a [`Probe`].
pub struct FnProbe<F> {
    name: String,
    check: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ServiceStatus> + Send,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ServiceStatus> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ServiceStatus {
        (self.check)().await
    }
}

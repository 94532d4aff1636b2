//! Concurrent fan-out over the probe registry.
//!
//! # Responsibilities
//! - Invoke every registered probe concurrently
//! - Bound each probe with its own timeout and panic boundary
//! - Reduce the results into one overall status
//!
//! # Design Decisions
//! - No caching: every evaluation re-measures reality
//! - A hanging probe only costs its own timeout; total latency is the
//!   slowest timeout, not the sum
//! - `not_configured` services are reported but never affect the status

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;

use crate::health::probe::{Criticality, ProbeRegistration, ProbeRegistry};
use crate::health::status::{HealthReport, HealthState, OverallStatus, ServiceStatus};
use crate::lifecycle::isolation::{isolate, panic_message};
use crate::observability::metrics;

/// Reduce probe results into the overall status.
///
/// First match wins: a critical probe that is unhealthy makes the process
/// unhealthy; otherwise any unhealthy or degraded probe makes it degraded.
pub fn reduce<'a, I>(results: I) -> OverallStatus
where
    I: IntoIterator<Item = (&'a ServiceStatus, Criticality)>,
{
    let mut overall = OverallStatus::Healthy;
    for (status, criticality) in results {
        match status.status {
            HealthState::Unhealthy if criticality.is_critical() => {
                return OverallStatus::Unhealthy;
            }
            HealthState::Unhealthy | HealthState::Degraded => {
                overall = OverallStatus::Degraded;
            }
            HealthState::Healthy | HealthState::NotConfigured => {}
        }
    }
    overall
}

/// Evaluates the registered probes on demand.
pub struct HealthAggregator {
    registry: Arc<ProbeRegistry>,
    probe_timeout: Duration,
    started_at: Instant,
}

impl HealthAggregator {
    pub fn new(registry: ProbeRegistry, probe_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            probe_timeout,
            started_at: Instant::now(),
        }
    }

    /// Process uptime, answered without touching any probe.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Evaluate every registered probe.
    pub async fn evaluate(&self) -> HealthReport {
        self.evaluate_matching(|_| true).await
    }

    /// Evaluate only the critical probes (readiness).
    pub async fn evaluate_critical(&self) -> HealthReport {
        self.evaluate_matching(|r| r.criticality.is_critical()).await
    }

    async fn evaluate_matching<P>(&self, include: P) -> HealthReport
    where
        P: Fn(&ProbeRegistration) -> bool,
    {
        let selected: Vec<&ProbeRegistration> =
            self.registry.iter().filter(|r| include(r)).collect();

        let results = join_all(
            selected
                .iter()
                .map(|registration| self.run_probe(registration)),
        )
        .await;

        let status = reduce(
            results
                .iter()
                .zip(&selected)
                .map(|(status, registration)| (status, registration.criticality)),
        );

        let services: BTreeMap<String, ServiceStatus> = selected
            .iter()
            .map(|registration| registration.name().to_string())
            .zip(results)
            .collect();

        let report = HealthReport {
            status,
            timestamp: Utc::now(),
            uptime_seconds: self.uptime().as_secs(),
            services,
        };

        metrics::record_health_evaluation(status);
        if status != OverallStatus::Healthy {
            tracing::warn!(
                status = %status,
                failing = ?report.failing_services(),
                "Health evaluation not healthy"
            );
        }
        report
    }

    /// Run one probe behind its timeout and panic boundary.
    async fn run_probe(&self, registration: &ProbeRegistration) -> ServiceStatus {
        let name = registration.name();
        let limit = registration.timeout.unwrap_or(self.probe_timeout);
        let started = tokio::time::Instant::now();

        let guarded = isolate(registration.probe.check());
        let status = match tokio::time::timeout(limit, guarded).await {
            Ok(Ok(status)) => status,
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(probe = %name, panic = %message, "Probe panicked");
                ServiceStatus::unhealthy(format!("probe panicked: {message}"))
            }
            Err(_) => {
                tracing::warn!(probe = %name, timeout_ms = limit.as_millis() as u64, "Probe timed out");
                ServiceStatus::unhealthy(format!("timed out after {}ms", limit.as_millis()))
                    .with_detail("timedOut", true)
            }
        };

        let elapsed = started.elapsed();
        let status = match status.status {
            HealthState::NotConfigured => status,
            _ if status.response_time.is_none() => status.with_response_time(elapsed),
            _ => status,
        };

        metrics::record_probe(name, status.status, elapsed);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::FnProbe;
    use crate::health::status::HealthState::{Degraded, Healthy, NotConfigured, Unhealthy};

    fn status(state: HealthState) -> ServiceStatus {
        match state {
            Healthy => ServiceStatus::healthy(),
            Degraded => ServiceStatus::degraded("slow"),
            Unhealthy => ServiceStatus::unhealthy("down"),
            NotConfigured => ServiceStatus::not_configured(),
        }
    }

    #[test]
    fn reduction_table() {
        use crate::health::status::OverallStatus as O;

        // (critical probe, non-critical probe, expected)
        let table = [
            (Healthy, Healthy, O::Healthy),
            (Healthy, Degraded, O::Degraded),
            (Healthy, Unhealthy, O::Degraded),
            (Healthy, NotConfigured, O::Healthy),
            (Degraded, Healthy, O::Degraded),
            (Degraded, Degraded, O::Degraded),
            (Degraded, Unhealthy, O::Degraded),
            (Degraded, NotConfigured, O::Degraded),
            (Unhealthy, Healthy, O::Unhealthy),
            (Unhealthy, Degraded, O::Unhealthy),
            (Unhealthy, Unhealthy, O::Unhealthy),
            (Unhealthy, NotConfigured, O::Unhealthy),
            (NotConfigured, Healthy, O::Healthy),
            (NotConfigured, Degraded, O::Degraded),
            (NotConfigured, Unhealthy, O::Degraded),
            (NotConfigured, NotConfigured, O::Healthy),
        ];

        for (critical, non_critical, expected) in table {
            let critical_status = status(critical);
            let other_status = status(non_critical);

            let forward = reduce([
                (&critical_status, Criticality::Critical),
                (&other_status, Criticality::NonCritical),
            ]);
            let reversed = reduce([
                (&other_status, Criticality::NonCritical),
                (&critical_status, Criticality::Critical),
            ]);

            assert_eq!(forward, expected, "critical={critical} non_critical={non_critical}");
            assert_eq!(reversed, expected, "order must not matter");
        }
    }

    #[test]
    fn empty_registry_is_healthy() {
        assert_eq!(reduce(std::iter::empty()), OverallStatus::Healthy);
    }

    #[test]
    fn degraded_critical_before_unhealthy_critical_still_unhealthy() {
        let degraded = status(Degraded);
        let unhealthy = status(Unhealthy);
        assert_eq!(
            reduce([
                (&degraded, Criticality::Critical),
                (&unhealthy, Criticality::Critical),
            ]),
            OverallStatus::Unhealthy
        );
    }

    fn registry(probes: Vec<(&'static str, HealthState, Criticality)>) -> ProbeRegistry {
        let mut registry = ProbeRegistry::new();
        for (name, state, criticality) in probes {
            registry
                .register(
                    Arc::new(FnProbe::new(name, move || async move { status(state) })),
                    criticality,
                )
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn report_lists_not_configured_services() {
        let aggregator = HealthAggregator::new(
            registry(vec![
                ("database", Healthy, Criticality::Critical),
                ("cache", NotConfigured, Criticality::NonCritical),
            ]),
            Duration::from_secs(1),
        );

        let report = aggregator.evaluate().await;
        assert_eq!(report.status, OverallStatus::Healthy);
        assert_eq!(report.services.len(), 2);
        assert_eq!(report.services["cache"].status, NotConfigured);
        assert!(report.services["cache"].response_time.is_none());
        assert!(report.services["database"].response_time.is_some());
    }

    #[tokio::test]
    async fn critical_evaluation_skips_non_critical_probes() {
        let aggregator = HealthAggregator::new(
            registry(vec![
                ("database", Healthy, Criticality::Critical),
                ("mailer", Unhealthy, Criticality::NonCritical),
            ]),
            Duration::from_secs(1),
        );

        let report = aggregator.evaluate_critical().await;
        assert_eq!(report.status, OverallStatus::Healthy);
        assert_eq!(report.services.keys().collect::<Vec<_>>(), vec!["database"]);

        let full = aggregator.evaluate().await;
        assert_eq!(full.status, OverallStatus::Degraded);
    }

    fn explode() -> ServiceStatus {
        panic!("boom")
    }

    #[tokio::test]
    async fn panicking_probe_becomes_unhealthy() {
        let mut registry = ProbeRegistry::new();
        registry
            .register(
                Arc::new(FnProbe::new("flaky", || async { explode() })),
                Criticality::Critical,
            )
            .unwrap();
        let aggregator = HealthAggregator::new(registry, Duration::from_secs(1));

        let report = aggregator.evaluate().await;
        assert_eq!(report.status, OverallStatus::Unhealthy);
        assert_eq!(
            report.services["flaky"].error.as_deref(),
            Some("probe panicked: boom")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probes_are_bounded_by_their_own_timeout() {
        let mut registry = ProbeRegistry::new();
        for name in ["stuck-a", "stuck-b"] {
            registry
                .register(
                    Arc::new(FnProbe::new(name, || async {
                        std::future::pending::<()>().await;
                        ServiceStatus::healthy()
                    })),
                    Criticality::NonCritical,
                )
                .unwrap();
        }
        registry
            .register_with_timeout(
                Arc::new(FnProbe::new("database", || async { ServiceStatus::healthy() })),
                Criticality::Critical,
                Some(Duration::from_millis(50)),
            )
            .unwrap();
        let aggregator = HealthAggregator::new(registry, Duration::from_millis(100));

        let started = tokio::time::Instant::now();
        let report = aggregator.evaluate().await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(200), "took {elapsed:?}");
        assert_eq!(report.status, OverallStatus::Degraded);
        assert_eq!(report.services["database"].status, Healthy);
        let stuck = &report.services["stuck-a"];
        assert_eq!(stuck.status, Unhealthy);
        assert_eq!(stuck.error.as_deref(), Some("timed out after 100ms"));
        assert_eq!(stuck.details.as_ref().unwrap()["timedOut"], true);
    }
}

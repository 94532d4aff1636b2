//! Ping probe over a shared client (database, cache).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::health::probe::Probe;
use crate::health::status::ServiceStatus;
use crate::resources::Resource;

pub struct ResourceProbe {
    name: String,
    resource: Option<Arc<dyn Resource>>,
}

impl ResourceProbe {
    pub fn new(resource: Arc<dyn Resource>) -> Self {
        Self {
            name: resource.name().to_string(),
            resource: Some(resource),
        }
    }

    /// A dependency absent from this deployment.
    pub fn not_configured(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
        }
    }
}

#[async_trait]
impl Probe for ResourceProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ServiceStatus {
        let Some(resource) = &self.resource else {
            return ServiceStatus::not_configured();
        };

        let started = Instant::now();
        let result = resource.ping().await;
        let elapsed = started.elapsed();

        let status = match result {
            Ok(()) => ServiceStatus::healthy(),
            Err(e) => ServiceStatus::unhealthy(format!("{e:#}")),
        };
        let status = status.with_response_time(elapsed);
        match resource.details() {
            Some(details) => status.with_details(details),
            None => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::status::HealthState;
    use anyhow::anyhow;

    struct StubResource {
        fail: bool,
    }

    #[async_trait]
    impl Resource for StubResource {
        fn name(&self) -> &str {
            "database"
        }

        async fn ping(&self) -> anyhow::Result<()> {
            if self.fail {
                Err(anyhow!("connection refused").context("database ping failed"))
            } else {
                Ok(())
            }
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn healthy_ping_reports_response_time() {
        let probe = ResourceProbe::new(Arc::new(StubResource { fail: false }));
        let status = probe.check().await;

        assert_eq!(probe.name(), "database");
        assert_eq!(status.status, HealthState::Healthy);
        assert!(status.response_time.is_some());
    }

    #[tokio::test]
    async fn failed_ping_carries_error_chain() {
        let probe = ResourceProbe::new(Arc::new(StubResource { fail: true }));
        let status = probe.check().await;

        assert_eq!(status.status, HealthState::Unhealthy);
        assert_eq!(
            status.error.as_deref(),
            Some("database ping failed: connection refused")
        );
    }

    #[tokio::test]
    async fn missing_resource_is_not_configured() {
        let probe = ResourceProbe::not_configured("cache");
        assert_eq!(probe.check().await, ServiceStatus::not_configured());
    }
}

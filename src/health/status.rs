//! Health status values and the aggregated report.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Health of a single service as reported by its probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    /// The dependency is not set up in this deployment. Excluded from the
    /// overall status.
    NotConfigured,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
            HealthState::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }

    /// Degraded still serves traffic so partial outages do not trigger mass
    /// restarts.
    pub fn is_serving(&self) -> bool {
        !matches!(self, OverallStatus::Unhealthy)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub status: HealthState,

    #[serde(
        rename = "responseTimeMs",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_millis"
    )]
    pub response_time: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ServiceStatus {
    fn new(status: HealthState) -> Self {
        Self {
            status,
            response_time: None,
            error: None,
            details: None,
        }
    }

    pub fn healthy() -> Self {
        Self::new(HealthState::Healthy)
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::new(HealthState::Degraded)
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(HealthState::Unhealthy)
        }
    }

    pub fn not_configured() -> Self {
        Self::new(HealthState::NotConfigured)
    }

    pub fn with_response_time(mut self, elapsed: Duration) -> Self {
        self.response_time = Some(elapsed);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details.get_or_insert_with(Map::new).extend(details);
        self
    }
}

fn serialize_millis<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(elapsed) => serializer.serialize_u64(elapsed.as_millis() as u64),
        None => serializer.serialize_none(),
    }
}

/// Aggregated result of one evaluation. Built fresh on every call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub services: BTreeMap<String, ServiceStatus>,
}

impl HealthReport {
    /// Names of services whose state is neither healthy nor not configured.
    pub fn failing_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, s)| matches!(s.status, HealthState::Degraded | HealthState::Unhealthy))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_wire_shape() {
        let status = ServiceStatus::unhealthy("connection refused")
            .with_response_time(Duration::from_millis(42))
            .with_detail("host", "db.internal");

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "status": "unhealthy",
                "responseTimeMs": 42,
                "error": "connection refused",
                "details": { "host": "db.internal" }
            })
        );
    }

    #[test]
    fn omits_absent_fields() {
        assert_eq!(
            serde_json::to_value(ServiceStatus::not_configured()).unwrap(),
            json!({ "status": "not_configured" })
        );
    }

    #[test]
    fn only_unhealthy_stops_serving() {
        assert!(OverallStatus::Healthy.is_serving());
        assert!(OverallStatus::Degraded.is_serving());
        assert!(!OverallStatus::Unhealthy.is_serving());
    }
}

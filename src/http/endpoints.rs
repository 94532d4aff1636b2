//! Liveness, readiness and health endpoints.
//!
//! # Responsibilities
//! - `/live`: the process answers; no dependency is touched
//! - `/ready`: whether traffic should be routed here now
//! - `/health`: the full per-dependency report
//!
//! # Design Decisions
//! - Readiness answers `not_ready` without probing once draining
//! - Readiness only probes critical dependencies
//! - `degraded` maps to 200 on `/health`; on `/ready` it is configurable

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::health::{HealthAggregator, OverallStatus};
use crate::lifecycle::ShutdownState;

/// State shared by the health endpoints.
#[derive(Clone)]
pub struct EndpointState {
    pub aggregator: Arc<HealthAggregator>,
    pub shutdown: ShutdownState,
    /// Treat a degraded critical subset as ready.
    pub ready_when_degraded: bool,
}

pub async fn live(State(state): State<EndpointState>) -> Response {
    Json(json!({
        "status": "alive",
        "uptimeSeconds": state.aggregator.uptime().as_secs(),
    }))
    .into_response()
}

pub async fn ready(State(state): State<EndpointState>) -> Response {
    if state.shutdown.is_draining() {
        return not_ready("shutting down".to_string());
    }

    let report = state.aggregator.evaluate_critical().await;
    let ready = match report.status {
        OverallStatus::Healthy => true,
        OverallStatus::Degraded => state.ready_when_degraded,
        OverallStatus::Unhealthy => false,
    };

    if ready {
        return Json(json!({ "status": "ready" })).into_response();
    }

    let failing = report.failing_services();
    let reason = if failing.is_empty() {
        format!("critical dependencies {}", report.status)
    } else {
        format!("critical dependencies {}: {}", report.status, failing.join(", "))
    };
    not_ready(reason)
}

pub async fn health(State(state): State<EndpointState>) -> Response {
    let report = state.aggregator.evaluate().await;
    let code = if report.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}

fn not_ready(reason: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "not_ready", "reason": reason })),
    )
        .into_response()
}

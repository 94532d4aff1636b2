//! Request gate.
//! Refuses new work once shutdown has begun.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::lifecycle::ShutdownState;
use crate::observability::metrics;

pub async fn request_gate(
    State(state): State<ShutdownState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.is_draining() {
        return next.run(req).await;
    }

    tracing::debug!(method = %req.method(), path = %req.uri().path(), "Rejected during shutdown");
    metrics::record_rejected_request();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONNECTION, "close")],
        Json(json!({ "error": "Service is shutting down" })),
    )
        .into_response()
}

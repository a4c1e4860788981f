//! Health check handlers for liveness and readiness probes.
//!
//! The readiness probe reports connectivity to both collaborators (database
//! and routing service); probe failures are reported, never propagated.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: "ok" or "degraded".
    pub status: String,

    /// Service name for identification.
    pub service: String,

    /// Service version from build-time.
    pub version: String,

    /// Whether the calculation database answered (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_connected: Option<bool>,

    /// Whether the routing service answered the probe route (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_connected: Option<bool>,
}

impl HealthStatus {
    /// Create a healthy liveness status.
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            database_connected: None,
            routing_connected: None,
        }
    }

    /// Create a readiness status from the two connectivity checks.
    pub fn ready(service: &str, version: &str, database: bool, routing: bool) -> Self {
        Self {
            status: if database && routing { "ok" } else { "degraded" }.to_string(),
            service: service.to_string(),
            version: version.to_string(),
            database_connected: Some(database),
            routing_connected: Some(routing),
        }
    }
}

/// Liveness probe handler.
///
/// Returns 200 OK if the service is running; does not touch external
/// resources.
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Checks the calculation database and the routing service; returns 503 when
/// either collaborator is down.
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let store = state.store();
    let routing = state.routing();

    let (database_connected, routing_connected) =
        tokio::task::spawn_blocking(move || (store.ping(), routing.check_availability()))
            .await
            .unwrap_or((false, false));

    let status = HealthStatus::ready(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        database_connected,
        routing_connected,
    );

    let code = if database_connected && routing_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status)).into_response()
}

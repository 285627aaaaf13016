use crate::{db, handlers::AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Liveness plus a database ping; 503 when the database does not answer.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match db::check_connection(&state.db).await {
        Ok(latency) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: ComponentStatus::Up,
                timestamp,
                latency_ms: Some(latency.as_millis() as u64),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: ComponentStatus::Down,
                    timestamp,
                    latency_ms: None,
                }),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "Health",
    responses((status = 200, description = "Version, environment and uptime"))
)]
pub async fn api_status(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "service": "shopfront-api",
        "version": env!("CARGO_PKG_VERSION"),
        "gitHash": env!("GIT_HASH"),
        "builtAt": env!("BUILD_TIME"),
        "environment": state.config.environment,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

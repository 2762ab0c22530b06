use axum::Json;
use serde::Serialize;

pub const HEALTH_MESSAGE: &str = "Gemini relay server is running";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

/// Liveness check. Answers even when the relay is unconfigured.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: HEALTH_MESSAGE,
    })
}

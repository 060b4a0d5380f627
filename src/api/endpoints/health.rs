//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub prediction_service: &'static str,
}

/// `GET /api/health`: liveness plus prediction service reachability.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    let prediction_service = match ctx.core.predictor().health().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::debug!("Prediction health check failed: {e}");
            "down"
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        prediction_service,
    })
}

//! Health Route

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::warn;

use crate::schemas::HealthResponse;
use crate::AppState;

/// Report whether the model is resident, loading it if needed
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    if state.model.is_loaded() {
        return (StatusCode::OK, Json(HealthResponse::healthy()));
    }

    match state.model.load_model().await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse::healthy())),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse::unhealthy()))
        }
    }
}

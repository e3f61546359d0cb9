//! Prometheus exposition

use axum::extract::State;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// Render collected metrics; 404 when no recorder was installed
pub async fn render(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(ApiError::NotFound)
}

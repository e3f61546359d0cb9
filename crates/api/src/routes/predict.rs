//! Prediction Route

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use image_preprocessing::{preprocess_image, validate_image_format, validate_image_size};
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::schemas::PredictionResponse;
use crate::AppState;

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Classify an uploaded image
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    handle_predict(state, multipart)
        .instrument(info_span!("predict", %request_id))
        .await
}

async fn handle_predict(
    state: Arc<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Not a multipart upload: {}", e);
        ApiError::MissingImage
    })?;

    let image_bytes = read_image_field(&mut multipart, &state.settings.allowed_extensions)
        .await?
        .ok_or(ApiError::MissingImage)?;

    let max_size = state.settings.max_image_size;
    if !validate_image_size(&image_bytes, max_size) {
        return Err(ApiError::ImageTooLarge(max_size));
    }

    let target = state.settings.image_size;
    let tensor = tokio::task::spawn_blocking(move || preprocess_image(&image_bytes, target))
        .await
        .map_err(|e| ApiError::Internal(format!("preprocessing task failed: {}", e)))??;

    let outcome = state.model.predict(tensor).await?;
    let prediction = outcome.prediction;

    metrics::counter!("predictions_total", "class" => prediction.label.clone()).increment(1);
    metrics::histogram!("prediction_latency_seconds").record(outcome.latency_ms as f64 / 1000.0);
    info!(
        "Predicted {} (conf={:.4}, latency={}ms)",
        prediction.label, prediction.confidence, outcome.latency_ms
    );

    Ok(Json(PredictionResponse::new(prediction)))
}

/// Find the `image` field, check its filename and read its bytes.
///
/// Returns `None` when the form has no `image` field.
async fn read_image_field(
    multipart: &mut Multipart,
    allowed_extensions: &[String],
) -> Result<Option<Vec<u8>>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::InvalidImage("Empty filename".to_string()));
        }
        if !validate_image_format(&filename, allowed_extensions) {
            return Err(ApiError::InvalidImageFormat(allowed_extensions.to_vec()));
        }

        debug!("Reading upload {}", filename);
        return read_bytes(field).await.map(Some);
    }

    Ok(None)
}

async fn read_bytes(field: Field<'_>) -> Result<Vec<u8>, ApiError> {
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(bytes.to_vec())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::FileTooLarge
    } else {
        ApiError::InvalidImage(err.body_text())
    }
}

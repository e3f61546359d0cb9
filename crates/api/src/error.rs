//! API error type and JSON error envelope mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use image_preprocessing::PreprocessError;
use inference_engine::InferenceError;
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::ErrorEnvelope;

/// Message returned to clients for server-side failures
const INTERNAL_MESSAGE: &str = "Internal server error";
const PREDICTION_MESSAGE: &str = "Failed to generate prediction";

/// Every failure a request can end in
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image file provided")]
    MissingImage,

    #[error("{0}")]
    InvalidImage(String),

    #[error("Invalid file format. Allowed: {}", .0.join(", "))]
    InvalidImageFormat(Vec<String>),

    #[error("Image too large. Max size: {0} bytes")]
    ImageTooLarge(usize),

    #[error("File too large")]
    FileTooLarge,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    ModelNotFound(String),

    #[error("{0}")]
    ModelLoad(String),

    #[error("{0}")]
    IncompatibleModel(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage
            | ApiError::InvalidImage(_)
            | ApiError::InvalidImageFormat(_)
            | ApiError::ImageTooLarge(_)
            | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelNotFound(_) | ApiError::ModelLoad(_) | ApiError::IncompatibleModel(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Prediction(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "MISSING_IMAGE",
            ApiError::InvalidImage(_) => "INVALID_IMAGE",
            ApiError::InvalidImageFormat(_) => "INVALID_IMAGE_FORMAT",
            ApiError::ImageTooLarge(_) => "IMAGE_TOO_LARGE",
            ApiError::FileTooLarge => "FILE_TOO_LARGE",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::ModelNotFound(_) => "MODEL_NOT_FOUND",
            ApiError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            ApiError::IncompatibleModel(_) => "INCOMPATIBLE_MODEL",
            ApiError::Prediction(_) => "PREDICTION_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    /// Message safe to show the caller; server-side details stay in the logs
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Prediction(_) => PREDICTION_MESSAGE.to_string(),
            ApiError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            error!(code, "Request failed: {}", self);
        } else {
            warn!(code, "Request rejected: {}", self);
        }
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        (status, Json(ErrorEnvelope::new(self.client_message(), code))).into_response()
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ModelNotFound(_) => ApiError::ModelNotFound(err.to_string()),
            InferenceError::ModelLoadError(_) | InferenceError::UnsupportedDevice(_) => {
                ApiError::ModelLoad(err.to_string())
            }
            InferenceError::IncompatibleModel(_) => ApiError::IncompatibleModel(err.to_string()),
            InferenceError::InvalidInputShape { .. } => ApiError::InvalidInput(err.to_string()),
            InferenceError::InvalidOutput(_) => ApiError::Prediction(err.to_string()),
            InferenceError::InferenceFailed(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<PreprocessError> for ApiError {
    fn from(err: PreprocessError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

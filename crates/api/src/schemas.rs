//! Response bodies

use inference_engine::Prediction;
use serde::Serialize;

/// Service name reported by the health check
pub const SERVICE_NAME: &str = "ocular-disease-classification-api";

/// Health response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub model_loaded: bool,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            model_loaded: true,
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            status: "unhealthy".to_string(),
            service: SERVICE_NAME.to_string(),
            model_loaded: false,
        }
    }
}

/// Successful prediction response
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub prediction: Prediction,
}

impl PredictionResponse {
    pub fn new(prediction: Prediction) -> Self {
        Self {
            success: true,
            prediction,
        }
    }
}

/// Error envelope for every non-2xx response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                message: message.into(),
                code: code.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let value = serde_json::to_value(ErrorEnvelope::new("No image file provided", "MISSING_IMAGE")).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": {"message": "No image file provided", "code": "MISSING_IMAGE"}
            })
        );
    }

    #[test]
    fn test_health_shape() {
        let value = serde_json::to_value(HealthResponse::unhealthy()).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "unhealthy",
                "service": "ocular-disease-classification-api",
                "model_loaded": false
            })
        );
    }

    #[test]
    fn test_prediction_response_shape() {
        let classes: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let prediction = Prediction::from_logits(&[0.0, 2.0, 0.0, 0.0], &classes).unwrap();
        let value = serde_json::to_value(PredictionResponse::new(prediction)).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["prediction"]["class"], "b");
        assert_eq!(value["prediction"]["probabilities"].as_object().unwrap().len(), 4);
    }
}

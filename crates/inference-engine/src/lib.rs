//! ONNX Inference Engine
//!
//! Holds the pretrained ocular disease classifier and runs predictions on
//! normalized image tensors using tract-onnx.

mod engine;
mod onnx;
mod prediction;

pub use engine::{Classifier, Device, EngineConfig, ModelHolder, ModelLoader, PredictionOutcome};
pub use onnx::OnnxLoader;
pub use prediction::{softmax, Prediction};

use thiserror::Error;

/// Errors during model loading and inference
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("Model file not found at {0}")]
    ModelNotFound(String),
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Incompatible model artifact: {0}")]
    IncompatibleModel(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
    #[error("Unsupported compute device: {0}")]
    UnsupportedDevice(String),
}

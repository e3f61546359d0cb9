//! Model Holder Implementation

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use image_preprocessing::TargetSize;
use ndarray::Array4;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::onnx::OnnxLoader;
use crate::prediction::Prediction;
use crate::InferenceError;

/// Compute device the model is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Host CPU (the only backend tract executes on)
    #[default]
    Cpu,
}

impl Device {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            other => Err(InferenceError::UnsupportedDevice(other.to_string())),
        }
    }
}

/// Settings the holder needs to load and run the classifier
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the serialized model artifact
    pub model_path: PathBuf,
    /// Device the model runs on
    pub device: Device,
    /// Ordered class labels, one per model output
    pub class_names: Vec<String>,
    /// Spatial input size
    pub input_size: TargetSize,
}

impl EngineConfig {
    /// Expected input tensor shape `(1, 3, H, W)`
    pub fn input_shape(&self) -> [usize; 4] {
        self.input_size.tensor_shape()
    }
}

/// A loaded network that maps an input tensor to raw class scores
pub trait Classifier: Send + Sync {
    /// Run a forward pass, returning one logit per class
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Turns a model artifact on disk into a runnable [`Classifier`]
pub trait ModelLoader: Send + Sync {
    /// Deserialize the artifact at `config.model_path`
    fn load(&self, config: &EngineConfig) -> Result<Arc<dyn Classifier>, InferenceError>;
}

/// Result of a prediction call
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    /// The prediction
    pub prediction: Prediction,
    /// Inference latency in milliseconds, including any on-demand load
    pub latency_ms: u64,
}

/// Owns the classifier for the lifetime of the process.
///
/// The model is loaded lazily on first use and never reloaded. Concurrent
/// first callers queue on the slot so exactly one load runs; a failed load
/// leaves the slot empty and the next caller retries.
pub struct ModelHolder {
    config: Arc<EngineConfig>,
    loader: Arc<dyn ModelLoader>,
    model: OnceCell<Arc<dyn Classifier>>,
}

impl ModelHolder {
    /// Create a holder that loads ONNX artifacts with tract
    pub fn new(config: EngineConfig) -> Self {
        Self::with_loader(config, Arc::new(OnnxLoader))
    }

    /// Create a holder with a custom loader
    pub fn with_loader(config: EngineConfig, loader: Arc<dyn ModelLoader>) -> Self {
        info!(
            "Creating model holder: path={}, device={}, classes={}",
            config.model_path.display(),
            config.device,
            config.class_names.len()
        );
        Self {
            config: Arc::new(config),
            loader,
            model: OnceCell::new(),
        }
    }

    /// Check if the model is resident in memory
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Holder configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the model, or return the resident instance if already loaded
    pub async fn load_model(&self) -> Result<Arc<dyn Classifier>, InferenceError> {
        let model = self.model.get_or_try_init(|| self.load_from_disk()).await?;
        Ok(Arc::clone(model))
    }

    async fn load_from_disk(&self) -> Result<Arc<dyn Classifier>, InferenceError> {
        let path = self.config.model_path.clone();
        if !path.exists() {
            error!("Model file not found at {}", path.display());
            return Err(InferenceError::ModelNotFound(path.display().to_string()));
        }

        let loader = Arc::clone(&self.loader);
        let config = Arc::clone(&self.config);
        let result = tokio::task::spawn_blocking(move || loader.load(&config))
            .await
            .map_err(|e| InferenceError::ModelLoadError(format!("load task failed: {}", e)))
            .and_then(|loaded| loaded);

        match &result {
            Ok(_) => info!(
                "Model loaded successfully from {} on {}",
                path.display(),
                self.config.device
            ),
            Err(e) => error!("Error loading model: {}", e),
        }

        result
    }

    /// Classify a normalized `(1, 3, H, W)` tensor, loading the model on demand
    pub async fn predict(&self, input: Array4<f32>) -> Result<PredictionOutcome, InferenceError> {
        let start = std::time::Instant::now();

        let expected = self.config.input_shape();
        if input.shape() != &expected[..] {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", input.shape()),
            });
        }

        let model = self.load_model().await?;

        let logits = tokio::task::spawn_blocking(move || model.forward(&input))
            .await
            .map_err(|e| InferenceError::InferenceFailed(format!("forward task failed: {}", e)))??;

        let prediction = Prediction::from_logits(&logits, &self.config.class_names)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Prediction: {} (conf={:.4}, latency={}ms)",
            prediction.label, prediction.confidence, latency_ms
        );

        Ok(PredictionOutcome {
            prediction,
            latency_ms,
        })
    }
}

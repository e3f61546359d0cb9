//! tract-onnx backed classifier

use std::sync::Arc;

use ndarray::Array4;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::engine::{Classifier, EngineConfig, ModelLoader};
use crate::InferenceError;

/// Loads ONNX classifiers and optimizes them into runnable tract plans
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxLoader;

impl ModelLoader for OnnxLoader {
    fn load(&self, config: &EngineConfig) -> Result<Arc<dyn Classifier>, InferenceError> {
        let path = &config.model_path;
        let input_shape = config.input_shape();
        info!("Loading ONNX model from {} with input {:?}", path.display(), input_shape);

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| {
                InferenceError::IncompatibleModel(format!(
                    "{} is not a valid ONNX model: {}",
                    path.display(),
                    e
                ))
            })?
            .with_input_fact(0, f32::fact(input_shape).into())
            .map_err(|e| InferenceError::IncompatibleModel(e.to_string()))?;

        let optimized = model
            .into_optimized()
            .map_err(|e| InferenceError::ModelLoadError(e.to_string()))?;

        check_output_width(&optimized, config.class_names.len())?;

        let plan = optimized
            .into_runnable()
            .map_err(|e| InferenceError::ModelLoadError(e.to_string()))?;

        debug!("ONNX plan ready on {}", config.device);

        Ok(Arc::new(OnnxClassifier { plan, input_shape }))
    }
}

/// Reject graphs whose first output cannot hold one score per class
fn check_output_width(model: &TypedModel, num_classes: usize) -> Result<(), InferenceError> {
    let fact = model
        .output_fact(0)
        .map_err(|e| InferenceError::IncompatibleModel(e.to_string()))?;

    if let Some(dims) = fact.shape.as_concrete() {
        let width: usize = dims.iter().product();
        if width != num_classes {
            return Err(InferenceError::IncompatibleModel(format!(
                "output shape {:?} does not match {} classes",
                dims, num_classes
            )));
        }
    }

    Ok(())
}

struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    input_shape: [usize; 4],
}

impl Classifier for OnnxClassifier {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let contiguous = input.as_standard_layout();
        let data = contiguous.as_slice().ok_or_else(|| {
            InferenceError::InferenceFailed("input tensor is not contiguous".to_string())
        })?;

        let tensor = Tensor::from_shape(&self.input_shape, data)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let scores = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        Ok(scores.iter().copied().collect())
    }
}

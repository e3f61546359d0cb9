//! Prediction shaping from raw model scores

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::InferenceError;

/// Classification result for a single image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted class label
    #[serde(rename = "class")]
    pub label: String,
    /// Probability of the predicted class, rounded to 4 decimals
    pub confidence: f64,
    /// Probability per class, in configured label order
    #[serde(serialize_with = "serialize_ordered")]
    pub probabilities: Vec<(String, f64)>,
}

impl Prediction {
    /// Build a prediction from raw logits.
    ///
    /// `logits` must hold one finite score per entry of `class_names`.
    pub fn from_logits(logits: &[f32], class_names: &[String]) -> Result<Self, InferenceError> {
        if logits.len() != class_names.len() {
            return Err(InferenceError::InvalidOutput(format!(
                "model returned {} scores for {} classes",
                logits.len(),
                class_names.len()
            )));
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::InvalidOutput(
                "model returned non-finite scores".to_string(),
            ));
        }

        let probs = softmax(logits);
        let best = argmax(&probs);

        Ok(Self {
            label: class_names[best].clone(),
            confidence: round4(probs[best]),
            probabilities: class_names.iter().cloned().zip(probs).collect(),
        })
    }

    /// Probability recorded for `label`
    pub fn probability(&self, label: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, p)| *p)
    }
}

/// Numerically stable softmax over raw scores
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64));
    let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; first one wins on ties
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_idx, best), (idx, &v)| {
            if v > best {
                (idx, v)
            } else {
                (best_idx, best)
            }
        })
        .0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn serialize_ordered<S: Serializer>(pairs: &[(String, f64)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (label, prob) in pairs {
        map.serialize_entry(label, prob)?;
    }
    map.end()
}

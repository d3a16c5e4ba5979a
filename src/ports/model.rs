//! Model ports: Traits for the two inference backends.
//!
//! Implementations must be reentrant for read-only evaluation. The
//! registry shares a single instance across concurrent requests without a
//! lock, which the `Send + Sync` bounds make explicit.

use crate::domain::{ConditionedSignal, FeatureVector};

/// Error raised by a model call itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("Input shape mismatch: {0}")]
    Shape(String),

    #[error("Model produced a non-finite output")]
    NonFinite,

    #[error("Model evaluation failed: {0}")]
    Evaluation(String),
}

/// Which of the two served models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Gradient-boosted stroke risk classifier
    Stroke,
    /// Recurrent AFib detector
    Afib,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stroke => write!(f, "stroke"),
            Self::Afib => write!(f, "afib"),
        }
    }
}

/// Tree-ensemble classifier over the tabular feature vector.
pub trait TabularModel: Send + Sync {
    /// Positive-class probability for one record.
    ///
    /// # Errors
    /// Returns `InferenceError` if evaluation fails.
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, InferenceError>;

    /// Short backend identifier for logs and status.
    fn backend(&self) -> &str;
}

/// Raw output of the sequence model's forward pass.
///
/// Carries whether the final layer already applied a sigmoid so callers
/// squash exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequenceOutput {
    Logit(f64),
    Probability(f64),
}

impl SequenceOutput {
    /// Map to a probability, applying the logistic function only to logits.
    #[must_use]
    pub fn probability(self) -> f64 {
        match self {
            Self::Logit(z) => sigmoid(z),
            Self::Probability(p) => p,
        }
    }
}

/// Recurrent classifier over a conditioned `(1, steps, 1)` signal.
pub trait SequenceModel: Send + Sync {
    /// Run one inference-only forward pass.
    ///
    /// # Errors
    /// Returns `InferenceError` if evaluation fails.
    fn forward(&self, signal: &ConditionedSignal) -> Result<SequenceOutput, InferenceError>;

    fn backend(&self) -> &str;
}

/// Logistic function.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 0.0001);
    }

    #[test]
    fn test_sequence_output_squashes_once() {
        assert!((SequenceOutput::Logit(0.0).probability() - 0.5).abs() < f64::EPSILON);
        assert!((SequenceOutput::Probability(0.8).probability() - 0.8).abs() < f64::EPSILON);
    }
}

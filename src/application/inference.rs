//! Inference service: Routes requests to the right model.
//!
//! Each dispatch runs the same pipeline:
//! 1. Resolve the model from the registry (loading it on first use)
//! 2. Validate and preprocess the request (encode / condition)
//! 3. Run the model
//! 4. Threshold the probability and format the result
//!
//! Raw clinical values never reach a log call; only the resulting category
//! and probability are logged.

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::domain::{
    assess, condition, encode, ClinicalRecord, PredictionResult, RawSignal, TiaRequest,
    TriageAssessment,
};
use crate::ports::{InferenceError, ModelKind, SequenceModel, TabularModel};
use crate::{ModelRegistry, Result, StrokeGuardError};

/// Caller-facing text when inference detail is hidden.
const GENERIC_INFERENCE_MESSAGE: &str = "model evaluation failed";

/// Service entry point for stroke prediction, AFib detection and TIA triage.
///
/// Holds no per-request state, so one instance serves concurrent callers.
pub struct InferenceService {
    registry: Arc<ModelRegistry>,
    config: DispatchConfig,
}

impl InferenceService {
    pub fn new(registry: Arc<ModelRegistry>, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Predict stroke risk for one clinical record.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the stroke model did not load, a client
    /// error for an invalid record, or `Inference` if evaluation fails.
    pub fn dispatch_tabular(&self, record: &ClinicalRecord) -> Result<PredictionResult> {
        let model = self
            .registry
            .tabular_model()
            .ok_or(StrokeGuardError::ModelUnavailable(ModelKind::Stroke))?;

        tracing::debug!("Step 1: Encoding clinical record...");
        let features = encode(record)?;

        tracing::debug!("Step 2: Evaluating {} model...", model.backend());
        let probability = model
            .predict_proba(&features)
            .and_then(checked_probability)
            .map_err(|e| self.inference_failure(ModelKind::Stroke, &e))?;

        let result = PredictionResult::stroke(probability);
        tracing::info!(
            "Stroke prediction complete: category={}, probability={:.4}",
            result.category,
            probability
        );
        Ok(result)
    }

    /// Detect atrial fibrillation in one ECG series.
    ///
    /// Requests longer than `max_signal_len` are refused before any
    /// conditioning work is done.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if the AFib model did not load,
    /// `EmptySignal` / `SignalTooLong` for unusable input, or `Inference` if
    /// evaluation fails.
    pub fn dispatch_sequence(&self, signal: &RawSignal) -> Result<PredictionResult> {
        let model = self
            .registry
            .sequence_model()
            .ok_or(StrokeGuardError::ModelUnavailable(ModelKind::Afib))?;

        let max = self.config.max_signal_len;
        if signal.len() > max {
            return Err(StrokeGuardError::SignalTooLong {
                len: signal.len(),
                max,
            });
        }

        tracing::debug!("Step 1: Conditioning {} samples...", signal.len());
        let conditioned = condition(signal)?;

        tracing::debug!("Step 2: Evaluating {} model...", model.backend());
        let probability = model
            .forward(&conditioned)
            .map(|output| output.probability())
            .and_then(checked_probability)
            .map_err(|e| self.inference_failure(ModelKind::Afib, &e))?;

        let result = PredictionResult::rhythm(probability);
        tracing::info!(
            "AFib detection complete: category={}, probability={:.4}",
            result.category,
            probability
        );
        Ok(result)
    }

    /// Triage reported TIA symptoms. Needs no model.
    ///
    /// # Errors
    /// Returns `Validation` if the duration is negative or not finite.
    pub fn assess_tia(&self, request: &TiaRequest) -> Result<TriageAssessment> {
        request.validate().map_err(StrokeGuardError::Validation)?;

        let assessment = assess(&request.symptoms, request.symptom_duration_hours);
        tracing::info!(
            "TIA triage complete: alert_level={}, matched={}",
            assessment.alert_level,
            assessment.matched_symptoms.len()
        );
        Ok(assessment)
    }

    fn inference_failure(&self, kind: ModelKind, cause: &InferenceError) -> StrokeGuardError {
        tracing::error!("{kind} model evaluation failed: {cause}");
        if self.config.expose_error_detail {
            StrokeGuardError::Inference(cause.to_string())
        } else {
            StrokeGuardError::Inference(GENERIC_INFERENCE_MESSAGE.to_string())
        }
    }
}

fn checked_probability(p: f64) -> std::result::Result<f64, InferenceError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(InferenceError::Evaluation(format!(
            "probability {p} outside [0, 1]"
        )))
    }
}

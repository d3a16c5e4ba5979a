//! # StrokeGuard
//!
//! Stroke-risk and atrial-fibrillation inference service.
//!
//! This crate provides:
//! - Tabular stroke-risk prediction from a clinical record (gradient-boosted trees)
//! - AFib detection from a single-lead ECG series (two-layer LSTM)
//! - Rule-based TIA symptom triage
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Clinical records, feature encoding, signal conditioning, triage rules
//! - `ports`: Model traits (`TabularModel`, `SequenceModel`)
//! - `adapters`: Native XGBoost-JSON and LSTM evaluators, artifact integrity, log sanitizing
//! - `application`: Model registry and inference dispatcher
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{InferenceService, ModelRegistry, RegistryStatus};
pub use domain::{ClinicalRecord, PredictionResult, RawSignal, TiaRequest, TriageAssessment};

use adapters::ModelLoadError;
use domain::{EncodeError, SignalError};
use ports::ModelKind;

/// Result type for StrokeGuard operations
pub type Result<T> = std::result::Result<T, StrokeGuardError>;

/// Main error type for StrokeGuard
#[derive(Debug, thiserror::Error)]
pub enum StrokeGuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model load failed: {0}")]
    ModelLoad(#[from] ModelLoadError),

    #[error("Invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unknown {field} value: {value:?}")]
    UnknownCategory { field: &'static str, value: String },

    #[error("Signal is empty")]
    EmptySignal,

    #[error("Signal has {len} samples, maximum is {max}")]
    SignalTooLong { len: usize, max: usize },

    #[error("The {0} model is not available")]
    ModelUnavailable(ModelKind),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StrokeGuardError {
    /// Whether the caller sent something unusable, as opposed to a service fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnknownCategory { .. }
                | Self::EmptySignal
                | Self::SignalTooLong { .. }
                | Self::Serialization(_)
        )
    }

    /// Process exit status for the CLI: 3 model unavailable, 2 bad request,
    /// 1 any other fault.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ModelUnavailable(_) => 3,
            e if e.is_client_error() => 2,
            _ => 1,
        }
    }
}

impl From<EncodeError> for StrokeGuardError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::Validation(messages) => Self::Validation(messages),
            EncodeError::UnknownCategory { field, value } => Self::UnknownCategory { field, value },
        }
    }
}

impl From<SignalError> for StrokeGuardError {
    fn from(e: SignalError) -> Self {
        match e {
            SignalError::Empty => Self::EmptySignal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(StrokeGuardError::EmptySignal.is_client_error());
        assert!(StrokeGuardError::Validation(vec!["age".into()]).is_client_error());
        assert!(!StrokeGuardError::ModelUnavailable(ModelKind::Stroke).is_client_error());
        assert!(!StrokeGuardError::Inference("x".into()).is_client_error());
    }

    #[test]
    fn test_component_errors_convert() {
        let e: StrokeGuardError = EncodeError::UnknownCategory {
            field: "gender",
            value: "robot".into(),
        }
        .into();
        assert_eq!(e.to_string(), "Unknown gender value: \"robot\"");

        let e: StrokeGuardError = SignalError::Empty.into();
        assert!(matches!(e, StrokeGuardError::EmptySignal));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(StrokeGuardError::ModelUnavailable(ModelKind::Afib).exit_code(), 3);
        assert_eq!(StrokeGuardError::EmptySignal.exit_code(), 2);
        assert_eq!(
            StrokeGuardError::SignalTooLong { len: 11, max: 10 }.exit_code(),
            2
        );
        assert_eq!(
            StrokeGuardError::UnknownCategory {
                field: "gender",
                value: "robot".into(),
            }
            .exit_code(),
            2
        );
        let bad_json = serde_json::from_str::<serde_json::Value>("{").expect_err("malformed");
        assert_eq!(StrokeGuardError::from(bad_json).exit_code(), 2);

        assert_eq!(StrokeGuardError::Inference("x".into()).exit_code(), 1);
        assert_eq!(StrokeGuardError::Config("x".into()).exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(StrokeGuardError::from(io).exit_code(), 1);
    }

    #[test]
    fn test_validation_lists_every_message() {
        let e = StrokeGuardError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(e.to_string(), "Invalid input: a; b");
    }
}

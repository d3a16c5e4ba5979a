//! Domain layer: Core types and pure transformations.
//!
//! Nothing here performs I/O. Encoding, conditioning, thresholding and
//! triage are pure functions of their inputs.

pub mod clinical;
pub mod features;
mod prediction;
pub mod signal;
pub mod triage;

pub use clinical::ClinicalRecord;
pub use features::{encode, EncodeError, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use prediction::{format_percentage, Category, PredictionResult, AFIB_THRESHOLD, STROKE_THRESHOLD};
pub use signal::{condition, AfibRequest, ConditionedSignal, RawSignal, SignalError, SEQUENCE_LEN};
pub use triage::{assess, AlertLevel, TiaRequest, TriageAssessment};

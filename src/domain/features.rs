//! Tabular feature encoding for the stroke tree-ensemble model.
//!
//! The model was trained on a pandas frame and evaluates features purely by
//! position, so the column order below is part of the model contract.

use serde::Serialize;

use super::clinical::{
    Category, ClinicalRecord, Gender, MaritalHistory, ResidenceType, SmokingStatus, WorkType,
};

/// Number of columns the stroke model was trained on.
pub const FEATURE_COUNT: usize = 17;

/// Training-time column names, in model order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "ever_married",
    "Residence_type",
    "avg_glucose_level",
    "bmi",
    "work_type_Govt_job",
    "work_type_Never_worked",
    "work_type_Private",
    "work_type_Self-employed",
    "work_type_children",
    "smoking_status_Unknown",
    "smoking_status_formerly smoked",
    "smoking_status_never smoked",
    "smoking_status_smokes",
];

const WORK_TYPE_OFFSET: usize = 8;
const SMOKING_OFFSET: usize = WORK_TYPE_OFFSET + WorkType::MEMBERS.len();

/// Encoding failures. Both are client-side errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid clinical record: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unrecognized {field} value {value:?}")]
    UnknownCategory { field: &'static str, value: String },
}

/// Position-significant feature vector consumed by the tabular model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Look up a value by its training-time column name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    /// The work-type one-hot group.
    #[must_use]
    pub fn work_type_group(&self) -> &[f64] {
        &self.0[WORK_TYPE_OFFSET..SMOKING_OFFSET]
    }

    /// The smoking-status one-hot group.
    #[must_use]
    pub fn smoking_group(&self) -> &[f64] {
        &self.0[SMOKING_OFFSET..]
    }
}

fn parse_category<C: Category>(raw: &str) -> Result<C, EncodeError> {
    C::parse(raw).ok_or_else(|| EncodeError::UnknownCategory {
        field: C::FIELD,
        value: raw.to_string(),
    })
}

fn one_hot_index<C: Category + PartialEq>(member: C) -> usize {
    C::MEMBERS
        .iter()
        .position(|(m, _)| *m == member)
        .unwrap_or_default()
}

/// Encode a clinical record into the model's feature vector.
///
/// # Errors
/// Returns `EncodeError::Validation` for malformed numeric fields and
/// `EncodeError::UnknownCategory` for categorical text outside the closed sets.
pub fn encode(record: &ClinicalRecord) -> Result<FeatureVector, EncodeError> {
    record.validate().map_err(EncodeError::Validation)?;

    let gender: Gender = parse_category(&record.gender)?;
    let married: MaritalHistory = parse_category(&record.ever_married)?;
    let residence: ResidenceType = parse_category(&record.residence_type)?;
    let work: WorkType = parse_category(&record.work_type)?;
    let smoking: SmokingStatus = parse_category(&record.smoking_status)?;

    let mut v = [0.0; FEATURE_COUNT];
    v[0] = gender.code();
    v[1] = record.age;
    v[2] = record.hypertension as f64;
    v[3] = record.heart_disease as f64;
    v[4] = if married == MaritalHistory::Married { 1.0 } else { 0.0 };
    v[5] = if residence == ResidenceType::Urban { 1.0 } else { 0.0 };
    v[6] = record.avg_glucose_level;
    v[7] = record.bmi;
    v[WORK_TYPE_OFFSET + one_hot_index(work)] = 1.0;
    v[SMOKING_OFFSET + one_hot_index(smoking)] = 1.0;

    Ok(FeatureVector(v))
}

//! Clinical record input for stroke risk prediction.
//!
//! Based on the Kaggle stroke-prediction dataset schema. Enumerated fields
//! arrive as loosely-typed form text and are normalized into closed sets
//! before encoding.

use serde::{Deserialize, Serialize};

/// Raw clinical record as received from the boundary layer.
///
/// Numeric fields are already numbers; categorical fields are free text
/// that must normalize to one of the closed sets below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalRecord {
    /// "Male", "Female" or "Other"
    pub gender: String,

    /// Age in years
    pub age: f64,

    /// Hypertension: 0 = no, 1 = yes
    pub hypertension: i64,

    /// Heart disease: 0 = no, 1 = yes
    pub heart_disease: i64,

    /// "Yes" or "No"
    pub ever_married: String,

    /// "Private", "Self-employed", "Govt_job", "children", "Never_worked"
    pub work_type: String,

    /// "Urban" or "Rural"
    pub residence_type: String,

    /// Average glucose level in mg/dL
    pub avg_glucose_level: f64,

    /// Body mass index
    pub bmi: f64,

    /// "formerly smoked", "never smoked", "smokes", "Unknown"
    pub smoking_status: String,
}

impl ClinicalRecord {
    /// Validate the numeric fields.
    ///
    /// # Errors
    /// Returns every violation found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.age.is_finite() || self.age < 0.0 {
            errors.push(format!("Age {} must be a non-negative number", self.age));
        }
        if !matches!(self.hypertension, 0 | 1) {
            errors.push(format!("Hypertension {} must be 0 or 1", self.hypertension));
        }
        if !matches!(self.heart_disease, 0 | 1) {
            errors.push(format!(
                "Heart disease {} must be 0 or 1",
                self.heart_disease
            ));
        }
        if !self.avg_glucose_level.is_finite() || self.avg_glucose_level <= 0.0 {
            errors.push(format!(
                "Average glucose level {} must be a positive number",
                self.avg_glucose_level
            ));
        }
        if !self.bmi.is_finite() || self.bmi <= 0.0 {
            errors.push(format!("BMI {} must be a positive number", self.bmi));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Canonical matching key: trimmed, ASCII-lowercased, with runs of
/// `-`, `_` and whitespace collapsed into a single `_`.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Closed categorical sets whose values can be parsed from form text.
pub trait Category: Sized + Copy + 'static {
    /// Wire name of the field, used in error reports.
    const FIELD: &'static str;

    /// Every member paired with its training-time spelling, in one-hot
    /// (alphabetical) column order.
    const MEMBERS: &'static [(Self, &'static str)];

    /// Parse free text into a member.
    fn parse(raw: &str) -> Option<Self> {
        let key = normalize_key(raw);
        Self::MEMBERS
            .iter()
            .find(|(_, label)| normalize_key(label) == key)
            .map(|(member, _)| *member)
    }
}

/// Gender, label-encoded at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Category for Gender {
    const FIELD: &'static str = "gender";
    const MEMBERS: &'static [(Self, &'static str)] = &[
        (Self::Male, "Male"),
        (Self::Female, "Female"),
        (Self::Other, "Other"),
    ];
}

impl Gender {
    /// Ordinal code used by the training label encoder.
    #[must_use]
    pub fn code(self) -> f64 {
        match self {
            Self::Male => 0.0,
            Self::Female => 1.0,
            Self::Other => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaritalHistory {
    Married,
    NeverMarried,
}

impl Category for MaritalHistory {
    const FIELD: &'static str = "ever_married";
    const MEMBERS: &'static [(Self, &'static str)] =
        &[(Self::Married, "Yes"), (Self::NeverMarried, "No")];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidenceType {
    Urban,
    Rural,
}

impl Category for ResidenceType {
    const FIELD: &'static str = "residence_type";
    const MEMBERS: &'static [(Self, &'static str)] =
        &[(Self::Urban, "Urban"), (Self::Rural, "Rural")];
}

/// Work type, one-hot encoded in alphabetical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkType {
    GovtJob,
    NeverWorked,
    Private,
    SelfEmployed,
    Children,
}

impl Category for WorkType {
    const FIELD: &'static str = "work_type";
    const MEMBERS: &'static [(Self, &'static str)] = &[
        (Self::GovtJob, "Govt_job"),
        (Self::NeverWorked, "Never_worked"),
        (Self::Private, "Private"),
        (Self::SelfEmployed, "Self-employed"),
        (Self::Children, "children"),
    ];
}

/// Smoking status, one-hot encoded in alphabetical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmokingStatus {
    Unknown,
    FormerlySmoked,
    NeverSmoked,
    Smokes,
}

impl Category for SmokingStatus {
    const FIELD: &'static str = "smoking_status";
    const MEMBERS: &'static [(Self, &'static str)] = &[
        (Self::Unknown, "Unknown"),
        (Self::FormerlySmoked, "formerly smoked"),
        (Self::NeverSmoked, "never smoked"),
        (Self::Smokes, "smokes"),
    ];
}

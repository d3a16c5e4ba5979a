//! Prediction result types.
//!
//! Converts a model probability into a decision category and a display
//! percentage.

use serde::{Deserialize, Serialize};

/// Stroke risk cut-off. Deliberately below 0.5 to favour recall.
pub const STROKE_THRESHOLD: f64 = 0.4;

/// AFib decision cut-off.
pub const AFIB_THRESHOLD: f64 = 0.5;

/// Decision category for either model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "High Risk")]
    HighRisk,
    #[serde(rename = "Normal Sinus Rhythm")]
    NormalSinusRhythm,
    #[serde(rename = "Atrial Fibrillation Detected")]
    AtrialFibrillation,
}

impl Category {
    /// Stroke decision: high risk only when strictly above the threshold.
    #[must_use]
    pub fn stroke(probability: f64) -> Self {
        if probability > STROKE_THRESHOLD {
            Self::HighRisk
        } else {
            Self::LowRisk
        }
    }

    /// Rhythm decision: AFib only when strictly above the threshold.
    #[must_use]
    pub fn rhythm(probability: f64) -> Self {
        if probability > AFIB_THRESHOLD {
            Self::AtrialFibrillation
        } else {
            Self::NormalSinusRhythm
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowRisk => write!(f, "Low Risk"),
            Self::HighRisk => write!(f, "High Risk"),
            Self::NormalSinusRhythm => write!(f, "Normal Sinus Rhythm"),
            Self::AtrialFibrillation => write!(f, "Atrial Fibrillation Detected"),
        }
    }
}

/// Model output as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Positive-class probability (0.0 to 1.0)
    pub probability: f64,

    /// Probability as a percentage string, e.g. `"42.17%"`
    pub percentage: String,

    pub category: Category,
}

impl PredictionResult {
    #[must_use]
    pub fn stroke(probability: f64) -> Self {
        Self::new(probability, Category::stroke(probability))
    }

    #[must_use]
    pub fn rhythm(probability: f64) -> Self {
        Self::new(probability, Category::rhythm(probability))
    }

    fn new(probability: f64, category: Category) -> Self {
        Self {
            probability,
            percentage: format_percentage(probability),
            category,
        }
    }
}

/// Format a probability as a percentage rounded to two decimals.
#[must_use]
pub fn format_percentage(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_threshold_is_strict() {
        assert_eq!(Category::stroke(0.4), Category::LowRisk);
        assert_eq!(Category::stroke(0.40001), Category::HighRisk);
        assert_eq!(Category::stroke(0.0), Category::LowRisk);
        assert_eq!(Category::stroke(1.0), Category::HighRisk);
    }

    #[test]
    fn test_rhythm_threshold_is_strict() {
        assert_eq!(Category::rhythm(0.5), Category::NormalSinusRhythm);
        assert_eq!(Category::rhythm(0.50001), Category::AtrialFibrillation);
    }

    #[test]
    fn test_percentage_format() {
        assert_eq!(format_percentage(0.4217), "42.17%");
        assert_eq!(format_percentage(0.5), "50.00%");
        assert_eq!(format_percentage(1.0), "100.00%");
    }

    #[test]
    fn test_category_serializes_as_label() {
        let result = PredictionResult::stroke(0.9);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["category"], "High Risk");
        assert_eq!(json["percentage"], "90.00%");
        assert_eq!(result.category.to_string(), "High Risk");
    }
}

//! Rule-based TIA/stroke symptom triage.
//!
//! Model-free. First matching rule wins, so ties resolve toward the more
//! severe level.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::clinical::normalize_key;

/// Symptoms that escalate straight to an emergency.
pub const HIGH_RISK_SYMPTOMS: [&str; 6] = [
    "face_drooping",
    "arm_weakness",
    "speech_difficulty",
    "vision_loss",
    "paralysis",
    "numbness",
];

/// Symptoms lasting longer than this need medical evaluation.
pub const EVALUATION_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Critical,
    Warning,
    Caution,
    Normal,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::Warning => write!(f, "WARNING"),
            Self::Caution => write!(f, "CAUTION"),
            Self::Normal => write!(f, "NORMAL"),
        }
    }
}

/// TIA check request from the boundary layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiaRequest {
    pub symptoms: Vec<String>,
    pub symptom_duration_hours: f64,
}

impl TiaRequest {
    /// # Errors
    /// Returns the violation message when the duration is negative or not finite.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        if self.symptom_duration_hours.is_finite() && self.symptom_duration_hours >= 0.0 {
            Ok(())
        } else {
            Err(vec![format!(
                "Symptom duration {} must be a non-negative number of hours",
                self.symptom_duration_hours
            )])
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub status: String,
    pub alert_level: AlertLevel,
    pub recommendation: String,
    #[serde(rename = "risk_factors_found")]
    pub matched_symptoms: BTreeSet<String>,
}

impl TriageAssessment {
    fn new(
        status: &str,
        alert_level: AlertLevel,
        recommendation: &str,
        matched_symptoms: BTreeSet<String>,
    ) -> Self {
        Self {
            status: status.to_string(),
            alert_level,
            recommendation: recommendation.to_string(),
            matched_symptoms,
        }
    }
}

/// Assess a symptom list and duration.
#[must_use]
pub fn assess(symptoms: &[String], duration_hours: f64) -> TriageAssessment {
    let reported: Vec<String> = symptoms
        .iter()
        .map(|s| normalize_key(s))
        .filter(|s| !s.is_empty())
        .collect();

    let matched: BTreeSet<String> = reported
        .iter()
        .filter(|s| HIGH_RISK_SYMPTOMS.contains(&s.as_str()))
        .cloned()
        .collect();

    if !matched.is_empty() {
        TriageAssessment::new(
            "High Risk (Possible TIA/Stroke)",
            AlertLevel::Critical,
            "IMMEDIATE ACTION REQUIRED: Call Emergency Services.",
            matched,
        )
    } else if duration_hours > EVALUATION_HOURS {
        TriageAssessment::new(
            "Medical Evaluation Needed",
            AlertLevel::Warning,
            "Consult a doctor.",
            matched,
        )
    } else if !reported.is_empty() {
        TriageAssessment::new(
            "Moderate Risk",
            AlertLevel::Caution,
            "Monitor symptoms closely.",
            matched,
        )
    } else {
        TriageAssessment::new(
            "Low Risk",
            AlertLevel::Normal,
            "No immediate concerns.",
            matched,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symptoms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            assess(&symptoms(&["face_drooping"]), 1.0).alert_level,
            AlertLevel::Critical
        );
        assert_eq!(assess(&[], 30.0).alert_level, AlertLevel::Warning);
        assert_eq!(
            assess(&symptoms(&["headache"]), 2.0).alert_level,
            AlertLevel::Caution
        );
        assert_eq!(assess(&[], 0.0).alert_level, AlertLevel::Normal);
    }

    #[test]
    fn test_high_risk_wins_over_duration() {
        let a = assess(&symptoms(&["headache", "numbness"]), 72.0);
        assert_eq!(a.alert_level, AlertLevel::Critical);
        assert_eq!(a.matched_symptoms.len(), 1);
        assert!(a.matched_symptoms.contains("numbness"));
    }

    #[test]
    fn test_duration_wins_over_minor_symptoms() {
        let a = assess(&symptoms(&["headache"]), 24.5);
        assert_eq!(a.alert_level, AlertLevel::Warning);
        assert_eq!(a.recommendation, "Consult a doctor.");
    }

    #[test]
    fn test_duration_boundary_is_strict() {
        assert_eq!(assess(&[], 24.0).alert_level, AlertLevel::Normal);
    }

    #[test]
    fn test_symptom_text_is_normalized() {
        let a = assess(&symptoms(&[" Face Drooping", "ARM-WEAKNESS", "arm_weakness"]), 0.0);
        assert_eq!(a.alert_level, AlertLevel::Critical);
        let found: Vec<&str> = a.matched_symptoms.iter().map(String::as_str).collect();
        assert_eq!(found, vec!["arm_weakness", "face_drooping"]);
    }

    #[test]
    fn test_blank_symptoms_are_ignored() {
        assert_eq!(assess(&symptoms(&["", "  "]), 1.0).alert_level, AlertLevel::Normal);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(assess(&symptoms(&["paralysis"]), 3.0)).expect("serialize");
        assert_eq!(json["alert_level"], "CRITICAL");
        assert_eq!(json["risk_factors_found"][0], "paralysis");
    }

    #[test]
    fn test_request_validation() {
        let ok = TiaRequest {
            symptoms: vec![],
            symptom_duration_hours: 0.0,
        };
        assert!(ok.validate().is_ok());

        let bad = TiaRequest {
            symptoms: vec![],
            symptom_duration_hours: -1.0,
        };
        assert!(bad.validate().is_err());
    }
}

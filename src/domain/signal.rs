//! ECG / heart-rate signal conditioning for the AFib sequence model.
//!
//! The recurrent model was trained on z-scored windows of exactly
//! [`SEQUENCE_LEN`] samples, shaped `(batch, steps, channels)`.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Number of time steps the sequence model consumes.
pub const SEQUENCE_LEN: usize = 1000;

/// Divisor floor for flat-line signals.
pub const STD_EPSILON: f64 = 1e-7;

/// Default request-size cap enforced by the AFib dispatcher.
pub const DEFAULT_MAX_SIGNAL_LEN: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("Signal is empty")]
    Empty,
}

/// Raw samples as submitted by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSignal(pub Vec<f64>);

impl RawSignal {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for RawSignal {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

/// AFib detection request from the boundary layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AfibRequest {
    pub signal: RawSignal,
}

/// Fixed-length normalized signal, shaped `(1, SEQUENCE_LEN, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSignal {
    tensor: Array3<f32>,
}

impl ConditionedSignal {
    #[must_use]
    pub fn tensor(&self) -> &Array3<f32> {
        &self.tensor
    }

    /// Iterate the `SEQUENCE_LEN` normalized values in time order.
    pub fn steps(&self) -> impl Iterator<Item = f32> + '_ {
        self.tensor.iter().copied()
    }
}

/// Clean, z-score, then pad/truncate to `SEQUENCE_LEN`.
///
/// Any non-empty length is accepted. Statistics use the cleaned input at its
/// original length; padding is applied to normalized values only.
///
/// Moments are taken over samples divided by the largest magnitude, so a
/// signal of huge finite values cannot overflow the sums. The z-score is
/// scale-invariant, so this matches the unscaled computation up to rounding.
///
/// # Errors
/// Returns `SignalError::Empty` for a zero-length signal.
pub fn condition(signal: &RawSignal) -> Result<ConditionedSignal, SignalError> {
    if signal.is_empty() {
        return Err(SignalError::Empty);
    }

    let cleaned: Vec<f64> = signal
        .0
        .iter()
        .map(|&x| if x.is_finite() { x } else { 0.0 })
        .collect();

    let peak = cleaned.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let unit = if peak > 0.0 { peak } else { 1.0 };

    let n = cleaned.len() as f64;
    let mean = cleaned.iter().map(|x| x / unit).sum::<f64>() / n;
    let variance = cleaned
        .iter()
        .map(|x| (x / unit - mean).powi(2))
        .sum::<f64>()
        / n;
    // Floor is STD_EPSILON in sample units; stays non-zero even for unit = f64::MAX.
    let std = variance.sqrt().max(STD_EPSILON / unit);

    let tensor = Array3::from_shape_fn((1, SEQUENCE_LEN, 1), |(_, t, _)| {
        cleaned
            .get(t)
            .map_or(0.0, |x| ((x / unit - mean) / std) as f32)
    });

    tracing::trace!(
        "Conditioned signal: len={}, mean={:.4e}, std={:.4e}",
        cleaned.len(),
        mean * unit,
        std * unit
    );

    Ok(ConditionedSignal { tensor })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize) -> RawSignal {
        (0..len)
            .map(|i| 70.0 + 5.0 * (i as f64 * 0.1).sin())
            .collect::<Vec<_>>()
            .into()
    }

    fn mean_std(values: &[f32]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let var = values
            .iter()
            .map(|&v| (f64::from(v) - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_output_is_fixed_length() {
        for len in [1, 10, 999, 1000, 1001, 5000] {
            let out = condition(&sine(len)).expect("Should condition");
            assert_eq!(out.tensor().shape(), &[1, SEQUENCE_LEN, 1]);
            assert_eq!(out.steps().count(), SEQUENCE_LEN);
        }
    }

    #[test]
    fn test_zscore_before_padding() {
        let out = condition(&sine(400)).expect("Should condition");
        let values: Vec<f32> = out.steps().collect();

        let (mean, std) = mean_std(&values[..400]);
        assert!(mean.abs() < 1e-4, "mean was {mean}");
        assert!((std - 1.0).abs() < 1e-4, "std was {std}");
        assert!(values[400..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_statistics_use_full_input_before_truncation() {
        // Second half has a different level; truncation must not change the mean used.
        let mut samples: Vec<f64> = vec![0.0; 1000];
        samples.extend(vec![10.0; 1000]);
        let out = condition(&RawSignal(samples)).expect("Should condition");

        // mean = 5, std = 5 over the full 2000 samples
        assert!(out.steps().all(|v| (v + 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_flat_line_is_all_zero() {
        let out = condition(&RawSignal(vec![72.0; 300])).expect("Should condition");
        assert!(out.steps().all(|v| v == 0.0));
    }

    #[test]
    fn test_non_finite_samples_become_zero() {
        let signal: RawSignal = vec![f64::NAN, 2.0, f64::INFINITY, 2.0, f64::NEG_INFINITY, 2.0].into();
        let out = condition(&signal).expect("Should condition");
        let values: Vec<f32> = out.steps().take(6).collect();

        // cleaned = [0,2,0,2,0,2]: mean 1, std 1
        assert_eq!(values, vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
        assert!(out.steps().all(f32::is_finite));
    }

    #[test]
    fn test_empty_signal_is_rejected() {
        assert_eq!(condition(&RawSignal::default()), Err(SignalError::Empty));
    }

    #[test]
    fn test_any_length_is_conditioned() {
        let long = RawSignal(vec![1.0; DEFAULT_MAX_SIGNAL_LEN + 1]);
        let out = condition(&long).expect("Should condition");
        assert_eq!(out.tensor().shape(), &[1, SEQUENCE_LEN, 1]);
        assert!(out.steps().all(|v| v == 0.0));
    }

    #[test]
    fn test_huge_magnitudes_stay_finite() {
        let flat = condition(&RawSignal(vec![1e308; 3])).expect("Should condition");
        assert!(flat.steps().all(|v| v == 0.0));

        let swing = condition(&RawSignal(vec![1e308, -1e308, 1e308, -1e308]))
            .expect("Should condition");
        let values: Vec<f32> = swing.steps().take(4).collect();
        assert_eq!(values, vec![1.0, -1.0, 1.0, -1.0]);
        assert!(swing.steps().all(f32::is_finite));
    }

    #[test]
    fn test_max_magnitude_does_not_divide_by_zero() {
        let out = condition(&RawSignal(vec![f64::MAX, f64::MAX])).expect("Should condition");
        assert!(out.steps().all(|v| v == 0.0));
    }

    #[test]
    fn test_condition_is_deterministic() {
        let signal = sine(1234);
        assert_eq!(condition(&signal), condition(&signal));
    }

    #[test]
    fn test_request_wire_format() {
        let request: AfibRequest =
            serde_json::from_str(r#"{"signal": [0.5, -1.25, 3]}"#).expect("parse");
        assert_eq!(request.signal.0, vec![0.5, -1.25, 3.0]);
    }
}

//! Score blender.
//!
//! Fixed-ratio combination of the linear (primary) and tree-ensemble
//! (secondary) scores. The 0.7/0.3 default ratio is a tunable carried by
//! the ensemble parameter blob, not a derived quantity.

use crate::scoring::ensemble::EnsembleParams;
use crate::types::EngineError;

#[derive(Debug, Clone)]
pub struct ScoreBlender {
    linear_weight: f64,
    ensemble_weight: f64,
}

impl Default for ScoreBlender {
    fn default() -> Self {
        Self {
            linear_weight: 0.7,
            ensemble_weight: 0.3,
        }
    }
}

impl ScoreBlender {
    /// Ratio from a loaded (already validated) parameter blob.
    pub fn from_params(params: &EnsembleParams) -> Self {
        Self {
            linear_weight: params.linear_weight,
            ensemble_weight: params.ensemble_weight,
        }
    }

    /// Blend the two scores. An input outside [0,100] is an upstream
    /// contract violation, not a recoverable condition.
    pub fn blend(&self, primary: f64, secondary: f64) -> Result<f64, EngineError> {
        for (label, score) in [("primary", primary), ("secondary", secondary)] {
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return Err(EngineError::Scoring(format!(
                    "{label} score {score} outside [0,100]"
                )));
            }
        }
        let blended = self.linear_weight * primary + self.ensemble_weight * secondary;
        Ok(blended.clamp(0.0, 100.0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_is_seventy_thirty() {
        let blender = ScoreBlender::default();
        for (x, y) in [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (80.0, 60.0), (33.3, 71.2)] {
            let expected = 0.7 * x + 0.3 * y;
            assert!((blender.blend(x, y).unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_blend_is_a_pure_function() {
        let blender = ScoreBlender::default();
        let a = blender.blend(42.42, 77.7).unwrap();
        let b = blender.blend(42.42, 77.7).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_out_of_range_inputs_are_contract_violations() {
        let blender = ScoreBlender::default();
        assert!(matches!(
            blender.blend(-0.1, 50.0),
            Err(EngineError::Scoring(_))
        ));
        assert!(matches!(
            blender.blend(50.0, 100.1),
            Err(EngineError::Scoring(_))
        ));
        assert!(blender.blend(f64::NAN, 50.0).is_err());
    }

    #[test]
    fn test_from_params_uses_blob_ratio() {
        let mut params = EnsembleParams::builtin();
        params.linear_weight = 0.6;
        params.ensemble_weight = 0.4;
        let blender = ScoreBlender::from_params(&params);
        assert!((blender.blend(100.0, 0.0).unwrap() - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_output_stays_in_range() {
        let blender = ScoreBlender::default();
        let blended = blender.blend(100.0, 100.0).unwrap();
        assert!(blended <= 100.0);
        assert!(blender.blend(0.0, 0.0).unwrap() >= 0.0);
    }
}

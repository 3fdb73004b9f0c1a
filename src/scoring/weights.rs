//! Tier weight profiles.
//!
//! Each time-budget mode activates a fixed weight table over the feature
//! set; deeper tiers activate a strict superset of the shallower tier's
//! features. Weights always sum to 1.0 within tolerance.

use crate::features::FeatureKey;
use crate::types::{EngineError, Mode};

/// Tolerance for the weights-sum-to-one invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

const TIER1_WEIGHTS: &[(FeatureKey, f64)] = &[
    (FeatureKey::PastPerformance, 0.40),
    (FeatureKey::CourseFit, 0.35),
    (FeatureKey::OddsValue, 0.25),
];

const TIER2_WEIGHTS: &[(FeatureKey, f64)] = &[
    (FeatureKey::PastPerformance, 0.25),
    (FeatureKey::CourseFit, 0.25),
    (FeatureKey::OddsValue, 0.18),
    (FeatureKey::TrackCondition, 0.10),
    (FeatureKey::WeightChange, 0.03),
    (FeatureKey::Interval, 0.07),
    (FeatureKey::LongshotFactor, 0.12),
];

/// Pace features activated on top of the tier2 linear table. They feed
/// the multiplicative pace stage rather than an added linear weight.
const PACE_FEATURES: &[FeatureKey] = &[FeatureKey::FrontTendency, FeatureKey::CloseTendency];

/// Immutable per-mode weight table, selected once at run start.
#[derive(Debug, Clone)]
pub struct TierWeightProfile {
    mode: Mode,
    weights: Vec<(FeatureKey, f64)>,
}

impl TierWeightProfile {
    /// The built-in profile for a mode.
    pub fn for_mode(mode: Mode) -> Self {
        let weights = match mode {
            Mode::Tier1 => TIER1_WEIGHTS.to_vec(),
            Mode::Tier2 | Mode::Tier3 | Mode::Full => TIER2_WEIGHTS.to_vec(),
        };
        debug_assert!(Self::sum_ok(&weights));
        Self { mode, weights }
    }

    /// A custom weight table (from `[weights]` in config). The linear
    /// weights must be non-negative and sum to 1.0 within tolerance.
    pub fn custom(mode: Mode, weights: Vec<(FeatureKey, f64)>) -> Result<Self, EngineError> {
        if weights.is_empty() {
            return Err(EngineError::Config("custom profile has no weights".into()));
        }
        if let Some((key, w)) = weights.iter().find(|(_, w)| *w < 0.0 || !w.is_finite()) {
            return Err(EngineError::Config(format!(
                "custom weight for {key} must be a non-negative number, got {w}"
            )));
        }
        if !Self::sum_ok(&weights) {
            let sum: f64 = weights.iter().map(|(_, w)| w).sum();
            return Err(EngineError::Config(format!(
                "custom profile weights sum to {sum}, expected 1.0 +/- {WEIGHT_SUM_TOLERANCE}"
            )));
        }
        Ok(Self { mode, weights })
    }

    fn sum_ok(weights: &[(FeatureKey, f64)]) -> bool {
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The linear weight table.
    pub fn weights(&self) -> &[(FeatureKey, f64)] {
        &self.weights
    }

    /// Whether this mode runs the multiplicative pace-adjustment stage.
    pub fn uses_pace_adjustment(&self) -> bool {
        matches!(self.mode, Mode::Tier3 | Mode::Full)
    }

    /// All feature names the mode activates (linear + pace).
    pub fn active_features(&self) -> Vec<FeatureKey> {
        let mut keys: Vec<FeatureKey> = self.weights.iter().map(|(k, _)| *k).collect();
        if self.uses_pace_adjustment() {
            keys.extend_from_slice(PACE_FEATURES);
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_modes_sum_to_one() {
        for mode in Mode::ALL {
            let profile = TierWeightProfile::for_mode(*mode);
            let sum: f64 = profile.weights().iter().map(|(_, w)| w).sum();
            assert!(
                (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
                "{mode}: sum = {sum}"
            );
        }
    }

    #[test]
    fn test_tier1_activates_exactly_three_features() {
        let profile = TierWeightProfile::for_mode(Mode::Tier1);
        assert_eq!(profile.active_features().len(), 3);
        let w: std::collections::HashMap<_, _> = profile.weights().iter().copied().collect();
        assert_eq!(w[&FeatureKey::PastPerformance], 0.40);
        assert_eq!(w[&FeatureKey::CourseFit], 0.35);
        assert_eq!(w[&FeatureKey::OddsValue], 0.25);
    }

    #[test]
    fn test_tier2_activates_seven_features() {
        let profile = TierWeightProfile::for_mode(Mode::Tier2);
        assert_eq!(profile.active_features().len(), 7);
        assert!(!profile.uses_pace_adjustment());
        let w: std::collections::HashMap<_, _> = profile.weights().iter().copied().collect();
        assert_eq!(w[&FeatureKey::TrackCondition], 0.10);
        assert_eq!(w[&FeatureKey::LongshotFactor], 0.12);
        assert_eq!(w[&FeatureKey::OddsValue], 0.18);
    }

    #[test]
    fn test_tiers_are_strict_supersets() {
        let sets: Vec<std::collections::HashSet<_>> = Mode::ALL
            .iter()
            .map(|m| {
                TierWeightProfile::for_mode(*m)
                    .active_features()
                    .into_iter()
                    .collect()
            })
            .collect();
        // tier1 ⊂ tier2 ⊂ tier3 = full
        assert!(sets[0].is_subset(&sets[1]) && sets[0].len() < sets[1].len());
        assert!(sets[1].is_subset(&sets[2]) && sets[1].len() < sets[2].len());
        assert_eq!(sets[2], sets[3]);
    }

    #[test]
    fn test_tier3_and_full_use_pace_adjustment() {
        assert!(TierWeightProfile::for_mode(Mode::Tier3).uses_pace_adjustment());
        assert!(TierWeightProfile::for_mode(Mode::Full).uses_pace_adjustment());
        assert!(!TierWeightProfile::for_mode(Mode::Tier1).uses_pace_adjustment());
    }

    #[test]
    fn test_custom_profile_validates_sum() {
        let bad = TierWeightProfile::custom(
            Mode::Tier2,
            vec![
                (FeatureKey::PastPerformance, 0.5),
                (FeatureKey::CourseFit, 0.4),
            ],
        );
        assert!(matches!(bad, Err(EngineError::Config(_))));

        let good = TierWeightProfile::custom(
            Mode::Tier2,
            vec![
                (FeatureKey::PastPerformance, 0.5),
                (FeatureKey::CourseFit, 0.5),
            ],
        );
        assert!(good.is_ok());
    }

    #[test]
    fn test_custom_profile_rejects_negative_weight() {
        let bad = TierWeightProfile::custom(
            Mode::Tier1,
            vec![
                (FeatureKey::PastPerformance, 1.5),
                (FeatureKey::CourseFit, -0.5),
            ],
        );
        assert!(matches!(bad, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_custom_profile_rejects_empty() {
        assert!(TierWeightProfile::custom(Mode::Tier1, vec![]).is_err());
    }
}

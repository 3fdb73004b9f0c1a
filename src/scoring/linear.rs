//! Linear scorer — the primary score.
//!
//! Weighted dot product of the active feature values scaled to 0-100,
//! minus a capped class-rise penalty, times the pace factor in the
//! deep tiers.

use tracing::debug;

use super::weights::TierWeightProfile;
use crate::features::FeatureVector;
use crate::types::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Class-penalty configuration.
#[derive(Debug, Clone)]
pub struct ClassPenaltyConfig {
    /// Grades an entrant may step up before the penalty applies.
    pub tolerance: u32,
    /// Points deducted per grade beyond the tolerance.
    pub points_per_grade: f64,
    /// Maximum total deduction.
    pub cap: f64,
}

impl Default for ClassPenaltyConfig {
    fn default() -> Self {
        Self {
            tolerance: 0,
            points_per_grade: 5.0,
            cap: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Deterministic weighted-sum scorer. Pure: no randomness, no I/O.
#[derive(Debug, Clone)]
pub struct LinearScorer {
    profile: TierWeightProfile,
    penalty: ClassPenaltyConfig,
}

impl LinearScorer {
    pub fn new(profile: TierWeightProfile, penalty: ClassPenaltyConfig) -> Self {
        Self { profile, penalty }
    }

    pub fn profile(&self) -> &TierWeightProfile {
        &self.profile
    }

    /// Score an entrant's feature vector.
    ///
    /// `pace_factor` is the multiplicative adjustment from the pace
    /// analysis; callers pass 1.0 outside tier3/full. The result is
    /// clamped to [0,100], and the class penalty can never drive it
    /// below zero.
    pub fn score(
        &self,
        features: &FeatureVector,
        class_rise: u32,
        pace_factor: f64,
    ) -> Result<f64, EngineError> {
        if !(0.90..=1.10).contains(&pace_factor) {
            return Err(EngineError::Scoring(format!(
                "pace factor {pace_factor} outside [0.90, 1.10]"
            )));
        }

        let mut dot = 0.0;
        for (key, weight) in self.profile.weights() {
            // Missing features fail closed to the neutral 0.5.
            dot += features.get_or_neutral(*key) * weight;
        }
        let base = dot * 100.0;

        let penalty = self.class_penalty(class_rise);
        let penalized = (base - penalty).max(0.0);

        let adjusted = if self.profile.uses_pace_adjustment() {
            penalized * pace_factor
        } else {
            penalized
        };
        let score = adjusted.clamp(0.0, 100.0);

        debug!(
            mode = %self.profile.mode(),
            base = format!("{base:.2}"),
            penalty = format!("{penalty:.1}"),
            pace_factor = format!("{pace_factor:.4}"),
            score = format!("{score:.2}"),
            "Linear score"
        );

        Ok(score)
    }

    /// Deduction for stepping up in class beyond the tolerance,
    /// proportional to the gap and capped.
    fn class_penalty(&self, class_rise: u32) -> f64 {
        let over = class_rise.saturating_sub(self.penalty.tolerance);
        if over == 0 {
            return 0.0;
        }
        (over as f64 * self.penalty.points_per_grade).min(self.penalty.cap)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Scoring pipeline — linear score, tree ensemble, blending, pace and
//! popularity corrections.

pub mod blend;
pub mod ensemble;
pub mod linear;
pub mod pace;
pub mod popularity;
pub mod weights;

use blend::ScoreBlender;
use ensemble::TreeEnsemble;
use linear::LinearScorer;

use crate::features::FeatureVector;
use crate::types::EngineError;

/// The pure part of one entrant's score: primary, secondary, blended
/// (before popularity correction). This is what the score cache stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub primary: f64,
    pub secondary: f64,
    pub blended: f64,
}

/// Per-entrant scorer: linear -> ensemble -> blend. Pure and
/// deterministic, which is what makes the score cache sound.
pub struct EntrantScorer {
    linear: LinearScorer,
    ensemble: TreeEnsemble,
    blender: ScoreBlender,
}

impl EntrantScorer {
    pub fn new(linear: LinearScorer, ensemble: TreeEnsemble, blender: ScoreBlender) -> Self {
        Self {
            linear,
            ensemble,
            blender,
        }
    }

    pub fn score(
        &self,
        features: &FeatureVector,
        odds: f64,
        class_rise: u32,
        pace_factor: f64,
    ) -> Result<ScoreBreakdown, EngineError> {
        let primary = self.linear.score(features, class_rise, pace_factor)?;
        let secondary = self.ensemble.score(features, odds);
        let blended = self.blender.blend(primary, secondary)?;
        Ok(ScoreBreakdown {
            primary,
            secondary,
            blended,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

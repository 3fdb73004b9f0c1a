//! Expected value and risk zones.
//!
//! Calibration maps a 0-100 score to a win probability with a linear
//! scale and hard floor/ceiling; expected value is the plain
//! `p * odds - 1` payoff. Zones partition the odds axis into buy and
//! avoid regions, checked in a fixed order so overlapping bands resolve
//! deterministically.

use tracing::debug;

use crate::types::{EngineError, Zone};

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Linear score-to-probability scale (score/100 * scale).
    pub scale: f64,
    /// Probability floor.
    pub floor: f64,
    /// Probability ceiling.
    pub ceiling: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            scale: 0.4,
            floor: 0.01,
            ceiling: 0.60,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(EngineError::Config(format!(
                "calibration scale {} outside (0,1]",
                self.scale
            )));
        }
        if !(0.0 < self.floor && self.floor < self.ceiling && self.ceiling <= 1.0) {
            return Err(EngineError::Config(format!(
                "calibration bounds floor={} ceiling={} invalid",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }
}

pub struct EvCalculator {
    config: CalibrationConfig,
}

impl EvCalculator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Calibrated win probability for a blended score.
    pub fn win_probability(&self, score: f64) -> f64 {
        (score / 100.0 * self.config.scale).clamp(self.config.floor, self.config.ceiling)
    }

    /// Expected value per unit staked at the given odds.
    pub fn expected_value(&self, score: f64, odds: f64) -> f64 {
        let p = self.win_probability(score);
        let ev = p * odds - 1.0;
        debug!(
            score = format!("{score:.2}"),
            odds = format!("{odds:.1}"),
            probability = format!("{p:.4}"),
            ev = format!("{ev:.2}"),
            "EV computed"
        );
        ev
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// Classify an entrant's odds and EV into a risk zone. Bands are
/// evaluated good, premium, caution, avoid, then neutral; the first
/// match wins.
pub fn classify_zone(odds: f64, expected_value: f64) -> Zone {
    if (1.0..=1.4).contains(&odds) || (7.0..=9.9).contains(&odds) {
        Zone::Good
    } else if (10.0..=19.9).contains(&odds) && expected_value > 0.0 {
        Zone::Premium
    } else if (1.5..=2.9).contains(&odds) {
        Zone::Caution
    } else if odds >= 50.0 {
        Zone::Avoid
    } else {
        Zone::Neutral
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

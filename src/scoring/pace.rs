//! Race-pace shape analysis.
//!
//! Predicts whether the race favors front-runners or closers from the
//! field's running-style tendencies, then hands each entrant a small
//! multiplicative factor for the linear scorer. Only tier3/full run
//! this stage.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::features::{FeatureKey, FeatureVector};

/// Maximum adjustment either way (factor in [0.90, 1.10]).
const MAX_ADJUSTMENT: f64 = 0.10;
/// Base scale fed through tanh compression.
const ADJUSTMENT_SCALE: f64 = 0.08;
/// One side must lead the other by this fraction to bias the race.
const BIAS_THRESHOLD: f64 = 0.12;
/// Leading entrants considered when summing each side's strength.
const TOP_N: usize = 2;

/// Predicted race shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceShape {
    FrontFavored,
    CloserFavored,
    Even,
}

impl fmt::Display for PaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaceShape::FrontFavored => write!(f, "front-favored"),
            PaceShape::CloserFavored => write!(f, "closer-favored"),
            PaceShape::Even => write!(f, "even"),
        }
    }
}

/// Field-level pace analysis result: the predicted shape and a factor
/// per entrant number.
#[derive(Debug, Clone)]
pub struct PaceAnalysis {
    pub shape: PaceShape,
    factors: HashMap<u32, f64>,
}

impl PaceAnalysis {
    /// Factor for an entrant; unknown entrants get the neutral 1.0.
    pub fn factor(&self, number: u32) -> f64 {
        self.factors.get(&number).copied().unwrap_or(1.0)
    }
}

/// Analyze the field's front/close tendencies and derive per-entrant
/// pace factors.
pub fn analyze(field: &[(u32, &FeatureVector)]) -> PaceAnalysis {
    let fronts: Vec<f64> = field
        .iter()
        .map(|(_, fv)| fv.get_or_neutral(FeatureKey::FrontTendency))
        .collect();
    let closes: Vec<f64> = field
        .iter()
        .map(|(_, fv)| fv.get_or_neutral(FeatureKey::CloseTendency))
        .collect();

    let front_z = z_scores(&fronts);
    let close_z = z_scores(&closes);

    let front_strength = top_positive_sum(&front_z, TOP_N);
    let close_strength = top_positive_sum(&close_z, TOP_N);

    let shape = if front_strength > close_strength * (1.0 + BIAS_THRESHOLD) {
        PaceShape::FrontFavored
    } else if close_strength > front_strength * (1.0 + BIAS_THRESHOLD) {
        PaceShape::CloserFavored
    } else {
        PaceShape::Even
    };

    let mut factors = HashMap::with_capacity(field.len());
    for (i, (number, _)) in field.iter().enumerate() {
        let raw_diff = match shape {
            PaceShape::FrontFavored => front_z[i] - close_z[i],
            PaceShape::CloserFavored => close_z[i] - front_z[i],
            PaceShape::Even => 0.0,
        };
        // tanh compresses outliers before scaling to the +/-10% band.
        let adj = (raw_diff.tanh() * ADJUSTMENT_SCALE).clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT);
        factors.insert(*number, 1.0 + adj);
    }

    debug!(
        shape = %shape,
        front_strength = format!("{front_strength:.3}"),
        close_strength = format!("{close_strength:.3}"),
        field = field.len(),
        "Pace analysis"
    );

    PaceAnalysis { shape, factors }
}

/// Population z-scores; all zeros when the spread is zero.
fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let sigma = var.sqrt();
    if sigma == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / sigma).collect()
}

fn top_positive_sum(z: &[f64], n: usize) -> f64 {
    let mut sorted: Vec<f64> = z.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    sorted.iter().take(n).map(|v| v.max(0.0)).sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

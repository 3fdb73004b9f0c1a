//! Synthetic odds for multi-entrant bet types.
//!
//! Individual win probabilities are implied from market odds (1/odds)
//! and renormalized across the full field so they sum to 1. A
//! combination's probability is the product of its members' implied
//! probabilities times the number of finishing-order permutations the
//! bet type covers; combined odds are the reciprocal.

use crate::types::{BetType, EngineError, Entrant};

/// Combined market-implied quote for a multi-entrant combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticOdds {
    pub probability: f64,
    pub odds: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticOddsCalculator {
    /// Sum of 1/odds across the whole field (the renormalization base).
    inverse_sum: f64,
}

impl SyntheticOddsCalculator {
    /// Build from the full field. Entrants are assumed validated
    /// (odds > 1.0) by the evaluator boundary.
    pub fn for_field(field: &[Entrant]) -> Result<Self, EngineError> {
        if field.is_empty() {
            return Err(EngineError::InvalidCombination("empty field".into()));
        }
        let inverse_sum: f64 = field.iter().map(|e| 1.0 / e.odds).sum();
        Ok(Self { inverse_sum })
    }

    /// Field-renormalized implied win probability for one entrant.
    pub fn implied_probability(&self, entrant: &Entrant) -> f64 {
        (1.0 / entrant.odds) / self.inverse_sum
    }

    /// Combined probability and odds for a multi-entrant combination.
    /// Rejects bet types outside two or three legs and non-distinct
    /// selections.
    pub fn combine(
        &self,
        bet_type: BetType,
        selection: &[&Entrant],
    ) -> Result<SyntheticOdds, EngineError> {
        let n = bet_type.entrant_count();
        if !(2..=3).contains(&n) {
            return Err(EngineError::InvalidCombination(format!(
                "{bet_type} is not a multi-entrant bet type"
            )));
        }
        if selection.len() != n {
            return Err(EngineError::InvalidCombination(format!(
                "{bet_type} needs {n} entrants, got {}",
                selection.len()
            )));
        }
        for (i, a) in selection.iter().enumerate() {
            if selection[i + 1..].iter().any(|b| b.number == a.number) {
                return Err(EngineError::InvalidCombination(format!(
                    "entrant #{} appears more than once",
                    a.number
                )));
            }
        }

        let product: f64 = selection
            .iter()
            .map(|e| self.implied_probability(e))
            .product();
        let probability = (product * bet_type.permutations() as f64).min(1.0);
        if probability <= 0.0 {
            return Err(EngineError::InvalidCombination(
                "combination has zero implied probability".into(),
            ));
        }
        Ok(SyntheticOdds {
            probability,
            odds: 1.0 / probability,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

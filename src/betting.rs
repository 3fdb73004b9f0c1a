//! Budget allocation.
//!
//! Candidate bets (win singles plus quinella pairs from the buy zones)
//! are ranked by expected value and funded greedily in fixed stake
//! units, with a per-bet cap expressed as a share of the total budget.

use tracing::{debug, warn};

use crate::ev::EvCalculator;
use crate::odds::SyntheticOddsCalculator;
use crate::types::{BetPattern, BetType, EngineError, ScoredEntrant, Zone};

#[derive(Debug, Clone)]
pub struct BettingConfig {
    /// Stake granularity; every stake is a multiple of this.
    pub unit_stake: u32,
    /// Maximum share of the budget any single bet may absorb.
    pub max_share: f64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            unit_stake: 100,
            max_share: 0.30,
        }
    }
}

impl BettingConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.unit_stake == 0 {
            return Err(EngineError::Config("unit stake must be positive".into()));
        }
        if !(0.0 < self.max_share && self.max_share <= 1.0) {
            return Err(EngineError::Config(format!(
                "max bet share {} outside (0,1]",
                self.max_share
            )));
        }
        Ok(())
    }
}

/// An EV-ranked candidate before any money is assigned.
#[derive(Debug, Clone)]
struct Candidate {
    bet_type: BetType,
    entrants: Vec<u32>,
    odds: f64,
    expected_value: f64,
    /// Variance of member win odds; the tie-break favors tighter
    /// combinations.
    odds_variance: f64,
}

/// Candidate ordering: EV descending, then lower member-odds variance,
/// then lower combined odds.
fn rank(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    b.expected_value
        .partial_cmp(&a.expected_value)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| {
            a.odds_variance
                .partial_cmp(&b.odds_variance)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .then_with(|| {
            a.odds
                .partial_cmp(&b.odds)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

pub struct BudgetOptimizer {
    config: BettingConfig,
}

impl BudgetOptimizer {
    pub fn new(config: BettingConfig) -> Self {
        Self { config }
    }

    /// Build the candidate set from the scored field: one win bet per
    /// buy-zone entrant, one quinella per buy-zone pair.
    fn candidates(
        &self,
        scored: &[ScoredEntrant],
        synthetic: &SyntheticOddsCalculator,
        ev: &EvCalculator,
    ) -> Result<Vec<Candidate>, EngineError> {
        let buyable: Vec<&ScoredEntrant> = scored
            .iter()
            .filter(|s| matches!(s.zone, Zone::Premium | Zone::Good))
            .collect();

        let mut candidates = Vec::new();
        for s in &buyable {
            candidates.push(Candidate {
                bet_type: BetType::Win,
                entrants: vec![s.entrant.number],
                odds: s.entrant.odds,
                expected_value: s.expected_value,
                odds_variance: 0.0,
            });
        }
        for (i, a) in buyable.iter().enumerate() {
            for b in &buyable[i + 1..] {
                let quote =
                    synthetic.combine(BetType::Quinella, &[&a.entrant, &b.entrant])?;
                // Model probability of the pair filling the top two in
                // either order, priced against the synthetic odds.
                let p_pair = (ev.win_probability(a.blended)
                    * ev.win_probability(b.blended)
                    * BetType::Quinella.permutations() as f64)
                    .min(1.0);
                let pair_ev = p_pair * quote.odds - 1.0;
                let mean = (a.entrant.odds + b.entrant.odds) / 2.0;
                let variance = ((a.entrant.odds - mean).powi(2)
                    + (b.entrant.odds - mean).powi(2))
                    / 2.0;
                candidates.push(Candidate {
                    bet_type: BetType::Quinella,
                    entrants: vec![a.entrant.number, b.entrant.number],
                    odds: quote.odds,
                    expected_value: pair_ev,
                    odds_variance: variance,
                });
            }
        }
        Ok(candidates)
    }

    /// Allocate the budget across positive-EV candidates. EV order,
    /// greedy unit funding, per-bet cap. A budget below one stake unit
    /// is a caller error.
    pub fn allocate(
        &self,
        scored: &[ScoredEntrant],
        synthetic: &SyntheticOddsCalculator,
        ev: &EvCalculator,
        budget: u32,
    ) -> Result<Vec<BetPattern>, EngineError> {
        self.config.validate()?;
        if budget < self.config.unit_stake {
            return Err(EngineError::Budget {
                budget,
                floor: self.config.unit_stake,
            });
        }

        // The cap rounds down to a unit multiple. If it rounds below one
        // unit, no stake can be placed without busting it.
        let per_bet_cap = ((budget as f64 * self.config.max_share) as u32
            / self.config.unit_stake)
            * self.config.unit_stake;
        if per_bet_cap < self.config.unit_stake {
            warn!(
                budget,
                unit_stake = self.config.unit_stake,
                max_share = self.config.max_share,
                "Per-bet cap below one stake unit — empty bet plan"
            );
            return Ok(Vec::new());
        }

        let mut candidates: Vec<Candidate> = self
            .candidates(scored, synthetic, ev)?
            .into_iter()
            .filter(|c| c.expected_value > 0.0)
            .collect();
        candidates.sort_by(rank);

        if candidates.is_empty() {
            warn!(budget, "No positive-EV candidates — empty bet plan");
            return Ok(Vec::new());
        }

        let mut plan: Vec<BetPattern> = Vec::new();
        let mut remaining = budget;

        // First pass: one unit each down the ranking, then keep topping
        // up from the best candidate while cap and budget allow.
        for c in &candidates {
            if remaining < self.config.unit_stake {
                break;
            }
            plan.push(BetPattern {
                bet_type: c.bet_type,
                entrants: c.entrants.clone(),
                combined_odds: c.odds,
                expected_value: c.expected_value,
                stake: self.config.unit_stake,
            });
            remaining -= self.config.unit_stake;
        }
        'topup: loop {
            let mut funded_any = false;
            for bet in plan.iter_mut() {
                if remaining < self.config.unit_stake {
                    break 'topup;
                }
                if bet.stake + self.config.unit_stake <= per_bet_cap {
                    bet.stake += self.config.unit_stake;
                    remaining -= self.config.unit_stake;
                    funded_any = true;
                }
            }
            if !funded_any {
                break;
            }
        }

        let staked: u32 = plan.iter().map(|b| b.stake).sum();
        debug!(
            candidates = candidates.len(),
            bets = plan.len(),
            staked,
            budget,
            "Bet plan allocated"
        );
        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ev::{classify_zone, CalibrationConfig};
    use crate::types::Entrant;

    fn entrant(number: u32, odds: f64, popularity: u32) -> Entrant {
        Entrant {
            number,
            name: format!("E{number}"),
            odds,
            popularity,
            class_rise: 0,
        }
    }

    fn scored(entrant: Entrant, blended: f64, ev: &EvCalculator) -> ScoredEntrant {
        let p = ev.win_probability(blended);
        let expected_value = ev.expected_value(blended, entrant.odds);
        let zone = classify_zone(entrant.odds, expected_value);
        ScoredEntrant {
            entrant,
            primary: blended,
            secondary: blended,
            blended,
            win_probability: p,
            expected_value,
            zone,
        }
    }

    fn fixture() -> (Vec<ScoredEntrant>, SyntheticOddsCalculator, EvCalculator) {
        let ev = EvCalculator::new(CalibrationConfig::default());
        let field = vec![
            entrant(1, 2.5, 1),
            entrant(2, 17.0, 6),
            entrant(3, 13.5, 5),
            entrant(4, 8.0, 4),
            entrant(5, 60.0, 12),
        ];
        let synthetic = SyntheticOddsCalculator::for_field(&field).unwrap();
        let scored = vec![
            scored(field[0].clone(), 88.0, &ev),
            scored(field[1].clone(), 87.4, &ev),
            scored(field[2].clone(), 86.6, &ev),
            scored(field[3].clone(), 70.0, &ev),
            scored(field[4].clone(), 40.0, &ev),
        ];
        (scored, synthetic, ev)
    }

    #[test]
    fn test_budget_below_unit_is_an_error() {
        let (scored, synthetic, ev) = fixture();
        let optimizer = BudgetOptimizer::new(BettingConfig::default());
        let err = optimizer.allocate(&scored, &synthetic, &ev, 50).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Budget {
                budget: 50,
                floor: 100
            }
        ));
    }

    #[test]
    fn test_allocation_respects_budget_unit_and_cap() {
        let (scored, synthetic, ev) = fixture();
        let optimizer = BudgetOptimizer::new(BettingConfig::default());
        let plan = optimizer.allocate(&scored, &synthetic, &ev, 1000).unwrap();
        assert!(!plan.is_empty());
        let staked: u32 = plan.iter().map(|b| b.stake).sum();
        assert!(staked <= 1000);
        for bet in &plan {
            assert_eq!(bet.stake % 100, 0);
            assert!(bet.stake <= 300, "bet over cap: {bet:?}");
            assert!(bet.expected_value > 0.0);
        }
    }

    #[test]
    fn test_cap_below_one_unit_yields_empty_plan() {
        // Budget 150 passes the unit floor, but 30% of it (45) rounds
        // below one stake unit; a single 100 stake would take 66% of
        // the budget, so nothing is placed.
        let (scored, synthetic, ev) = fixture();
        let optimizer = BudgetOptimizer::new(BettingConfig::default());
        let plan = optimizer.allocate(&scored, &synthetic, &ev, 150).unwrap();
        assert!(plan.is_empty());

        // One unit of headroom appears at budget 334 (cap 100).
        let plan = optimizer.allocate(&scored, &synthetic, &ev, 334).unwrap();
        assert!(!plan.is_empty());
        for bet in &plan {
            assert_eq!(bet.stake, 100);
        }
    }

    #[test]
    fn test_equal_ev_and_variance_prefer_lower_odds() {
        let candidate = |odds: f64, variance: f64, ev: f64| Candidate {
            bet_type: BetType::Win,
            entrants: vec![1],
            odds,
            expected_value: ev,
            odds_variance: variance,
        };
        let mut candidates = vec![
            candidate(18.0, 0.0, 1.5),
            candidate(9.0, 0.0, 1.5),
            candidate(12.0, 0.0, 2.0),
        ];
        candidates.sort_by(rank);
        assert_eq!(candidates[0].odds, 12.0); // highest EV first
        assert_eq!(candidates[1].odds, 9.0); // EV tie: lower odds
        assert_eq!(candidates[2].odds, 18.0);
    }

    #[test]
    fn test_plan_is_ordered_by_expected_value() {
        let (scored, synthetic, ev) = fixture();
        let optimizer = BudgetOptimizer::new(BettingConfig::default());
        let plan = optimizer.allocate(&scored, &synthetic, &ev, 1000).unwrap();
        for window in plan.windows(2) {
            assert!(window[0].expected_value >= window[1].expected_value);
        }
    }

    #[test]
    fn test_caution_and_avoid_zones_are_excluded() {
        let (scored, synthetic, ev) = fixture();
        let optimizer = BudgetOptimizer::new(BettingConfig::default());
        let plan = optimizer.allocate(&scored, &synthetic, &ev, 2000).unwrap();
        // #1 is caution (odds 2.5), #5 is avoid (odds 60).
        for bet in &plan {
            assert!(!bet.entrants.contains(&1));
            assert!(!bet.entrants.contains(&5));
        }
    }

    #[test]
    fn test_no_positive_ev_yields_empty_plan() {
        let ev = EvCalculator::new(CalibrationConfig::default());
        let field = vec![entrant(1, 8.0, 3), entrant(2, 9.0, 4)];
        let synthetic = SyntheticOddsCalculator::for_field(&field).unwrap();
        // Low scores make every EV negative, but odds keep them in good.
        let scored = vec![
            scored(field[0].clone(), 10.0, &ev),
            scored(field[1].clone(), 10.0, &ev),
        ];
        let optimizer = BudgetOptimizer::new(BettingConfig::default());
        let plan = optimizer.allocate(&scored, &synthetic, &ev, 1000).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(BettingConfig::default().validate().is_ok());
        assert!(BettingConfig {
            unit_stake: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(BettingConfig {
            max_share: 1.5,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}

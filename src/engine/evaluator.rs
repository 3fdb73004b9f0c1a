//! Run orchestrator.
//!
//! One evaluation run: validate the field, fetch features, run the pace
//! stage in the deep tiers, score every entrant concurrently, apply the
//! popularity correction, price and classify, then allocate the budget.
//! A run either publishes a complete report or fails — partially scored
//! fields are never returned.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::betting::{BettingConfig, BudgetOptimizer};
use crate::cache::{CacheKey, ScoreCache};
use crate::ev::{classify_zone, CalibrationConfig, EvCalculator};
use crate::features::{FeatureKey, FeatureProvider, FeatureVector};
use crate::odds::SyntheticOddsCalculator;
use crate::scoring::blend::ScoreBlender;
use crate::scoring::ensemble::{EnsembleParams, TreeEnsemble};
use crate::scoring::linear::{ClassPenaltyConfig, LinearScorer};
use crate::scoring::pace;
use crate::scoring::popularity::{CorrectorConfig, LongshotReference, PopularityCorrector};
use crate::scoring::weights::TierWeightProfile;
use crate::scoring::{EntrantScorer, ScoreBreakdown};
use crate::types::{
    EngineError, Entrant, EvaluationReport, ExcludedEntrant, Mode, RaceContext, ScoredEntrant,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    pub betting: BettingConfig,
    pub calibration: CalibrationConfig,
    pub corrector: CorrectorConfig,
    pub class_penalty: ClassPenaltyConfig,
    /// Optional override of the built-in linear weight table.
    pub custom_weights: Option<Vec<(FeatureKey, f64)>>,
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct Evaluator {
    provider: Arc<dyn FeatureProvider>,
    longshot: Arc<dyn LongshotReference>,
    params: EnsembleParams,
    cache: ScoreCache,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(
        provider: Arc<dyn FeatureProvider>,
        longshot: Arc<dyn LongshotReference>,
        params: EnsembleParams,
        config: EvaluatorConfig,
    ) -> Result<Self, EngineError> {
        config.betting.validate()?;
        config.calibration.validate()?;
        params.validate()?;
        Ok(Self {
            provider,
            longshot,
            params,
            cache: ScoreCache::new(),
            config,
        })
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Evaluate one race. The cache is scoped to the run: it is cleared
    /// here and warm only for repeated scoring within the same run.
    pub async fn evaluate(
        &self,
        race: &RaceContext,
        entrants: &[Entrant],
        mode: Mode,
        budget: u32,
    ) -> Result<EvaluationReport, EngineError> {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            race = %race.name,
            mode = %mode,
            entrants = entrants.len(),
            budget,
            "Evaluation run started"
        );

        self.cache.clear();

        // Boundary validation: malformed entrants are excluded with a
        // reason, never silently dropped.
        let mut excluded: Vec<ExcludedEntrant> = Vec::new();
        let mut valid: Vec<Entrant> = Vec::new();
        for e in entrants {
            match e.validate() {
                Ok(()) => valid.push(e.clone()),
                Err(err) => {
                    warn!(entrant = %e.name, error = %err, "Entrant excluded");
                    excluded.push(ExcludedEntrant {
                        number: e.number,
                        name: e.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        // Fetch features for the whole field concurrently. A data error
        // excludes the entrant; anything else aborts the run.
        let fetches = join_all(
            valid
                .iter()
                .map(|e| async { (e.clone(), self.provider.features(e, mode).await) }),
        )
        .await;
        let mut field: Vec<(Entrant, FeatureVector)> = Vec::with_capacity(fetches.len());
        for (entrant, result) in fetches {
            match result {
                Ok(features) => field.push((entrant, features)),
                Err(EngineError::Data { message, .. }) => {
                    warn!(entrant = %entrant.name, reason = %message, "Entrant excluded");
                    excluded.push(ExcludedEntrant {
                        number: entrant.number,
                        name: entrant.name.clone(),
                        reason: message,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let profile = match &self.config.custom_weights {
            Some(weights) => TierWeightProfile::custom(mode, weights.clone())?,
            None => TierWeightProfile::for_mode(mode),
        };

        // Pace stage only runs in the deep tiers; everyone else scores
        // with the neutral factor.
        let analysis = if profile.uses_pace_adjustment() {
            let refs: Vec<(u32, &FeatureVector)> =
                field.iter().map(|(e, fv)| (e.number, fv)).collect();
            Some(pace::analyze(&refs))
        } else {
            None
        };

        let scorer = Arc::new(EntrantScorer::new(
            LinearScorer::new(profile, self.config.class_penalty.clone()),
            TreeEnsemble::new(self.params.clone()),
            ScoreBlender::from_params(&self.params),
        ));
        let corrector = Arc::new(PopularityCorrector::new(self.config.corrector.clone()));
        let race = Arc::new(race.clone());

        let mut tasks = Vec::with_capacity(field.len());
        for (entrant, features) in field {
            let pace_factor = analysis
                .as_ref()
                .map(|a| a.factor(entrant.number))
                .unwrap_or(1.0);
            let scorer = Arc::clone(&scorer);
            let corrector = Arc::clone(&corrector);
            let longshot = Arc::clone(&self.longshot);
            let cache = self.cache.clone();
            let race = Arc::clone(&race);
            tasks.push(tokio::spawn(async move {
                let key = CacheKey {
                    entrant: entrant.number,
                    mode,
                    fingerprint: run_fingerprint(
                        &features,
                        entrant.odds,
                        entrant.class_rise,
                        pace_factor,
                    ),
                };
                let breakdown = match cache.get(&key) {
                    Some(hit) => {
                        debug!(entrant = %entrant.name, "Score cache hit");
                        hit
                    }
                    None => {
                        let fresh = scorer.score(
                            &features,
                            entrant.odds,
                            entrant.class_rise,
                            pace_factor,
                        )?;
                        cache.put(key, fresh);
                        fresh
                    }
                };
                let corrected = corrector
                    .correct(breakdown.blended, &entrant, &race, longshot.as_ref())
                    .await;
                Ok::<(Entrant, ScoreBreakdown, f64), EngineError>((
                    entrant, breakdown, corrected,
                ))
            }));
        }

        // Any scoring failure aborts the whole run; no partial report.
        let ev = EvCalculator::new(self.config.calibration.clone());
        let mut scored: Vec<ScoredEntrant> = Vec::with_capacity(tasks.len());
        for joined in join_all(tasks).await {
            let (entrant, breakdown, corrected) = joined
                .map_err(|e| EngineError::Scoring(format!("scoring task panicked: {e}")))??;
            let win_probability = ev.win_probability(corrected);
            let expected_value = ev.expected_value(corrected, entrant.odds);
            let zone = classify_zone(entrant.odds, expected_value);
            scored.push(ScoredEntrant {
                entrant,
                primary: breakdown.primary,
                secondary: breakdown.secondary,
                blended: corrected,
                win_probability,
                expected_value,
                zone,
            });
        }

        scored.sort_by(|a, b| {
            b.blended
                .partial_cmp(&a.blended)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entrant.number.cmp(&b.entrant.number))
        });

        let bet_plan = if scored.is_empty() {
            Vec::new()
        } else {
            let field: Vec<Entrant> = scored.iter().map(|s| s.entrant.clone()).collect();
            let synthetic = SyntheticOddsCalculator::for_field(&field)?;
            let optimizer = BudgetOptimizer::new(self.config.betting.clone());
            match optimizer.allocate(&scored, &synthetic, &ev, budget) {
                Ok(plan) => plan,
                Err(EngineError::Budget { budget, floor }) => {
                    warn!(budget, floor, "Budget below stake floor — empty bet plan");
                    Vec::new()
                }
                Err(other) => return Err(other),
            }
        };

        let total_staked: u32 = bet_plan.iter().map(|b| b.stake).sum();
        info!(
            run_id = %run_id,
            scored = scored.len(),
            excluded = excluded.len(),
            bets = bet_plan.len(),
            total_staked,
            cache_hits = self.cache.hit_count(),
            "Evaluation run complete"
        );

        Ok(EvaluationReport {
            run_id,
            mode,
            generated_at: chrono::Utc::now(),
            scored_entrants: scored,
            bet_plan,
            excluded,
            total_staked,
        })
    }
}

/// Cache fingerprint over everything the pure scoring path reads:
/// feature bits, odds bits, class rise, and the run's pace factor.
fn run_fingerprint(features: &FeatureVector, odds: f64, class_rise: u32, pace_factor: f64) -> u64 {
    let mut hasher = DefaultHasher::new();
    features.fingerprint(odds).hash(&mut hasher);
    class_rise.hash(&mut hasher);
    pace_factor.to_bits().hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

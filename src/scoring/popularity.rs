//! Popularity corrector.
//!
//! Low-popularity entrants with a qualifying longshot history get a
//! capped bonus on top of the blended score. The longshot reference is
//! an external collaborator; if it is slow or unavailable the corrector
//! degrades to a no-op rather than stalling or failing the run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{Entrant, RaceContext};

// ---------------------------------------------------------------------------
// Longshot reference
// ---------------------------------------------------------------------------

/// Qualification result from the longshot-performance reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongshotRecord {
    pub qualifies: bool,
    /// Bonus magnitude in score points (capped by the corrector).
    pub bonus: f64,
}

/// External lookup of historical longshot performance. An `Err` means
/// the reference is unavailable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LongshotReference: Send + Sync {
    async fn lookup(
        &self,
        entrant: &Entrant,
        race: &RaceContext,
    ) -> anyhow::Result<LongshotRecord>;
}

/// Reference backed by a static per-entrant table (race files, tests).
pub struct StaticLongshotReference {
    by_name: HashMap<String, LongshotRecord>,
}

impl StaticLongshotReference {
    pub fn new(by_name: HashMap<String, LongshotRecord>) -> Self {
        Self { by_name }
    }

    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }
}

#[async_trait]
impl LongshotReference for StaticLongshotReference {
    async fn lookup(
        &self,
        entrant: &Entrant,
        _race: &RaceContext,
    ) -> anyhow::Result<LongshotRecord> {
        Ok(self
            .by_name
            .get(&entrant.name)
            .copied()
            .unwrap_or(LongshotRecord {
                qualifies: false,
                bonus: 0.0,
            }))
    }
}

// ---------------------------------------------------------------------------
// Corrector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CorrectorConfig {
    /// Minimum popularity rank (1 = favorite) for eligibility.
    pub rank_threshold: u32,
    /// Maximum bonus added to the blended score.
    pub bonus_cap: f64,
    /// Time bound on the reference lookup.
    pub lookup_timeout: Duration,
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            rank_threshold: 8,
            bonus_cap: 5.0,
            lookup_timeout: Duration::from_millis(250),
        }
    }
}

pub struct PopularityCorrector {
    config: CorrectorConfig,
}

impl PopularityCorrector {
    pub fn new(config: CorrectorConfig) -> Self {
        Self { config }
    }

    /// Apply the longshot bonus where earned; pass everything else
    /// through unchanged.
    pub async fn correct(
        &self,
        blended: f64,
        entrant: &Entrant,
        race: &RaceContext,
        reference: &dyn LongshotReference,
    ) -> f64 {
        if entrant.popularity < self.config.rank_threshold {
            return blended;
        }

        let lookup = tokio::time::timeout(
            self.config.lookup_timeout,
            reference.lookup(entrant, race),
        )
        .await;

        let record = match lookup {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!(
                    entrant = %entrant.name,
                    error = %e,
                    "Longshot reference unavailable — skipping correction"
                );
                return blended;
            }
            Err(_) => {
                warn!(
                    entrant = %entrant.name,
                    timeout_ms = self.config.lookup_timeout.as_millis() as u64,
                    "Longshot lookup timed out — skipping correction"
                );
                return blended;
            }
        };

        if !record.qualifies {
            return blended;
        }

        let bonus = record.bonus.clamp(0.0, self.config.bonus_cap);
        let corrected = (blended + bonus).min(100.0);
        debug!(
            entrant = %entrant.name,
            popularity = entrant.popularity,
            bonus = format!("{bonus:.1}"),
            corrected = format!("{corrected:.2}"),
            "Longshot bonus applied"
        );
        corrected
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

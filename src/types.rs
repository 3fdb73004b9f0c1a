//! Shared types for the PADDOCK engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that scoring, odds, and
//! betting modules can depend on them without circular references.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Time-budget mode. Each tier activates a strict superset of the
/// previous tier's features, trading evaluation depth for latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Tier1,
    Tier2,
    Tier3,
    Full,
}

impl Mode {
    /// All known modes (useful for iteration).
    pub const ALL: &'static [Mode] = &[Mode::Tier1, Mode::Tier2, Mode::Tier3, Mode::Full];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Tier1 => write!(f, "tier1"),
            Mode::Tier2 => write!(f, "tier2"),
            Mode::Tier3 => write!(f, "tier3"),
            Mode::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tier1" => Ok(Mode::Tier1),
            "tier2" => Ok(Mode::Tier2),
            "tier3" => Ok(Mode::Tier3),
            "full" => Ok(Mode::Full),
            other => Err(EngineError::Config(format!("unknown mode: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Entrant
// ---------------------------------------------------------------------------

/// A single race participant, created once per evaluation run from
/// external data and immutable during scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrant {
    pub number: u32,
    pub name: String,
    /// Decimal market odds (> 1.0). Kept raw for EV math.
    pub odds: f64,
    /// Popularity rank, 1 = favorite.
    pub popularity: u32,
    /// Grades stepped up since the last start (0 = same or dropping).
    #[serde(default)]
    pub class_rise: u32,
}

impl Entrant {
    /// Boundary validation: malformed market data excludes the entrant
    /// from scoring without aborting the run.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.odds > 1.0) || !self.odds.is_finite() {
            return Err(EngineError::Data {
                entrant: self.name.clone(),
                message: format!("odds must be a finite decimal > 1.0, got {}", self.odds),
            });
        }
        if self.popularity == 0 {
            return Err(EngineError::Data {
                entrant: self.name.clone(),
                message: "popularity rank must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Entrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}x, pop {})",
            self.number, self.name, self.odds, self.popularity
        )
    }
}

/// Race context handed to the longshot reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceContext {
    pub name: String,
    pub track: String,
    pub distance_m: u32,
    pub date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Zones & bet types
// ---------------------------------------------------------------------------

/// Discrete risk/value classification derived from odds and EV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Premium,
    Good,
    Caution,
    Avoid,
    Neutral,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Premium => write!(f, "premium"),
            Zone::Good => write!(f, "good"),
            Zone::Caution => write!(f, "caution"),
            Zone::Avoid => write!(f, "avoid"),
            Zone::Neutral => write!(f, "neutral"),
        }
    }
}

/// Supported wager types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    /// Single entrant to win.
    Win,
    /// Two entrants filling the first two places, either order.
    Quinella,
    /// Two entrants filling the first two places, exact order.
    Exacta,
    /// Three entrants filling the first three places, any order.
    Trio,
}

impl BetType {
    /// Number of entrants this bet type combines.
    pub fn entrant_count(&self) -> usize {
        match self {
            BetType::Win => 1,
            BetType::Quinella | BetType::Exacta => 2,
            BetType::Trio => 3,
        }
    }

    /// Finishing-order permutations the bet covers.
    pub fn permutations(&self) -> u32 {
        match self {
            BetType::Win => 1,
            BetType::Quinella => 2,
            BetType::Exacta => 1,
            BetType::Trio => 6,
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetType::Win => write!(f, "win"),
            BetType::Quinella => write!(f, "quinella"),
            BetType::Exacta => write!(f, "exacta"),
            BetType::Trio => write!(f, "trio"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scored output
// ---------------------------------------------------------------------------

/// An entrant after one scoring pass. Append-only: created by the
/// pipeline, consumed by the optimizer, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntrant {
    pub entrant: Entrant,
    /// Linear (primary) score, 0-100.
    pub primary: f64,
    /// Tree-ensemble (secondary) score, 0-100.
    pub secondary: f64,
    /// Blended + popularity-corrected score, 0-100.
    pub blended: f64,
    /// Calibrated win probability.
    pub win_probability: f64,
    pub expected_value: f64,
    pub zone: Zone,
}

/// A recommended wager. Created by the optimizer; immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetPattern {
    pub bet_type: BetType,
    /// Entrant numbers, in bet order.
    pub entrants: Vec<u32>,
    pub combined_odds: f64,
    pub expected_value: f64,
    /// Recommended stake, a multiple of the unit stake.
    pub stake: u32,
}

impl fmt::Display for BetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nums: Vec<String> = self.entrants.iter().map(|n| n.to_string()).collect();
        write!(
            f,
            "{} [{}] @ {:.1} (EV {:+.2}) stake {}",
            self.bet_type,
            nums.join("-"),
            self.combined_odds,
            self.expected_value,
            self.stake,
        )
    }
}

/// An entrant dropped from the run due to malformed data, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedEntrant {
    pub number: u32,
    pub name: String,
    pub reason: String,
}

/// Result of one evaluation run — the engine's sole public output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: uuid::Uuid,
    pub mode: Mode,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    /// Scored entrants, blended score descending.
    pub scored_entrants: Vec<ScoredEntrant>,
    pub bet_plan: Vec<BetPattern>,
    pub excluded: Vec<ExcludedEntrant>,
    pub total_staked: u32,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy.
///
/// Propagation rules: `Config` and `Scoring` abort the run; `Data` excludes
/// the entrant and the run continues; `InvalidCombination` skips the
/// pattern; `Budget` degrades to an empty betting plan.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error ({entrant}): {message}")]
    Data { entrant: String, message: String },

    #[error("Scoring contract violation: {0}")]
    Scoring(String),

    #[error("Invalid bet combination: {0}")]
    InvalidCombination(String),

    #[error("Budget {budget} below unit stake floor {floor}")]
    Budget { budget: u32, floor: u32 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_display_and_parse() {
        for mode in Mode::ALL {
            let parsed: Mode = mode.to_string().parse().unwrap();
            assert_eq!(*mode, parsed);
        }
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_parse_is_case_insensitive() {
        assert_eq!("TIER2".parse::<Mode>().unwrap(), Mode::Tier2);
        assert_eq!(" full ".parse::<Mode>().unwrap(), Mode::Full);
    }

    #[test]
    fn test_mode_serde_roundtrip() {
        for mode in Mode::ALL {
            let json = serde_json::to_string(mode).unwrap();
            let parsed: Mode = serde_json::from_str(&json).unwrap();
            assert_eq!(*mode, parsed);
        }
    }

    #[test]
    fn test_entrant_validate_rejects_bad_odds() {
        let mut e = Entrant {
            number: 1,
            name: "Test".into(),
            odds: 0.9,
            popularity: 1,
            class_rise: 0,
        };
        assert!(e.validate().is_err());
        e.odds = 1.0;
        assert!(e.validate().is_err());
        e.odds = f64::NAN;
        assert!(e.validate().is_err());
        e.odds = 2.5;
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_entrant_validate_rejects_zero_popularity() {
        let e = Entrant {
            number: 1,
            name: "Test".into(),
            odds: 2.5,
            popularity: 0,
            class_rise: 0,
        };
        assert!(matches!(e.validate(), Err(EngineError::Data { .. })));
    }

    #[test]
    fn test_bet_type_cardinality() {
        assert_eq!(BetType::Win.entrant_count(), 1);
        assert_eq!(BetType::Quinella.entrant_count(), 2);
        assert_eq!(BetType::Exacta.entrant_count(), 2);
        assert_eq!(BetType::Trio.entrant_count(), 3);
    }

    #[test]
    fn test_bet_type_permutations() {
        assert_eq!(BetType::Quinella.permutations(), 2);
        assert_eq!(BetType::Exacta.permutations(), 1);
        assert_eq!(BetType::Trio.permutations(), 6);
    }

    #[test]
    fn test_entrant_class_rise_defaults_to_zero() {
        let e: Entrant =
            serde_json::from_str(r#"{"number":5,"name":"A","odds":3.0,"popularity":2}"#).unwrap();
        assert_eq!(e.class_rise, 0);
    }

    #[test]
    fn test_zone_display() {
        assert_eq!(format!("{}", Zone::Premium), "premium");
        assert_eq!(format!("{}", Zone::Avoid), "avoid");
    }

    #[test]
    fn test_bet_pattern_display() {
        let p = BetPattern {
            bet_type: BetType::Quinella,
            entrants: vec![4, 7],
            combined_odds: 12.3,
            expected_value: 0.42,
            stake: 300,
        };
        let s = format!("{p}");
        assert!(s.contains("quinella"));
        assert!(s.contains("4-7"));
        assert!(s.contains("300"));
    }
}

//! Per-entrant feature vectors.
//!
//! Features arrive as normalized scalars in [0,1] from an external
//! provider. The key set is fixed and validated at the boundary:
//! unknown keys and out-of-range values are rejected with a data error,
//! while a feature that is merely absent fails closed to a neutral 0.5
//! at use-site.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::{EngineError, Entrant, Mode};

// ---------------------------------------------------------------------------
// Feature keys
// ---------------------------------------------------------------------------

/// The closed set of per-entrant features the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    PastPerformance,
    CourseFit,
    OddsValue,
    TrackCondition,
    WeightChange,
    Interval,
    LongshotFactor,
    FrontTendency,
    CloseTendency,
    /// Consumed only by the tree ensemble, never linearly weighted.
    JockeyRating,
}

pub const FEATURE_COUNT: usize = 10;

impl FeatureKey {
    pub const ALL: &'static [FeatureKey] = &[
        FeatureKey::PastPerformance,
        FeatureKey::CourseFit,
        FeatureKey::OddsValue,
        FeatureKey::TrackCondition,
        FeatureKey::WeightChange,
        FeatureKey::Interval,
        FeatureKey::LongshotFactor,
        FeatureKey::FrontTendency,
        FeatureKey::CloseTendency,
        FeatureKey::JockeyRating,
    ];

    /// Stable slot index into the backing array.
    pub fn index(&self) -> usize {
        match self {
            FeatureKey::PastPerformance => 0,
            FeatureKey::CourseFit => 1,
            FeatureKey::OddsValue => 2,
            FeatureKey::TrackCondition => 3,
            FeatureKey::WeightChange => 4,
            FeatureKey::Interval => 5,
            FeatureKey::LongshotFactor => 6,
            FeatureKey::FrontTendency => 7,
            FeatureKey::CloseTendency => 8,
            FeatureKey::JockeyRating => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::PastPerformance => "past_performance",
            FeatureKey::CourseFit => "course_fit",
            FeatureKey::OddsValue => "odds_value",
            FeatureKey::TrackCondition => "track_condition",
            FeatureKey::WeightChange => "weight_change",
            FeatureKey::Interval => "interval",
            FeatureKey::LongshotFactor => "longshot_factor",
            FeatureKey::FrontTendency => "front_tendency",
            FeatureKey::CloseTendency => "close_tendency",
            FeatureKey::JockeyRating => "jockey_rating",
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FeatureKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| EngineError::Config(format!("unknown feature key: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Feature vector
// ---------------------------------------------------------------------------

/// Neutral value substituted for a feature the provider did not supply.
pub const NEUTRAL_FEATURE: f64 = 0.5;

/// Fixed-slot mapping from `FeatureKey` to a normalized scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector {
    values: [Option<f64>; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one feature, validating the [0,1] normalization contract.
    pub fn set(&mut self, key: FeatureKey, value: f64) -> Result<(), EngineError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(EngineError::Data {
                entrant: String::new(),
                message: format!("feature {key} out of [0,1]: {value}"),
            });
        }
        self.values[key.index()] = Some(value);
        Ok(())
    }

    pub fn get(&self, key: FeatureKey) -> Option<f64> {
        self.values[key.index()]
    }

    /// Value for scoring: missing features fail closed to 0.5.
    pub fn get_or_neutral(&self, key: FeatureKey) -> f64 {
        self.values[key.index()].unwrap_or(NEUTRAL_FEATURE)
    }

    pub fn is_present(&self, key: FeatureKey) -> bool {
        self.values[key.index()].is_some()
    }

    /// Build from a string-keyed map (the external-provider boundary).
    /// Unknown keys are rejected here, not at use-site.
    pub fn from_map(entrant: &str, map: &HashMap<String, f64>) -> Result<Self, EngineError> {
        let mut fv = FeatureVector::new();
        for (name, &value) in map {
            let key: FeatureKey = name.parse().map_err(|_| EngineError::Data {
                entrant: entrant.to_string(),
                message: format!("unknown feature key: {name}"),
            })?;
            fv.set(key, value).map_err(|e| match e {
                EngineError::Data { message, .. } => EngineError::Data {
                    entrant: entrant.to_string(),
                    message,
                },
                other => other,
            })?;
        }
        Ok(fv)
    }

    /// Fingerprint of the input data for cache keying: feature bit
    /// patterns plus the raw odds. Identical inputs always hash
    /// identically within a process.
    pub fn fingerprint(&self, odds: f64) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for slot in &self.values {
            match slot {
                Some(v) => {
                    1u8.hash(&mut hasher);
                    v.to_bits().hash(&mut hasher);
                }
                None => 0u8.hash(&mut hasher),
            }
        }
        odds.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

// ---------------------------------------------------------------------------
// Feature provider
// ---------------------------------------------------------------------------

/// External collaborator supplying normalized features per entrant.
/// A `Data` error excludes that entrant from scoring; it never aborts
/// the run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    async fn features(&self, entrant: &Entrant, mode: Mode) -> Result<FeatureVector, EngineError>;
}

/// Provider backed by a pre-extracted per-entrant feature table
/// (race files, tests).
pub struct InMemoryFeatureProvider {
    by_number: HashMap<u32, FeatureVector>,
}

impl InMemoryFeatureProvider {
    pub fn new(by_number: HashMap<u32, FeatureVector>) -> Self {
        Self { by_number }
    }
}

#[async_trait]
impl FeatureProvider for InMemoryFeatureProvider {
    async fn features(&self, entrant: &Entrant, _mode: Mode) -> Result<FeatureVector, EngineError> {
        self.by_number
            .get(&entrant.number)
            .cloned()
            .ok_or_else(|| EngineError::Data {
                entrant: entrant.name.clone(),
                message: "no feature data for entrant".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

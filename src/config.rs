//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs,
//! then converts them into the engine's validated runtime configs.
//! Every section has defaults so a minimal file still works.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use crate::betting::BettingConfig;
use crate::engine::EvaluatorConfig;
use crate::ev::CalibrationConfig;
use crate::features::FeatureKey;
use crate::scoring::linear::ClassPenaltyConfig;
use crate::scoring::popularity::CorrectorConfig;
use crate::scoring::weights::TierWeightProfile;
use crate::types::Mode;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub betting: BettingSection,
    #[serde(default)]
    pub corrector: CorrectorSection,
    #[serde(default)]
    pub calibration: CalibrationSection,
    #[serde(default)]
    pub class_penalty: ClassPenaltySection,
    #[serde(default)]
    pub model: ModelSection,
    /// Optional override of the built-in linear weight table,
    /// feature name -> weight.
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSection {
    pub default_mode: String,
    pub budget: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            default_mode: "tier2".to_string(),
            budget: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BettingSection {
    pub unit_stake: u32,
    pub max_bet_share: f64,
}

impl Default for BettingSection {
    fn default() -> Self {
        let d = BettingConfig::default();
        Self {
            unit_stake: d.unit_stake,
            max_bet_share: d.max_share,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorrectorSection {
    pub rank_threshold: u32,
    pub bonus_cap: f64,
    pub lookup_timeout_ms: u64,
}

impl Default for CorrectorSection {
    fn default() -> Self {
        let d = CorrectorConfig::default();
        Self {
            rank_threshold: d.rank_threshold,
            bonus_cap: d.bonus_cap,
            lookup_timeout_ms: d.lookup_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationSection {
    pub scale: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        let d = CalibrationConfig::default();
        Self {
            scale: d.scale,
            floor: d.floor,
            ceiling: d.ceiling,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassPenaltySection {
    pub tolerance: u32,
    pub points_per_grade: f64,
    pub cap: f64,
}

impl Default for ClassPenaltySection {
    fn default() -> Self {
        let d = ClassPenaltyConfig::default();
        Self {
            tolerance: d.tolerance,
            points_per_grade: d.points_per_grade,
            cap: d.cap,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelSection {
    /// Path to a versioned ensemble parameter file. The built-in
    /// ensemble is used when absent.
    pub params_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Mode to run when the CLI does not name one.
    pub fn default_mode(&self) -> Result<Mode> {
        Ok(self.engine.default_mode.parse()?)
    }

    /// Validate and convert into the engine's runtime configuration.
    pub fn evaluator_config(&self) -> Result<EvaluatorConfig> {
        let custom_weights = match &self.weights {
            Some(map) => {
                let mut weights = Vec::with_capacity(map.len());
                for (name, &w) in map {
                    let key: FeatureKey = name
                        .parse()
                        .with_context(|| format!("Invalid [weights] entry: {name}"))?;
                    weights.push((key, w));
                }
                // Validate eagerly so a bad table fails at startup, not
                // mid-run. Mode is irrelevant to the weight checks.
                TierWeightProfile::custom(Mode::Tier2, weights.clone())
                    .context("Invalid [weights] table")?;
                Some(weights)
            }
            None => None,
        };

        Ok(EvaluatorConfig {
            betting: BettingConfig {
                unit_stake: self.betting.unit_stake,
                max_share: self.betting.max_bet_share,
            },
            calibration: CalibrationConfig {
                scale: self.calibration.scale,
                floor: self.calibration.floor,
                ceiling: self.calibration.ceiling,
            },
            corrector: CorrectorConfig {
                rank_threshold: self.corrector.rank_threshold,
                bonus_cap: self.corrector.bonus_cap,
                lookup_timeout: Duration::from_millis(self.corrector.lookup_timeout_ms),
            },
            class_penalty: ClassPenaltyConfig {
                tolerance: self.class_penalty.tolerance,
                points_per_grade: self.class_penalty.points_per_grade,
                cap: self.class_penalty.cap,
            },
            custom_weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.engine.budget, 1000);
        assert_eq!(cfg.default_mode().unwrap(), Mode::Tier2);
        let ec = cfg.evaluator_config().unwrap();
        assert_eq!(ec.betting.unit_stake, 100);
        assert!((ec.betting.max_share - 0.30).abs() < 1e-12);
        assert!(ec.custom_weights.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
            [engine]
            default_mode = "full"
            budget = 5000

            [betting]
            unit_stake = 200
            max_bet_share = 0.25

            [corrector]
            rank_threshold = 10
            bonus_cap = 3.0
            lookup_timeout_ms = 500

            [calibration]
            scale = 0.35
            floor = 0.02
            ceiling = 0.55

            [class_penalty]
            tolerance = 1
            points_per_grade = 4.0
            cap = 12.0

            [model]
            params_path = "model/ensemble.json"
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.default_mode().unwrap(), Mode::Full);
        assert_eq!(cfg.engine.budget, 5000);
        let ec = cfg.evaluator_config().unwrap();
        assert_eq!(ec.betting.unit_stake, 200);
        assert_eq!(ec.corrector.rank_threshold, 10);
        assert_eq!(ec.corrector.lookup_timeout, Duration::from_millis(500));
        assert!((ec.calibration.scale - 0.35).abs() < 1e-12);
        assert_eq!(ec.class_penalty.tolerance, 1);
        assert_eq!(cfg.model.params_path.as_deref(), Some("model/ensemble.json"));
    }

    #[test]
    fn test_custom_weights_are_validated() {
        let bad = r#"
            [weights]
            past_performance = 0.5
            course_fit = 0.4
        "#;
        let cfg: AppConfig = toml::from_str(bad).unwrap();
        assert!(cfg.evaluator_config().is_err());

        let good = r#"
            [weights]
            past_performance = 0.6
            course_fit = 0.4
        "#;
        let cfg: AppConfig = toml::from_str(good).unwrap();
        let ec = cfg.evaluator_config().unwrap();
        assert_eq!(ec.custom_weights.unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_weight_key_is_rejected() {
        let toml = r#"
            [weights]
            stride_length = 1.0
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert!(cfg.evaluator_config().is_err());
    }

    #[test]
    fn test_bad_mode_string_is_rejected() {
        let cfg: AppConfig = toml::from_str("[engine]\ndefault_mode = \"turbo\"\nbudget = 100")
            .unwrap();
        assert!(cfg.default_mode().is_err());
    }
}

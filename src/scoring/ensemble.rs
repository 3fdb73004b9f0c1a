//! Tree ensemble — the secondary score.
//!
//! A small bagged ensemble of shallow regression trees over recent form,
//! course fit, jockey rating, and log-scaled odds. Trees are trained
//! offline and loaded as a versioned parameter blob; this module only
//! evaluates them.
//!
//! Trees live in a flat arena of nodes with index-based child pointers.
//! Children always point forward (child index > node index), which keeps
//! the structure acyclic by construction and the walk bounded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::features::{FeatureKey, FeatureVector};
use crate::types::EngineError;

// ---------------------------------------------------------------------------
// Parameter blob
// ---------------------------------------------------------------------------

/// Features a tree split may test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeFeature {
    PastPerformance,
    CourseFit,
    JockeyRating,
    /// Log-scaled market odds, (ln(odds + 1) - 1) / 2.
    OddsLog,
}

fn default_true() -> bool {
    true
}

/// One arena node. `left`/`right` are indices into the tree's node
/// vector; a missing input routes to the split's default branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        /// Predicted win-likelihood in [0,1].
        value: f64,
    },
    Split {
        feature: TreeFeature,
        threshold: f64,
        left: u16,
        right: u16,
        #[serde(default = "default_true")]
        default_left: bool,
    },
}

/// A single regression tree; root at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk the tree for one entrant. Inputs are `None` when the
    /// feature is absent from the vector.
    fn predict(&self, input: &TreeInput) -> f64 {
        let mut idx = 0usize;
        // Forward-only children bound the walk by the node count.
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let next = match input.get(*feature) {
                        Some(v) if v <= *threshold => *left,
                        Some(_) => *right,
                        None => {
                            if *default_left {
                                *left
                            } else {
                                *right
                            }
                        }
                    };
                    idx = next as usize;
                }
            }
        }
        // Unreachable for validated parameters.
        0.5
    }
}

/// Versioned ensemble parameters: the trees plus the blend ratio the
/// score blender applies downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub version: u32,
    /// Blend weight of the linear (primary) score; documented tunable.
    pub linear_weight: f64,
    /// Blend weight of the ensemble (secondary) score.
    pub ensemble_weight: f64,
    pub trees: Vec<Tree>,
}

impl EnsembleParams {
    /// Load the blob from disk. Corruption or a missing file is fatal
    /// at startup, never mid-run.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ensemble parameters: {path}"))?;
        let params: EnsembleParams = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse ensemble parameters: {path}"))?;
        params.validate()?;
        Ok(params)
    }

    /// Structural validation of an untrusted blob.
    pub fn validate(&self) -> Result<(), EngineError> {
        let blend = self.linear_weight + self.ensemble_weight;
        if self.linear_weight < 0.0 || self.ensemble_weight < 0.0 || (blend - 1.0).abs() > 1e-6 {
            return Err(EngineError::Config(format!(
                "blend ratio {}/{} must be non-negative and sum to 1.0",
                self.linear_weight, self.ensemble_weight
            )));
        }
        if self.trees.is_empty() {
            return Err(EngineError::Config("ensemble has no trees".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(EngineError::Config(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Leaf { value } => {
                        if !value.is_finite() || !(0.0..=1.0).contains(value) {
                            return Err(EngineError::Config(format!(
                                "tree {t} node {i}: leaf value {value} outside [0,1]"
                            )));
                        }
                    }
                    Node::Split {
                        left,
                        right,
                        threshold,
                        ..
                    } => {
                        if !threshold.is_finite() {
                            return Err(EngineError::Config(format!(
                                "tree {t} node {i}: non-finite threshold"
                            )));
                        }
                        for child in [*left as usize, *right as usize] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(EngineError::Config(format!(
                                    "tree {t} node {i}: child {child} must point forward within the arena"
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Compiled-in default parameter set, used when no blob path is
    /// configured. Ten trees, depth <= 4.
    pub fn builtin() -> Self {
        fn leaf(value: f64) -> Node {
            Node::Leaf { value }
        }
        fn split(feature: TreeFeature, threshold: f64, left: u16, right: u16) -> Node {
            Node::Split {
                feature,
                threshold,
                left,
                right,
                default_left: true,
            }
        }
        use TreeFeature::*;

        let trees = vec![
            // Recent form dominates; course fit refines the strong half.
            Tree {
                nodes: vec![
                    split(PastPerformance, 0.55, 1, 2),
                    split(CourseFit, 0.45, 3, 4),
                    split(CourseFit, 0.60, 5, 6),
                    leaf(0.22),
                    leaf(0.38),
                    leaf(0.58),
                    leaf(0.80),
                ],
            },
            Tree {
                nodes: vec![
                    split(PastPerformance, 0.40, 1, 2),
                    leaf(0.25),
                    split(JockeyRating, 0.55, 3, 4),
                    leaf(0.52),
                    leaf(0.70),
                ],
            },
            Tree {
                nodes: vec![
                    split(CourseFit, 0.50, 1, 2),
                    split(OddsLog, 0.65, 3, 4),
                    split(PastPerformance, 0.70, 5, 6),
                    leaf(0.40),
                    leaf(0.28),
                    leaf(0.60),
                    leaf(0.85),
                ],
            },
            Tree {
                nodes: vec![
                    split(OddsLog, 0.35, 1, 2),
                    split(PastPerformance, 0.50, 3, 4),
                    split(PastPerformance, 0.60, 5, 6),
                    leaf(0.45),
                    leaf(0.72),
                    leaf(0.30),
                    leaf(0.55),
                ],
            },
            Tree {
                nodes: vec![
                    split(JockeyRating, 0.60, 1, 2),
                    split(PastPerformance, 0.55, 3, 4),
                    split(PastPerformance, 0.55, 5, 6),
                    leaf(0.32),
                    leaf(0.56),
                    leaf(0.48),
                    leaf(0.74),
                ],
            },
            Tree {
                nodes: vec![
                    split(PastPerformance, 0.65, 1, 2),
                    split(OddsLog, 0.50, 3, 4),
                    leaf(0.78),
                    leaf(0.44),
                    leaf(0.33),
                ],
            },
            Tree {
                nodes: vec![
                    split(CourseFit, 0.35, 1, 2),
                    leaf(0.27),
                    split(CourseFit, 0.70, 3, 4),
                    leaf(0.50),
                    leaf(0.68),
                ],
            },
            Tree {
                nodes: vec![
                    split(PastPerformance, 0.45, 1, 2),
                    split(JockeyRating, 0.40, 3, 4),
                    split(CourseFit, 0.55, 5, 6),
                    leaf(0.20),
                    leaf(0.36),
                    leaf(0.54),
                    leaf(0.76),
                ],
            },
            Tree {
                nodes: vec![
                    split(OddsLog, 0.55, 1, 2),
                    split(CourseFit, 0.50, 3, 4),
                    leaf(0.35),
                    leaf(0.46),
                    leaf(0.66),
                ],
            },
            Tree {
                nodes: vec![
                    split(PastPerformance, 0.50, 1, 2),
                    split(CourseFit, 0.50, 3, 4),
                    split(JockeyRating, 0.65, 5, 6),
                    leaf(0.24),
                    leaf(0.42),
                    leaf(0.58),
                    leaf(0.82),
                ],
            },
        ];

        let params = Self {
            version: 1,
            linear_weight: 0.7,
            ensemble_weight: 0.3,
            trees,
        };
        debug_assert!(params.validate().is_ok());
        params
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Resolved tree inputs for one entrant.
struct TreeInput {
    past_performance: Option<f64>,
    course_fit: Option<f64>,
    jockey_rating: Option<f64>,
    odds_log: f64,
}

impl TreeInput {
    fn get(&self, feature: TreeFeature) -> Option<f64> {
        match feature {
            TreeFeature::PastPerformance => self.past_performance,
            TreeFeature::CourseFit => self.course_fit,
            TreeFeature::JockeyRating => self.jockey_rating,
            TreeFeature::OddsLog => Some(self.odds_log),
        }
    }
}

/// Evaluates the fixed ensemble. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    params: EnsembleParams,
}

impl TreeEnsemble {
    pub fn new(params: EnsembleParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EnsembleParams {
        &self.params
    }

    /// Mean of per-tree leaf values, scaled to [0,100].
    pub fn score(&self, features: &FeatureVector, odds: f64) -> f64 {
        let input = TreeInput {
            past_performance: features.get(FeatureKey::PastPerformance),
            course_fit: features.get(FeatureKey::CourseFit),
            jockey_rating: features.get(FeatureKey::JockeyRating),
            odds_log: ((odds + 1.0).ln() - 1.0) / 2.0,
        };
        let sum: f64 = self.params.trees.iter().map(|t| t.predict(&input)).sum();
        (sum / self.params.trees.len() as f64 * 100.0).clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(past: f64, course: f64, jockey: f64) -> FeatureVector {
        let mut fv = FeatureVector::new();
        fv.set(FeatureKey::PastPerformance, past).unwrap();
        fv.set(FeatureKey::CourseFit, course).unwrap();
        fv.set(FeatureKey::JockeyRating, jockey).unwrap();
        fv
    }

    #[test]
    fn test_builtin_params_validate() {
        assert!(EnsembleParams::builtin().validate().is_ok());
        assert_eq!(EnsembleParams::builtin().version, 1);
    }

    #[test]
    fn test_score_in_range_and_deterministic() {
        let ensemble = TreeEnsemble::new(EnsembleParams::builtin());
        for (p, c, j, odds) in [
            (0.0, 0.0, 0.0, 1.1),
            (0.5, 0.5, 0.5, 5.0),
            (1.0, 1.0, 1.0, 50.0),
            (0.9, 0.2, 0.7, 12.0),
        ] {
            let a = ensemble.score(&vector(p, c, j), odds);
            let b = ensemble.score(&vector(p, c, j), odds);
            assert!((0.0..=100.0).contains(&a));
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_strong_form_scores_above_weak_form() {
        let ensemble = TreeEnsemble::new(EnsembleParams::builtin());
        let strong = ensemble.score(&vector(0.9, 0.85, 0.8), 3.0);
        let weak = ensemble.score(&vector(0.15, 0.2, 0.3), 3.0);
        assert!(strong > weak, "strong {strong} <= weak {weak}");
    }

    #[test]
    fn test_missing_feature_routes_to_default_branch() {
        let tree = Tree {
            nodes: vec![
                Node::Split {
                    feature: TreeFeature::JockeyRating,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                    default_left: false,
                },
                Node::Leaf { value: 0.2 },
                Node::Leaf { value: 0.8 },
            ],
        };
        let input = TreeInput {
            past_performance: None,
            course_fit: None,
            jockey_rating: None,
            odds_log: 0.0,
        };
        assert_eq!(tree.predict(&input), 0.8);
    }

    #[test]
    fn test_ensemble_tolerates_missing_features() {
        let ensemble = TreeEnsemble::new(EnsembleParams::builtin());
        let score = ensemble.score(&FeatureVector::new(), 8.0);
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_validate_rejects_backward_pointer() {
        let params = EnsembleParams {
            version: 1,
            linear_weight: 0.7,
            ensemble_weight: 0.3,
            trees: vec![Tree {
                nodes: vec![
                    Node::Split {
                        feature: TreeFeature::CourseFit,
                        threshold: 0.5,
                        left: 0, // cycle
                        right: 1,
                        default_left: true,
                    },
                    Node::Leaf { value: 0.5 },
                ],
            }],
        };
        assert!(matches!(params.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_leaf() {
        let params = EnsembleParams {
            version: 1,
            linear_weight: 0.7,
            ensemble_weight: 0.3,
            trees: vec![Tree {
                nodes: vec![Node::Leaf { value: 1.4 }],
            }],
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_blend_ratio() {
        let mut params = EnsembleParams::builtin();
        params.linear_weight = 0.8;
        assert!(matches!(params.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_params_serde_roundtrip() {
        let params = EnsembleParams::builtin();
        let json = serde_json::to_string(&params).unwrap();
        let parsed: EnsembleParams = serde_json::from_str(&json).unwrap();
        parsed.validate().unwrap();
        assert_eq!(parsed.trees.len(), params.trees.len());

        let ensemble_a = TreeEnsemble::new(params);
        let ensemble_b = TreeEnsemble::new(parsed);
        let fv = vector(0.6, 0.4, 0.9);
        assert_eq!(
            ensemble_a.score(&fv, 7.5).to_bits(),
            ensemble_b.score(&fv, 7.5).to_bits()
        );
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        assert!(EnsembleParams::load("/nonexistent/params.json").is_err());
    }
}

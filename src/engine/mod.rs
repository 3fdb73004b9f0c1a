//! Evaluation engine — the validate → score → price → allocate pipeline.

pub mod evaluator;

pub use evaluator::{Evaluator, EvaluatorConfig};

//! PADDOCK — Scoring & Ensemble Decision Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod betting;
pub mod cache;
pub mod config;
pub mod engine;
pub mod ev;
pub mod features;
pub mod odds;
pub mod scoring;
pub mod types;

//! PADDOCK — Scoring & Ensemble Decision Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! reads a race file, runs one evaluation and prints the ranked field
//! and the recommended bet plan.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use paddock::config::AppConfig;
use paddock::engine::Evaluator;
use paddock::features::{FeatureVector, InMemoryFeatureProvider};
use paddock::scoring::ensemble::EnsembleParams;
use paddock::scoring::popularity::{LongshotRecord, StaticLongshotReference};
use paddock::types::{Entrant, EvaluationReport, Mode, RaceContext};

const BANNER: &str = r#"
 ____   _    ____  ____   ___   ____ _  __
|  _ \ / \  |  _ \|  _ \ / _ \ / ___| |/ /
| |_) / _ \ | | | | | | | | | | |   | ' /
|  __/ ___ \| |_| | |_| | |_| | |___| . \
|_| /_/   \_\____/|____/ \___/ \____|_|\_\

  Scoring & Ensemble Decision Engine
  v0.1.0
"#;

/// On-disk race file: context, field, per-entrant features, and an
/// optional longshot-history table.
#[derive(Debug, Deserialize)]
struct RaceFile {
    race: RaceContext,
    entrants: Vec<Entrant>,
    /// Entrant number (as a JSON key) -> feature name -> value.
    features: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    longshots: HashMap<String, LongshotEntry>,
    /// Overrides the configured budget when present.
    #[serde(default)]
    budget: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LongshotEntry {
    qualifies: bool,
    bonus: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml").unwrap_or_else(|_| {
        // No config file means defaults across the board.
        toml::from_str("").expect("empty config must parse")
    });

    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: {} <race.json> [tier1|tier2|tier3|full]", args[0]);
    }
    let mode: Mode = match args.get(2) {
        Some(s) => s.parse()?,
        None => cfg.default_mode()?,
    };

    println!("{BANNER}");
    info!(race_file = %args[1], mode = %mode, "Starting evaluation");

    let race_file = load_race_file(&args[1])?;
    let budget = race_file.budget.unwrap_or(cfg.engine.budget);

    // Ensemble parameters: versioned file if configured, else built-in.
    let params = match &cfg.model.params_path {
        Some(path) => {
            let params = EnsembleParams::load(path)?;
            info!(path = %path, version = params.version, "Loaded ensemble parameters");
            params
        }
        None => EnsembleParams::builtin(),
    };

    let provider = build_provider(&race_file)?;
    let longshots = build_longshot_reference(&race_file);

    let evaluator = Evaluator::new(
        Arc::new(provider),
        Arc::new(longshots),
        params,
        cfg.evaluator_config()?,
    )?;

    let report = evaluator
        .evaluate(&race_file.race, &race_file.entrants, mode, budget)
        .await?;

    print_report(&race_file.race, &report);
    Ok(())
}

fn load_race_file(path: &str) -> Result<RaceFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read race file: {path}"))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse race file: {path}"))
}

/// Convert the race file's feature tables into a provider.
fn build_provider(race_file: &RaceFile) -> Result<InMemoryFeatureProvider> {
    let mut by_number = HashMap::with_capacity(race_file.features.len());
    for (number, map) in &race_file.features {
        let number: u32 = number
            .parse()
            .with_context(|| format!("Invalid entrant number in features: {number}"))?;
        let name = race_file
            .entrants
            .iter()
            .find(|e| e.number == number)
            .map(|e| e.name.as_str())
            .unwrap_or("unknown");
        let fv = FeatureVector::from_map(name, map)?;
        by_number.insert(number, fv);
    }
    Ok(InMemoryFeatureProvider::new(by_number))
}

fn build_longshot_reference(race_file: &RaceFile) -> StaticLongshotReference {
    let by_name = race_file
        .longshots
        .iter()
        .map(|(name, entry)| {
            (
                name.clone(),
                LongshotRecord {
                    qualifies: entry.qualifies,
                    bonus: entry.bonus,
                },
            )
        })
        .collect();
    StaticLongshotReference::new(by_name)
}

/// Print the ranked field and the bet plan.
fn print_report(race: &RaceContext, report: &EvaluationReport) {
    println!(
        "\n{} — {} {}m — {} [{}]",
        race.name, race.track, race.distance_m, race.date, report.mode
    );
    println!("run {}\n", report.run_id);

    println!(
        "{:<4} {:<20} {:>6} {:>7} {:>7} {:>7} {:>6} {:>7}  {}",
        "#", "name", "odds", "prim", "sec", "score", "p(win)", "EV", "zone"
    );
    for s in &report.scored_entrants {
        println!(
            "{:<4} {:<20} {:>6.1} {:>7.2} {:>7.2} {:>7.2} {:>6.3} {:>+7.2}  {}",
            s.entrant.number,
            s.entrant.name,
            s.entrant.odds,
            s.primary,
            s.secondary,
            s.blended,
            s.win_probability,
            s.expected_value,
            s.zone,
        );
    }

    if !report.excluded.is_empty() {
        println!("\nexcluded:");
        for e in &report.excluded {
            println!("  #{} {} — {}", e.number, e.name, e.reason);
        }
    }

    if report.bet_plan.is_empty() {
        println!("\nno bets recommended");
    } else {
        println!("\nbet plan (total {}):", report.total_staked);
        for bet in &report.bet_plan {
            println!("  {bet}");
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("paddock=info"));

    let json_logging = std::env::var("PADDOCK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}

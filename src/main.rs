//! ORACLE/TESSERACT — football match-outcome prediction engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the data/LLM/storage collaborators into the pipeline, runs one
//! context-adjusted analysis for the requested matchup, and prints it.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use oracle_tesseract::config::{ApiCredentials, AppConfig};
use oracle_tesseract::data::api_football::ApiFootballClient;
use oracle_tesseract::data::SportsDataProvider;
use oracle_tesseract::engine::OracleEngine;
use oracle_tesseract::llm::openrouter::OpenRouterClient;
use oracle_tesseract::llm::QualitativeAnalyst;
use oracle_tesseract::storage::sqlite::SqliteStore;
use oracle_tesseract::types::OracleAnalysis;

const BANNER: &str = r#"
  ___  ____      _    ____ _     _____
 / _ \|  _ \    / \  / ___| |   | ____|
| | | | |_) |  / _ \| |   | |   |  _|
| |_| |  _ <  / ___ \ |___| |___| |___
 \___/|_| \_\/_/   \_\____|_____|_____|
        T E S S E R A C T
  Match Outcome Prediction Engine v0.1.0
"#;

/// `oracle-tesseract <league_id> <season> <home_team_id> <away_team_id> [fixture_id]`
struct CliArgs {
    league_id: u32,
    season: u32,
    home_team_id: u32,
    away_team_id: u32,
    fixture_id: Option<i64>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        if args.len() < 4 || args.len() > 5 {
            anyhow::bail!(
                "usage: oracle-tesseract <league_id> <season> <home_team_id> <away_team_id> [fixture_id]"
            );
        }
        Ok(Self {
            league_id: args[0].parse().context("league_id must be an integer")?,
            season: args[1].parse().context("season must be an integer")?,
            home_team_id: args[2].parse().context("home_team_id must be an integer")?,
            away_team_id: args[3].parse().context("away_team_id must be an integer")?,
            fixture_id: match args.get(4) {
                Some(raw) => Some(raw.parse().context("fixture_id must be an integer")?),
                None => None,
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");

    let args = CliArgs::parse()?;
    let creds = ApiCredentials::from_config(&cfg);
    if !creds.is_complete() {
        warn!(
            missing = ?creds.missing(),
            "Running degraded: analysis will fall back to defaults where keys are missing"
        );
    }

    // -- Collaborators ----------------------------------------------------

    let provider: Option<Arc<dyn SportsDataProvider>> = match creds.sports {
        Some(key) => Some(Arc::new(ApiFootballClient::new(key)?)),
        None => None,
    };

    let analyst: Option<Arc<dyn QualitativeAnalyst>> = match creds.llm {
        Some(key) => {
            if cfg.llm.provider != "openrouter" {
                warn!(provider = %cfg.llm.provider, "Unknown LLM provider, defaulting to OpenRouter");
            }
            info!(
                model = %cfg.llm.model,
                fallback = ?cfg.llm.fallback_model,
                "Using OpenRouter LLM provider"
            );
            Some(Arc::new(OpenRouterClient::new(
                key,
                Some(cfg.llm.model.clone()),
                cfg.llm.fallback_model.clone(),
                Some(cfg.llm.max_tokens),
            )?))
        }
        None => None,
    };

    let store = Arc::new(SqliteStore::open(&cfg.storage.database_path).await?);

    let engine = OracleEngine::new(provider, analyst, store.clone(), store, &cfg.engine);

    // -- Analysis ---------------------------------------------------------

    info!(
        league_id = args.league_id,
        season = args.season,
        home_team_id = args.home_team_id,
        away_team_id = args.away_team_id,
        fixture_id = ?args.fixture_id,
        "Running analysis"
    );

    let analysis = engine
        .get_context_adjusted_oracle_analysis(
            args.league_id,
            args.season,
            args.home_team_id,
            args.away_team_id,
            args.fixture_id,
        )
        .await;

    print_analysis(&analysis);
    Ok(())
}

fn print_analysis(analysis: &OracleAnalysis) {
    println!("Prediction : {}", analysis.prediction);
    println!("Confidence : {}%", analysis.confidence);
    println!(
        "Power      : {:.1} (home) vs {:.1} (away)",
        analysis.home_power_score, analysis.away_power_score,
    );
    println!(
        "Standings  : {} (weight {:.0}%)",
        analysis.standings_source,
        analysis.confidence_adjustment * 100.0,
    );
    if let Some(t) = &analysis.tesseract {
        println!("Simulation : {t}");
    }
    if let Some(grade) = &analysis.llm_grade_enhancement {
        println!(
            "Risk       : {} (context score {:.1}/10, {} factors)",
            grade.overall_risk_level,
            grade.overall_context_score,
            grade.context_factors.len(),
        );
        for factor in &grade.context_factors {
            println!("  - [{}] {} (weight {:.2})", factor.kind, factor.description, factor.weight);
        }
    }
    println!("Reasoning  : {}", analysis.reasoning);
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oracle_tesseract=info"));

    let json_logging = std::env::var("ORACLE_LOG_JSON").is_ok();

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

//! Pipeline composition.
//!
//! `OracleEngine` owns the stage objects and exposes the two public
//! entry points. Both are total from the caller's perspective: internal
//! failures degrade stage by stage, and a truly unexpected failure at
//! the top level becomes a terminal `OracleAnalysis` with
//! `prediction = "Error"` and zero confidence.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use super::adjuster::{self, FormCategory};
use super::grading::LlmGrader;
use super::ledger::PredictionLedger;
use super::power;
use super::standings::{ResolvedStandings, StandingsResolver};
use super::tesseract;
use super::trinity::{synthetic_fixture_id, TrinityEngine};
use crate::config::EngineConfig;
use crate::data::SportsDataProvider;
use crate::llm::{MatchBrief, QualitativeAnalyst};
use crate::storage::{LedgerStore, MetricsCacheStore};
use crate::types::OracleAnalysis;

pub struct OracleEngine {
    resolver: StandingsResolver,
    trinity: TrinityEngine,
    grader: LlmGrader,
    ledger: PredictionLedger,
}

impl OracleEngine {
    /// Wire the pipeline. Absent provider or analyst are valid states;
    /// the affected stages degrade to their documented defaults.
    /// Must be called from within a tokio runtime (the ledger spawns its
    /// writer task here).
    pub fn new(
        provider: Option<Arc<dyn SportsDataProvider>>,
        analyst: Option<Arc<dyn QualitativeAnalyst>>,
        cache: Arc<dyn MetricsCacheStore>,
        ledger_store: Arc<dyn LedgerStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            resolver: StandingsResolver::new(provider.clone(), config.recent_form_window),
            trinity: TrinityEngine::new(
                cache,
                provider,
                analyst.clone(),
                chrono::Duration::minutes(config.trinity_cache_ttl_mins),
                config.recent_form_window,
            ),
            grader: LlmGrader::new(analyst),
            ledger: PredictionLedger::new(ledger_store),
        }
    }

    /// Base analysis: standings, power, context, simulation. No grading
    /// or bias correction.
    pub async fn get_oracle_analysis(
        &self,
        league_id: u32,
        season: u32,
        home_team_id: u32,
        away_team_id: u32,
        fixture_id: Option<i64>,
    ) -> OracleAnalysis {
        match self
            .run(league_id, season, home_team_id, away_team_id, fixture_id, false)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(home_team_id, away_team_id, error = %e, "Analysis failed");
                OracleAnalysis::error(format!("Analysis failed: {e}"))
            }
        }
    }

    /// Full analysis: base pipeline plus LLMGRADE grading and the
    /// bias-corrected adjustment.
    pub async fn get_context_adjusted_oracle_analysis(
        &self,
        league_id: u32,
        season: u32,
        home_team_id: u32,
        away_team_id: u32,
        fixture_id: Option<i64>,
    ) -> OracleAnalysis {
        match self
            .run(league_id, season, home_team_id, away_team_id, fixture_id, true)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(home_team_id, away_team_id, error = %e, "Context-adjusted analysis failed");
                OracleAnalysis::error(format!("Analysis failed: {e}"))
            }
        }
    }

    async fn run(
        &self,
        league_id: u32,
        season: u32,
        home_team_id: u32,
        away_team_id: u32,
        fixture_id: Option<i64>,
        with_adjustment: bool,
    ) -> Result<OracleAnalysis> {
        let resolved = self
            .resolver
            .resolve(league_id, season, home_team_id, away_team_id)
            .await;
        let adjustment = resolved.combined_adjustment();

        // Power and Trinity are independent; run them side by side.
        let (powers, context) = tokio::join!(
            async {
                power::calculate(&resolved.home.snapshot, &resolved.away.snapshot, adjustment)
            },
            self.trinity
                .compute_context(fixture_id, home_team_id, away_team_id, season),
        );

        // Power units halve into simulator attack-strength units.
        let tesseract_result = tesseract::simulate_match(
            powers.home_power_score / 2.0,
            powers.away_power_score / 2.0,
            &context,
        );

        let reasoning = format!(
            "Power {:.1} vs {:.1} (seed {}). Standings via {} ({:.0}% weight). Context: {}",
            powers.home_power_score,
            powers.away_power_score,
            powers.prediction_seed,
            resolved.worst_source(),
            adjustment * 100.0,
            context.reasoning,
        );

        let mut analysis = OracleAnalysis {
            home_power_score: powers.home_power_score,
            away_power_score: powers.away_power_score,
            prediction: tesseract_result.most_likely_score.clone(),
            confidence: powers.confidence,
            reasoning,
            standings_source: resolved.worst_source(),
            confidence_adjustment: adjustment,
            tesseract: Some(tesseract_result.clone()),
            simulation_context: Some(context),
            llm_grade_enhancement: None,
        };

        let effective_fixture_id = fixture_id
            .filter(|id| *id > 0)
            .unwrap_or_else(|| synthetic_fixture_id(home_team_id, away_team_id));

        if with_adjustment {
            let brief = grading_brief(effective_fixture_id, season, &resolved, &analysis);
            let grade = self.grader.grade(&brief, &tesseract_result, false).await;

            let factors = grade
                .as_ref()
                .map(|g| g.context_factors.as_slice())
                .unwrap_or(&[]);
            let adjusted = adjuster::adjust(
                &tesseract_result,
                analysis.confidence,
                &analysis.reasoning,
                factors,
            );

            let favored = if analysis.power_differential() >= 0.0 {
                &resolved.home
            } else {
                &resolved.away
            };
            let favored_form =
                FormCategory::from_points_per_game(favored.snapshot.points_per_game());
            let injuries = grade.as_ref().map(|g| g.injury_count()).unwrap_or(0);

            let fixed = adjuster::quick_fix(
                adjusted,
                analysis.power_differential(),
                injuries,
                favored_form,
            );

            analysis.prediction = fixed.score;
            analysis.confidence = fixed.confidence;
            analysis.reasoning = fixed.reasoning;
            analysis.llm_grade_enhancement = grade;
        }

        info!(
            home_team_id,
            away_team_id,
            prediction = %analysis.prediction,
            confidence = analysis.confidence,
            standings_source = %analysis.standings_source,
            "Analysis complete"
        );

        // Fire-and-forget: the caller gets the analysis regardless of
        // whether this write lands.
        self.ledger.submit(
            effective_fixture_id,
            home_team_id,
            away_team_id,
            resolved.match_name(),
            &analysis,
        );

        Ok(analysis)
    }
}

fn grading_brief(
    fixture_id: i64,
    season: u32,
    resolved: &ResolvedStandings,
    analysis: &OracleAnalysis,
) -> MatchBrief {
    MatchBrief {
        fixture_id,
        home_team_id: resolved.home.team_id,
        away_team_id: resolved.away.team_id,
        season,
        data_summary: format!(
            "{}\nHOME standing: {}\nAWAY standing: {}\nBase reasoning: {}",
            resolved.match_name(),
            resolved.home.snapshot,
            resolved.away.snapshot,
            analysis.reasoning,
        ),
    }
}

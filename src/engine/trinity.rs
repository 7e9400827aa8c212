//! Trinity context engine.
//!
//! Produces the `SimulationContext` that perturbs the simulator, caching
//! every computed result (success or fallback) keyed by fixture id and
//! by (home, away, season). This stage never propagates an error; any
//! failure degrades to the neutral context with the cause in `reasoning`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use tracing::{debug, info, warn};

use crate::data::{FixtureStatus, FixtureSummary, MatchOutcome, SportsDataProvider};
use crate::llm::{MatchBrief, QualitativeAnalyst};
use crate::storage::MetricsCacheStore;
use crate::types::{SimulationContext, TrinityMetricsEntry};

/// Deterministic fixture id used when no real fixture exists for the
/// matchup. Collision-free for team ids below 100 000.
pub fn synthetic_fixture_id(home_team_id: u32, away_team_id: u32) -> i64 {
    home_team_id as i64 * 100_000 + away_team_id as i64
}

pub struct TrinityEngine {
    cache: Arc<dyn MetricsCacheStore>,
    provider: Option<Arc<dyn SportsDataProvider>>,
    analyst: Option<Arc<dyn QualitativeAnalyst>>,
    cache_ttl: Duration,
    form_window: u32,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl TrinityEngine {
    pub fn new(
        cache: Arc<dyn MetricsCacheStore>,
        provider: Option<Arc<dyn SportsDataProvider>>,
        analyst: Option<Arc<dyn QualitativeAnalyst>>,
        cache_ttl: Duration,
        form_window: u32,
    ) -> Self {
        Self {
            cache,
            provider,
            analyst,
            cache_ttl,
            form_window,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn cache_stats(&self) -> (u64, u64) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    /// Compute (or serve from cache) the simulation context for a match.
    /// Total: every failure mode degrades to the neutral context.
    pub async fn compute_context(
        &self,
        fixture_id: Option<i64>,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
    ) -> SimulationContext {
        let real_fixture = fixture_id.filter(|id| *id > 0);

        if let Some(entry) = self
            .cache_lookup(real_fixture, home_team_id, away_team_id, season)
            .await
        {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(fixture_id = entry.fixture_id, "Trinity cache hit");
            return entry.to_context();
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let effective_id =
            real_fixture.unwrap_or_else(|| synthetic_fixture_id(home_team_id, away_team_id));

        let context = match self
            .analyze(real_fixture, effective_id, home_team_id, away_team_id, season)
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(fixture_id = effective_id, error = %e, "Trinity analysis failed, using neutral context");
                SimulationContext::neutral(format!("Context analysis failed: {e}"))
            }
        };

        // Fallback results are cached too; recomputing them would repeat
        // the same failing work.
        let entry = TrinityMetricsEntry::from_context(
            effective_id,
            home_team_id,
            away_team_id,
            season,
            &context,
        );
        if let Err(e) = self.cache.cache_metrics(&entry).await {
            warn!(fixture_id = effective_id, error = %e, "Trinity cache write failed");
        }

        context
    }

    /// Fresh cache entry by fixture id, then by team pair. Store errors
    /// read as misses.
    async fn cache_lookup(
        &self,
        fixture_id: Option<i64>,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
    ) -> Option<TrinityMetricsEntry> {
        if let Some(id) = fixture_id {
            match self.cache.get_by_fixture_id(id).await {
                Ok(Some(entry)) if !entry.is_expired(self.cache_ttl) => return Some(entry),
                Ok(_) => {}
                Err(e) => warn!(fixture_id = id, error = %e, "Trinity cache read failed"),
            }
        }
        match self
            .cache
            .get_by_teams_and_season(home_team_id, away_team_id, season)
            .await
        {
            Ok(Some(entry)) if !entry.is_expired(self.cache_ttl) => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!(home_team_id, away_team_id, season, error = %e, "Trinity cache read failed");
                None
            }
        }
    }

    async fn analyze(
        &self,
        real_fixture: Option<i64>,
        effective_id: i64,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
    ) -> Result<SimulationContext> {
        let (Some(provider), Some(analyst)) = (&self.provider, &self.analyst) else {
            let mut missing = Vec::new();
            if self.provider.is_none() {
                missing.push("sports-data key");
            }
            if self.analyst.is_none() {
                missing.push("LLM key");
            }
            info!(?missing, "Trinity degraded to neutral context");
            return Ok(SimulationContext::neutral(format!(
                "Missing API keys ({}); using neutral context",
                missing.join(", "),
            )));
        };

        // Both sides' form fetched concurrently; either branch failing
        // degrades to a placeholder line rather than failing the barrier.
        let (home_form, away_form) = tokio::join!(
            form_summary(provider.as_ref(), home_team_id, self.form_window),
            form_summary(provider.as_ref(), away_team_id, self.form_window),
        );

        let mut summary = format!("HOME {home_form}\nAWAY {away_form}\n");

        if let Some(id) = real_fixture {
            match provider.get_fixture_statistics(id).await {
                Ok(stats) if !stats.is_empty() => {
                    for team in &stats {
                        summary.push_str(&format!(
                            "STATS team {}: possession {:?}%, shots on goal {:?}, total shots {:?}, pass accuracy {:?}%\n",
                            team.team_id,
                            team.possession_pct,
                            team.shots_on_goal,
                            team.total_shots,
                            team.pass_accuracy_pct,
                        ));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(fixture_id = id, error = %e, "Fixture statistics unavailable");
                }
            }
        } else {
            // Synthetic matchup: lighter analysis, form only.
            summary.push_str("No concrete fixture scheduled; assess from form only.\n");
        }

        let brief = MatchBrief {
            fixture_id: effective_id,
            home_team_id,
            away_team_id,
            season,
            data_summary: summary,
        };
        let assessment = analyst.assess_trinity(&brief).await?;

        Ok(SimulationContext {
            fatigue_score: assessment.fatigue_score,
            lineup_strength: assessment.lineup_strength,
            style_matchup: assessment.style_matchup,
            home_fitness: assessment.home_fitness,
            away_fitness: assessment.away_fitness,
            home_distraction: assessment.home_distraction,
            away_distraction: assessment.away_distraction,
            reasoning: assessment.reasoning,
        }
        .clamped())
    }
}

/// One-line recent-form summary for the analyst prompt.
async fn form_summary(provider: &dyn SportsDataProvider, team_id: u32, window: u32) -> String {
    let fixtures = match provider
        .get_last_fixtures(team_id, window, FixtureStatus::Finished)
        .await
    {
        Ok(f) => f,
        Err(e) => {
            warn!(team_id, error = %e, "Recent-form fetch failed for context summary");
            return format!("team {team_id}: no recent data");
        }
    };
    if fixtures.is_empty() {
        return format!("team {team_id}: no recent data");
    }
    describe_form(team_id, &fixtures)
}

fn describe_form(team_id: u32, fixtures: &[FixtureSummary]) -> String {
    let mut wins = 0u32;
    let mut draws = 0u32;
    let mut losses = 0u32;
    let mut gd = 0i32;
    for f in fixtures {
        match f.outcome_for(team_id) {
            Some(MatchOutcome::Win) => wins += 1,
            Some(MatchOutcome::Draw) => draws += 1,
            Some(MatchOutcome::Loss) => losses += 1,
            None => continue,
        }
        gd += f.goal_diff_for(team_id).unwrap_or(0);
    }
    format!("team {team_id}: last {} played W{wins} D{draws} L{losses}, GD {gd:+}", wins + draws + losses)
}

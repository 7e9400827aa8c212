//! Standings resolution with a season/form/default fallback chain.
//!
//! Chain per team: current season table, previous season table, an
//! approximation derived from recent completed fixtures, then the
//! documented default snapshot. Each level strictly reduces confidence.
//! The resolver never errors; upstream failures are treated the same as
//! the team being absent from that level.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::{FixtureStatus, MatchOutcome, SportsDataProvider, StandingRow};
use crate::types::{StandingSnapshot, StandingsSource};

/// One resolved side of the match.
#[derive(Debug, Clone)]
pub struct ResolvedTeam {
    pub team_id: u32,
    /// Known only when the team was found in a league table.
    pub team_name: Option<String>,
    pub snapshot: StandingSnapshot,
}

/// Both sides resolved, plus helpers combining the two fallback levels.
#[derive(Debug, Clone)]
pub struct ResolvedStandings {
    pub home: ResolvedTeam,
    pub away: ResolvedTeam,
}

impl ResolvedStandings {
    /// Overall confidence scalar: the weaker of the two sides' levels.
    pub fn combined_adjustment(&self) -> f64 {
        self.home
            .snapshot
            .confidence_adjustment
            .min(self.away.snapshot.confidence_adjustment)
    }

    /// The lower-confidence of the two sources, reported on the analysis.
    pub fn worst_source(&self) -> StandingsSource {
        if self.home.snapshot.confidence_adjustment <= self.away.snapshot.confidence_adjustment {
            self.home.snapshot.source
        } else {
            self.away.snapshot.source
        }
    }

    pub fn match_name(&self) -> String {
        let name = |t: &ResolvedTeam| {
            t.team_name
                .clone()
                .unwrap_or_else(|| format!("Team {}", t.team_id))
        };
        format!("{} vs {}", name(&self.home), name(&self.away))
    }
}

pub struct StandingsResolver {
    provider: Option<Arc<dyn SportsDataProvider>>,
    form_window: u32,
}

impl StandingsResolver {
    pub fn new(provider: Option<Arc<dyn SportsDataProvider>>, form_window: u32) -> Self {
        Self {
            provider,
            form_window,
        }
    }

    /// Resolve both teams. Total: always returns snapshots, possibly the
    /// documented defaults.
    pub async fn resolve(
        &self,
        league_id: u32,
        season: u32,
        home_team_id: u32,
        away_team_id: u32,
    ) -> ResolvedStandings {
        let current = self.fetch_standings(league_id, season).await;

        // Previous-season table is only fetched if someone is missing.
        let need_previous = !Self::contains(&current, home_team_id)
            || !Self::contains(&current, away_team_id);
        let previous = if need_previous && season > 0 {
            self.fetch_standings(league_id, season - 1).await
        } else {
            Vec::new()
        };

        let home = self
            .resolve_team(home_team_id, &current, &previous)
            .await;
        let away = self
            .resolve_team(away_team_id, &current, &previous)
            .await;

        debug!(
            home = home_team_id,
            away = away_team_id,
            home_source = %home.snapshot.source,
            away_source = %away.snapshot.source,
            "Standings resolved"
        );
        ResolvedStandings { home, away }
    }

    /// Fetch a season's table. Errors degrade to an empty table, which
    /// reads as "nobody found at this level".
    async fn fetch_standings(&self, league_id: u32, season: u32) -> Vec<StandingRow> {
        let Some(provider) = &self.provider else {
            return Vec::new();
        };
        match provider.get_standings(league_id, season).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(league_id, season, error = %e, "Standings fetch failed, continuing fallback chain");
                Vec::new()
            }
        }
    }

    fn contains(rows: &[StandingRow], team_id: u32) -> bool {
        rows.iter().any(|r| r.team_id == team_id)
    }

    async fn resolve_team(
        &self,
        team_id: u32,
        current: &[StandingRow],
        previous: &[StandingRow],
    ) -> ResolvedTeam {
        if let Some(row) = current.iter().find(|r| r.team_id == team_id) {
            return ResolvedTeam {
                team_id,
                team_name: Some(row.team_name.clone()),
                snapshot: snapshot_from_row(row, StandingsSource::CurrentSeason),
            };
        }
        if let Some(row) = previous.iter().find(|r| r.team_id == team_id) {
            return ResolvedTeam {
                team_id,
                team_name: Some(row.team_name.clone()),
                snapshot: snapshot_from_row(row, StandingsSource::PreviousSeason),
            };
        }
        if let Some(snapshot) = self.derive_from_form(team_id).await {
            return ResolvedTeam {
                team_id,
                team_name: None,
                snapshot,
            };
        }
        ResolvedTeam {
            team_id,
            team_name: None,
            snapshot: StandingSnapshot::fallback_default(),
        }
    }

    /// Approximate a standing from the win/draw/loss tally of recent
    /// completed fixtures. `None` when no usable fixtures exist.
    async fn derive_from_form(&self, team_id: u32) -> Option<StandingSnapshot> {
        let provider = self.provider.as_ref()?;
        let fixtures = match provider
            .get_last_fixtures(team_id, self.form_window, FixtureStatus::Finished)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                warn!(team_id, error = %e, "Recent-form fetch failed, falling back to default snapshot");
                return None;
            }
        };

        let mut games = 0u32;
        let mut points = 0i32;
        let mut goals_diff = 0i32;
        for fixture in &fixtures {
            let Some(outcome) = fixture.outcome_for(team_id) else {
                continue;
            };
            games += 1;
            points += match outcome {
                MatchOutcome::Win => 3,
                MatchOutcome::Draw => 1,
                MatchOutcome::Loss => 0,
            };
            goals_diff += fixture.goal_diff_for(team_id).unwrap_or(0);
        }
        if games == 0 {
            return None;
        }

        let ppg = points as f64 / games as f64;
        Some(StandingSnapshot {
            rank: rank_from_points_per_game(ppg),
            points,
            goals_diff,
            games_played: games,
            source: StandingsSource::DerivedFromRecentForm,
            confidence_adjustment: StandingsSource::DerivedFromRecentForm.confidence_adjustment(),
        })
    }
}

fn snapshot_from_row(row: &StandingRow, source: StandingsSource) -> StandingSnapshot {
    StandingSnapshot {
        rank: row.rank,
        points: row.points,
        goals_diff: row.goals_diff,
        games_played: row.games_played,
        source,
        confidence_adjustment: source.confidence_adjustment(),
    }
}

/// Map a points-per-game rate onto an approximate 20-team table position.
/// 3.0 ppg maps to 1st, 0.0 ppg to 20th.
fn rank_from_points_per_game(ppg: f64) -> u32 {
    let rank = 20.0 - (ppg.clamp(0.0, 3.0) / 3.0) * 19.0;
    rank.round().clamp(1.0, 20.0) as u32
}

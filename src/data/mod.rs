//! Sports-data provider abstraction.
//!
//! Defines the `SportsDataProvider` trait consumed by the standings
//! resolver and the Trinity context engine, plus the row types it
//! returns. The concrete API-Football client lives in `api_football`.

pub mod api_football;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixture status filter for `get_last_fixtures`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureStatus {
    /// Full time — completed matches.
    Finished,
    /// Not started.
    Scheduled,
}

impl FixtureStatus {
    /// API-Football short status code.
    pub fn api_code(&self) -> &'static str {
        match self {
            FixtureStatus::Finished => "FT",
            FixtureStatus::Scheduled => "NS",
        }
    }
}

/// One row of a league table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingRow {
    pub team_id: u32,
    pub team_name: String,
    pub rank: u32,
    pub points: i32,
    pub goals_diff: i32,
    pub games_played: u32,
}

/// Outcome of a completed fixture from one team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Draw,
    Loss,
}

/// A (possibly completed) fixture involving a team of interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSummary {
    pub fixture_id: i64,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    pub kickoff: DateTime<Utc>,
}

impl FixtureSummary {
    /// Result from the given team's perspective; `None` if the fixture
    /// has no final score or does not involve the team.
    pub fn outcome_for(&self, team_id: u32) -> Option<MatchOutcome> {
        let (hg, ag) = (self.home_goals?, self.away_goals?);
        let diff = if team_id == self.home_team_id {
            hg as i32 - ag as i32
        } else if team_id == self.away_team_id {
            ag as i32 - hg as i32
        } else {
            return None;
        };
        Some(match diff.cmp(&0) {
            std::cmp::Ordering::Greater => MatchOutcome::Win,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
            std::cmp::Ordering::Less => MatchOutcome::Loss,
        })
    }

    /// Goals scored minus conceded from the given team's perspective.
    pub fn goal_diff_for(&self, team_id: u32) -> Option<i32> {
        let (hg, ag) = (self.home_goals?, self.away_goals?);
        if team_id == self.home_team_id {
            Some(hg as i32 - ag as i32)
        } else if team_id == self.away_team_id {
            Some(ag as i32 - hg as i32)
        } else {
            None
        }
    }
}

/// Per-team statistics for one fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamFixtureStats {
    pub team_id: u32,
    pub possession_pct: Option<f64>,
    pub shots_on_goal: Option<u32>,
    pub total_shots: Option<u32>,
    pub pass_accuracy_pct: Option<f64>,
}

/// Abstraction over the sports-data provider.
///
/// Implementations must tolerate the upstream returning empty arrays for
/// some seasons — an empty result is data, not an error.
#[async_trait]
pub trait SportsDataProvider: Send + Sync {
    /// League table for a season. May be empty.
    async fn get_standings(&self, league_id: u32, season: u32) -> Result<Vec<StandingRow>>;

    /// A team's most recent fixtures with the given status, newest first.
    async fn get_last_fixtures(
        &self,
        team_id: u32,
        count: u32,
        status: FixtureStatus,
    ) -> Result<Vec<FixtureSummary>>;

    /// Per-team statistics for one fixture. May be empty.
    async fn get_fixture_statistics(&self, fixture_id: i64) -> Result<Vec<TeamFixtureStats>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(home: u32, away: u32, hg: u32, ag: u32) -> FixtureSummary {
        FixtureSummary {
            fixture_id: 1,
            home_team_id: home,
            away_team_id: away,
            home_goals: Some(hg),
            away_goals: Some(ag),
            kickoff: Utc::now(),
        }
    }

    #[test]
    fn test_outcome_for_home_win() {
        let f = fixture(50, 42, 3, 1);
        assert_eq!(f.outcome_for(50), Some(MatchOutcome::Win));
        assert_eq!(f.outcome_for(42), Some(MatchOutcome::Loss));
    }

    #[test]
    fn test_outcome_for_draw() {
        let f = fixture(50, 42, 2, 2);
        assert_eq!(f.outcome_for(50), Some(MatchOutcome::Draw));
        assert_eq!(f.outcome_for(42), Some(MatchOutcome::Draw));
    }

    #[test]
    fn test_outcome_for_unrelated_team() {
        let f = fixture(50, 42, 1, 0);
        assert_eq!(f.outcome_for(99), None);
    }

    #[test]
    fn test_outcome_for_unfinished() {
        let mut f = fixture(50, 42, 0, 0);
        f.home_goals = None;
        f.away_goals = None;
        assert_eq!(f.outcome_for(50), None);
    }

    #[test]
    fn test_goal_diff_for() {
        let f = fixture(50, 42, 3, 1);
        assert_eq!(f.goal_diff_for(50), Some(2));
        assert_eq!(f.goal_diff_for(42), Some(-2));
    }

    #[test]
    fn test_status_api_codes() {
        assert_eq!(FixtureStatus::Finished.api_code(), "FT");
        assert_eq!(FixtureStatus::Scheduled.api_code(), "NS");
    }
}

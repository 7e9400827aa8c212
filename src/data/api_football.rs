//! API-Football (API-Sports) client.
//!
//! Fetches standings, recent fixtures, and fixture statistics.
//!
//! API: `https://v3.football.api-sports.io/`
//! Auth: `x-apisports-key` header. Free tier: 100 req/day.
//!
//! The upstream wraps every payload in a `response` array and returns an
//! empty array rather than an error for seasons it has no data for, so
//! all response fields are `#[serde(default)]` and empty results map to
//! empty vectors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{
    FixtureStatus, FixtureSummary, SportsDataProvider, StandingRow, TeamFixtureStats,
};

const API_BASE_URL: &str = "https://v3.football.api-sports.io";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default = "Vec::new")]
    response: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StandingsEnvelope {
    #[serde(default)]
    league: Option<StandingsLeague>,
}

#[derive(Debug, Deserialize)]
struct StandingsLeague {
    #[serde(default)]
    standings: Vec<Vec<ApiStandingRow>>,
}

#[derive(Debug, Deserialize)]
struct ApiStandingRow {
    #[serde(default)]
    rank: u32,
    team: ApiTeamRef,
    #[serde(default)]
    points: i32,
    #[serde(rename = "goalsDiff", default)]
    goals_diff: i32,
    #[serde(default)]
    all: Option<ApiStandingGames>,
}

#[derive(Debug, Deserialize)]
struct ApiTeamRef {
    id: u32,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiStandingGames {
    #[serde(default)]
    played: u32,
}

#[derive(Debug, Deserialize)]
struct ApiFixture {
    fixture: ApiFixtureMeta,
    teams: ApiFixtureTeams,
    #[serde(default)]
    goals: ApiFixtureGoals,
}

#[derive(Debug, Deserialize)]
struct ApiFixtureMeta {
    id: i64,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiFixtureTeams {
    home: ApiTeamRef,
    away: ApiTeamRef,
}

#[derive(Debug, Default, Deserialize)]
struct ApiFixtureGoals {
    #[serde(default)]
    home: Option<u32>,
    #[serde(default)]
    away: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiFixtureStats {
    team: ApiTeamRef,
    #[serde(default)]
    statistics: Vec<ApiStatLine>,
}

#[derive(Debug, Deserialize)]
struct ApiStatLine {
    #[serde(rename = "type", default)]
    stat_type: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiFootballClient {
    http: Client,
    api_key: SecretString,
}

impl ApiFootballClient {
    pub fn new(api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("oracle-tesseract/0.1.0")
            .build()
            .context("Failed to build API-Football HTTP client")?;
        Ok(Self { http, api_key })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse<T>> {
        let url = format!("{API_BASE_URL}{path}");
        debug!(%url, "API-Football request");
        let resp = self
            .http
            .get(&url)
            .header("x-apisports-key", self.api_key.expose_secret())
            .query(query)
            .send()
            .await
            .with_context(|| format!("API-Football request failed: {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API-Football error {status} on {path}: {body}");
        }

        resp.json::<ApiResponse<T>>()
            .await
            .with_context(|| format!("Failed to parse API-Football response: {path}"))
    }

    /// Pull a percentage out of a statistics value like `"58%"` or `58`.
    fn as_pct(value: &Option<serde_json::Value>) -> Option<f64> {
        match value.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }

    /// Pull an integer count out of a statistics value.
    fn as_count(value: &Option<serde_json::Value>) -> Option<u32> {
        match value.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().map(|v| v as u32),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[async_trait]
impl SportsDataProvider for ApiFootballClient {
    async fn get_standings(&self, league_id: u32, season: u32) -> Result<Vec<StandingRow>> {
        let resp: ApiResponse<StandingsEnvelope> = self
            .get(
                "/standings",
                &[
                    ("league", league_id.to_string()),
                    ("season", season.to_string()),
                ],
            )
            .await?;

        // The API nests standings in groups (league stages); the overall
        // table is the first group.
        let rows = resp
            .response
            .into_iter()
            .filter_map(|env| env.league)
            .flat_map(|l| l.standings.into_iter().next().unwrap_or_default())
            .map(|row| StandingRow {
                team_id: row.team.id,
                team_name: row.team.name,
                rank: row.rank,
                points: row.points,
                goals_diff: row.goals_diff,
                games_played: row.all.map(|g| g.played).unwrap_or(0),
            })
            .collect();
        Ok(rows)
    }

    async fn get_last_fixtures(
        &self,
        team_id: u32,
        count: u32,
        status: FixtureStatus,
    ) -> Result<Vec<FixtureSummary>> {
        let resp: ApiResponse<ApiFixture> = self
            .get(
                "/fixtures",
                &[
                    ("team", team_id.to_string()),
                    ("last", count.to_string()),
                    ("status", status.api_code().to_string()),
                ],
            )
            .await?;

        let fixtures = resp
            .response
            .into_iter()
            .map(|f| FixtureSummary {
                fixture_id: f.fixture.id,
                home_team_id: f.teams.home.id,
                away_team_id: f.teams.away.id,
                home_goals: f.goals.home,
                away_goals: f.goals.away,
                kickoff: f.fixture.date.unwrap_or_else(Utc::now),
            })
            .collect();
        Ok(fixtures)
    }

    async fn get_fixture_statistics(&self, fixture_id: i64) -> Result<Vec<TeamFixtureStats>> {
        let resp: ApiResponse<ApiFixtureStats> = self
            .get(
                "/fixtures/statistics",
                &[("fixture", fixture_id.to_string())],
            )
            .await?;

        let stats = resp
            .response
            .into_iter()
            .map(|team_stats| {
                let mut out = TeamFixtureStats {
                    team_id: team_stats.team.id,
                    ..Default::default()
                };
                for line in &team_stats.statistics {
                    match line.stat_type.as_str() {
                        "Ball Possession" => out.possession_pct = Self::as_pct(&line.value),
                        "Shots on Goal" => out.shots_on_goal = Self::as_count(&line.value),
                        "Total Shots" => out.total_shots = Self::as_count(&line.value),
                        "Passes %" => out.pass_accuracy_pct = Self::as_pct(&line.value),
                        _ => {}
                    }
                }
                out
            })
            .collect();
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! SQLite-backed persistence for the metrics cache and prediction ledger.
//!
//! The schema is applied on startup with idempotent CREATE statements.
//! Timestamps are stored as unix values (seconds for `cached_at`, millis
//! for ledger `timestamp`) so the sqlite driver needs no date support.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

use super::{LedgerStore, MetricsCacheStore};
use crate::types::{PredictionLogRecord, RiskLevel, TrinityMetricsEntry};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at the given path and
    /// apply the schema.
    pub async fn open(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))
            .with_context(|| format!("Invalid database path: {database_path}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {database_path}"))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %database_path, "SQLite store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trinity_metrics (
                fixture_id       INTEGER PRIMARY KEY,
                home_team_id     INTEGER NOT NULL,
                away_team_id     INTEGER NOT NULL,
                season           INTEGER NOT NULL,
                fatigue_score    REAL NOT NULL,
                lineup_strength  REAL NOT NULL,
                style_matchup    REAL NOT NULL,
                home_fitness     REAL NOT NULL,
                away_fitness     REAL NOT NULL,
                home_distraction REAL NOT NULL,
                away_distraction REAL NOT NULL,
                reasoning        TEXT NOT NULL,
                cached_at        INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create trinity_metrics table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_trinity_teams_season
                ON trinity_metrics (home_team_id, away_team_id, season)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create trinity_metrics index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prediction_ledger (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                fixture_id              INTEGER NOT NULL,
                home_team_id            INTEGER NOT NULL,
                away_team_id            INTEGER NOT NULL,
                match_name              TEXT NOT NULL,
                predicted_score         TEXT NOT NULL,
                home_prob               REAL NOT NULL,
                draw_prob               REAL NOT NULL,
                away_prob               REAL NOT NULL,
                home_fitness            REAL NOT NULL,
                home_distraction        REAL NOT NULL,
                llm_grade_context_score REAL,
                llm_grade_risk_level    TEXT,
                actual_score            TEXT,
                outcome_correct         INTEGER,
                exact_score_correct     INTEGER,
                timestamp               INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create prediction_ledger table")?;

        Ok(())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<TrinityMetricsEntry> {
        let cached_at_secs: i64 = row.try_get("cached_at")?;
        let cached_at = DateTime::<Utc>::from_timestamp(cached_at_secs, 0)
            .context("Stored cached_at out of range")?;
        Ok(TrinityMetricsEntry {
            fixture_id: row.try_get("fixture_id")?,
            home_team_id: row.try_get::<i64, _>("home_team_id")? as u32,
            away_team_id: row.try_get::<i64, _>("away_team_id")? as u32,
            season: row.try_get::<i64, _>("season")? as u32,
            fatigue_score: row.try_get("fatigue_score")?,
            lineup_strength: row.try_get("lineup_strength")?,
            style_matchup: row.try_get("style_matchup")?,
            home_fitness: row.try_get("home_fitness")?,
            away_fitness: row.try_get("away_fitness")?,
            home_distraction: row.try_get("home_distraction")?,
            away_distraction: row.try_get("away_distraction")?,
            reasoning: row.try_get("reasoning")?,
            cached_at,
        })
    }
}

#[async_trait]
impl MetricsCacheStore for SqliteStore {
    async fn get_by_fixture_id(&self, fixture_id: i64) -> Result<Option<TrinityMetricsEntry>> {
        let row = sqlx::query("SELECT * FROM trinity_metrics WHERE fixture_id = ?")
            .bind(fixture_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query trinity_metrics by fixture id")?;
        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn get_by_teams_and_season(
        &self,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
    ) -> Result<Option<TrinityMetricsEntry>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM trinity_metrics
            WHERE home_team_id = ? AND away_team_id = ? AND season = ?
            ORDER BY cached_at DESC
            LIMIT 1
            "#,
        )
        .bind(home_team_id as i64)
        .bind(away_team_id as i64)
        .bind(season as i64)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query trinity_metrics by teams and season")?;
        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn cache_metrics(&self, entry: &TrinityMetricsEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO trinity_metrics (
                fixture_id, home_team_id, away_team_id, season,
                fatigue_score, lineup_strength, style_matchup,
                home_fitness, away_fitness,
                home_distraction, away_distraction,
                reasoning, cached_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.fixture_id)
        .bind(entry.home_team_id as i64)
        .bind(entry.away_team_id as i64)
        .bind(entry.season as i64)
        .bind(entry.fatigue_score)
        .bind(entry.lineup_strength)
        .bind(entry.style_matchup)
        .bind(entry.home_fitness)
        .bind(entry.away_fitness)
        .bind(entry.home_distraction)
        .bind(entry.away_distraction)
        .bind(&entry.reasoning)
        .bind(entry.cached_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to cache trinity metrics")?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn insert(&self, record: &PredictionLogRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prediction_ledger (
                fixture_id, home_team_id, away_team_id,
                match_name, predicted_score,
                home_prob, draw_prob, away_prob,
                home_fitness, home_distraction,
                llm_grade_context_score, llm_grade_risk_level,
                actual_score, outcome_correct, exact_score_correct,
                timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.fixture_id)
        .bind(record.home_team_id as i64)
        .bind(record.away_team_id as i64)
        .bind(&record.match_name)
        .bind(&record.predicted_score)
        .bind(record.home_prob)
        .bind(record.draw_prob)
        .bind(record.away_prob)
        .bind(record.home_fitness)
        .bind(record.home_distraction)
        .bind(record.llm_grade_context_score)
        .bind(record.llm_grade_risk_level.map(|r| r.to_string()))
        .bind(&record.actual_score)
        .bind(record.outcome_correct)
        .bind(record.exact_score_correct)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert ledger record")?;
        Ok(())
    }
}

// Risk levels round-trip through TEXT columns.
impl RiskLevel {
    pub fn parse_stored(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SimulationContext;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore { pool };
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_metrics_roundtrip() {
        let store = memory_store().await;
        let ctx = SimulationContext {
            fatigue_score: 62.0,
            lineup_strength: 80.0,
            style_matchup: 1.2,
            home_fitness: 90.0,
            away_fitness: 70.0,
            home_distraction: 10.0,
            away_distraction: 35.0,
            reasoning: "congested schedule".to_string(),
        };
        let entry = TrinityMetricsEntry::from_context(123, 50, 42, 2025, &ctx);
        store.cache_metrics(&entry).await.unwrap();

        let by_fixture = store.get_by_fixture_id(123).await.unwrap().unwrap();
        assert_eq!(by_fixture.to_context().fatigue_score, 62.0);
        assert_eq!(by_fixture.reasoning, "congested schedule");

        let by_teams = store
            .get_by_teams_and_season(50, 42, 2025)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_teams.fixture_id, 123);

        assert!(store.get_by_fixture_id(999).await.unwrap().is_none());
        assert!(store
            .get_by_teams_and_season(42, 50, 2025)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_metrics_replace_on_conflict() {
        let store = memory_store().await;
        let ctx = SimulationContext::neutral("first");
        store
            .cache_metrics(&TrinityMetricsEntry::from_context(7, 1, 2, 2025, &ctx))
            .await
            .unwrap();

        let mut updated = TrinityMetricsEntry::from_context(7, 1, 2, 2025, &ctx);
        updated.fatigue_score = 99.0;
        updated.reasoning = "second".to_string();
        store.cache_metrics(&updated).await.unwrap();

        let hit = store.get_by_fixture_id(7).await.unwrap().unwrap();
        assert_eq!(hit.fatigue_score, 99.0);
        assert_eq!(hit.reasoning, "second");
    }

    #[tokio::test]
    async fn test_ledger_insert() {
        let store = memory_store().await;
        let rec = PredictionLogRecord::new(
            5_000_042, 50, 42,
            "Team 50 vs Team 42".into(),
            "2-1".into(),
            0.5, 0.3, 0.2,
            85.0, 15.0,
            Some(4.5), Some(RiskLevel::Medium),
            1_700_000_000_000,
        )
        .unwrap();
        store.insert(&rec).await.unwrap();
        store.insert(&rec).await.unwrap();

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM prediction_ledger")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .try_get("n")
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_risk_level_parse_stored() {
        assert_eq!(RiskLevel::parse_stored("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse_stored("nope"), None);
    }
}

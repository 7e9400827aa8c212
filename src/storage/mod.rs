//! Persistence layer.
//!
//! Two narrow traits: a Trinity metrics cache and the append-only
//! prediction ledger. `sqlite` holds the durable implementation; the
//! in-memory stores back tests and key-less local runs.

pub mod sqlite;

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{PredictionLogRecord, TrinityMetricsEntry};

/// Cache of computed Trinity metrics.
///
/// Lookups return whatever is stored regardless of age; TTL policy lives
/// in the caller so the same store can serve different freshness rules.
#[async_trait]
pub trait MetricsCacheStore: Send + Sync {
    /// Most recent entry for a fixture id, if any.
    async fn get_by_fixture_id(&self, fixture_id: i64) -> Result<Option<TrinityMetricsEntry>>;

    /// Most recent entry for a (home, away, season) triple, if any.
    async fn get_by_teams_and_season(
        &self,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
    ) -> Result<Option<TrinityMetricsEntry>>;

    /// Insert or replace the entry for its fixture id.
    async fn cache_metrics(&self, entry: &TrinityMetricsEntry) -> Result<()>;
}

/// Append-only prediction ledger. Records are validated before they get
/// here; the store never mutates or rejects a well-formed record.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert(&self, record: &PredictionLogRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory stores
// ---------------------------------------------------------------------------

/// Metrics cache backed by a `Vec` under a mutex. Fine for tests and for
/// runs without a database path configured.
#[derive(Default)]
pub struct InMemoryMetricsCache {
    entries: Mutex<Vec<TrinityMetricsEntry>>,
}

impl InMemoryMetricsCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsCacheStore for InMemoryMetricsCache {
    async fn get_by_fixture_id(&self, fixture_id: i64) -> Result<Option<TrinityMetricsEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| e.fixture_id == fixture_id)
            .max_by_key(|e| e.cached_at)
            .cloned())
    }

    async fn get_by_teams_and_season(
        &self,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
    ) -> Result<Option<TrinityMetricsEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| {
                e.home_team_id == home_team_id
                    && e.away_team_id == away_team_id
                    && e.season == season
            })
            .max_by_key(|e| e.cached_at)
            .cloned())
    }

    async fn cache_metrics(&self, entry: &TrinityMetricsEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.fixture_id != entry.fixture_id);
        entries.push(entry.clone());
        Ok(())
    }
}

/// Ledger backed by a `Vec` under a mutex.
#[derive(Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<PredictionLogRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<PredictionLogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn insert(&self, record: &PredictionLogRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PredictionLogRecord, SimulationContext, TrinityMetricsEntry};
    use chrono::Utc;

    fn entry(fixture_id: i64, home: u32, away: u32) -> TrinityMetricsEntry {
        TrinityMetricsEntry::from_context(
            fixture_id,
            home,
            away,
            2025,
            &SimulationContext::neutral("test"),
        )
    }

    #[tokio::test]
    async fn test_cache_roundtrip_by_fixture() {
        let cache = InMemoryMetricsCache::new();
        cache.cache_metrics(&entry(123, 50, 42)).await.unwrap();

        let hit = cache.get_by_fixture_id(123).await.unwrap().unwrap();
        assert_eq!(hit.home_team_id, 50);
        assert!(cache.get_by_fixture_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_roundtrip_by_teams() {
        let cache = InMemoryMetricsCache::new();
        cache.cache_metrics(&entry(123, 50, 42)).await.unwrap();

        let hit = cache
            .get_by_teams_and_season(50, 42, 2025)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.fixture_id, 123);
        // Reversed home/away is a different match.
        assert!(cache
            .get_by_teams_and_season(42, 50, 2025)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cache_replaces_same_fixture() {
        let cache = InMemoryMetricsCache::new();
        cache.cache_metrics(&entry(123, 50, 42)).await.unwrap();

        let mut newer = entry(123, 50, 42);
        newer.fatigue_score = 90.0;
        newer.cached_at = Utc::now();
        cache.cache_metrics(&newer).await.unwrap();

        let hit = cache.get_by_fixture_id(123).await.unwrap().unwrap();
        assert_eq!(hit.fatigue_score, 90.0);
    }

    #[tokio::test]
    async fn test_ledger_append() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.is_empty());

        let rec = PredictionLogRecord::new(
            1, 50, 42,
            "A vs B".into(),
            "2-1".into(),
            0.5, 0.3, 0.2,
            85.0, 15.0,
            None, None,
            1_700_000_000_000,
        )
        .unwrap();
        ledger.insert(&rec).await.unwrap();
        ledger.insert(&rec).await.unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.records()[0].predicted_score, "2-1");
    }
}

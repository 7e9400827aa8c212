//! Prediction ledger.
//!
//! Validates every record via the `PredictionLogRecord` constructor and
//! appends it through a `LedgerStore`. The pipeline uses the detached
//! `submit` path so analyses return without awaiting persistence; write
//! failures surface in logs only. The awaited `record` path is for
//! callers that need the validation or storage error back. Both paths
//! apply the same validation; an invalid record always fails the write.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::types::{OracleAnalysis, OracleError, PredictionLogRecord};

pub struct PredictionLedger {
    store: Arc<dyn crate::storage::LedgerStore>,
    tx: mpsc::UnboundedSender<PredictionLogRecord>,
}

impl PredictionLedger {
    /// Spawns the background writer task. Must be called from within a
    /// tokio runtime.
    pub fn new(store: Arc<dyn crate::storage::LedgerStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PredictionLogRecord>();
        let writer = store.clone();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match writer.insert(&record).await {
                    Ok(()) => {
                        debug!(fixture_id = record.fixture_id, "Prediction logged");
                    }
                    Err(e) => {
                        error!(
                            fixture_id = record.fixture_id,
                            predicted_score = %record.predicted_score,
                            error = %e,
                            "Ledger write failed"
                        );
                    }
                }
            }
        });
        Self { store, tx }
    }

    /// Validate and enqueue a record without blocking the caller.
    /// Validation failures are logged with the offending values and the
    /// write is dropped; the caller is never failed by this path.
    pub fn submit(
        &self,
        fixture_id: i64,
        home_team_id: u32,
        away_team_id: u32,
        match_name: String,
        analysis: &OracleAnalysis,
    ) {
        match PredictionLogRecord::from_analysis(
            fixture_id,
            home_team_id,
            away_team_id,
            match_name,
            analysis,
        ) {
            Ok(record) => {
                if self.tx.send(record).is_err() {
                    error!(fixture_id, "Ledger writer task is gone, record dropped");
                }
            }
            Err(e) => {
                error!(
                    fixture_id,
                    prediction = %analysis.prediction,
                    confidence = analysis.confidence,
                    error = %e,
                    "Rejected invalid ledger record"
                );
            }
        }
    }

    /// Validate and persist, surfacing validation and storage errors.
    pub async fn record(
        &self,
        fixture_id: i64,
        home_team_id: u32,
        away_team_id: u32,
        match_name: String,
        analysis: &OracleAnalysis,
    ) -> Result<(), OracleError> {
        let record = PredictionLogRecord::from_analysis(
            fixture_id,
            home_team_id,
            away_team_id,
            match_name,
            analysis,
        )?;
        self.store
            .insert(&record)
            .await
            .map_err(|e| OracleError::Storage(e.to_string()))
    }
}

//! LLM integration for qualitative match analysis.
//!
//! Defines the `QualitativeAnalyst` trait used by both the Trinity
//! context engine and the LLMGRADE context-grading layer, and provides
//! the OpenRouter implementation.

pub mod openrouter;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ContextFactor, TesseractResult};

/// Everything the analyst gets to see about one match. The data summary
/// is assembled upstream from standings, recent form, and fixture stats;
/// a degraded pipeline sends a shorter summary rather than none.
#[derive(Debug, Clone)]
pub struct MatchBrief {
    pub fixture_id: i64,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub season: u32,
    pub data_summary: String,
}

/// Structured Trinity metrics as assessed by the model. Bounds are
/// enforced by the caller, not trusted from the model.
#[derive(Debug, Clone)]
pub struct TrinityAssessment {
    pub fatigue_score: f64,
    pub lineup_strength: f64,
    pub style_matchup: f64,
    pub home_fitness: f64,
    pub away_fitness: f64,
    pub home_distraction: f64,
    pub away_distraction: f64,
    pub reasoning: String,
}

/// Raw grading output before risk-level derivation and clamping.
#[derive(Debug, Clone)]
pub struct GradeAssessment {
    pub context_factors: Vec<ContextFactor>,
    pub outlier_scenarios: Vec<String>,
    pub overall_context_score: f64,
}

/// Abstraction over the qualitative/LLM provider.
///
/// Implementors send a match brief to a model and parse structured
/// assessments from the response. Failures are ordinary `Err`s; the
/// calling stages decide how to degrade.
#[async_trait]
pub trait QualitativeAnalyst: Send + Sync {
    /// Assess the Trinity metrics (fatigue, lineup, style, fitness,
    /// distraction) for a match.
    async fn assess_trinity(&self, brief: &MatchBrief) -> Result<TrinityAssessment>;

    /// Grade the contextual risk around a base prediction.
    async fn grade_context(
        &self,
        brief: &MatchBrief,
        tesseract: &TesseractResult,
    ) -> Result<GradeAssessment>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}

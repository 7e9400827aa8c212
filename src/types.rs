//! Shared types for the Oracle/Tesseract engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that data, engine, and storage
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// Where a standing snapshot came from. Each level further down the
/// fallback chain carries a lower confidence adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StandingsSource {
    CurrentSeason,
    PreviousSeason,
    DerivedFromRecentForm,
    Default,
}

impl StandingsSource {
    /// Confidence scalar for this fallback level. Strictly decreasing
    /// as the chain degrades.
    pub fn confidence_adjustment(&self) -> f64 {
        match self {
            StandingsSource::CurrentSeason => 1.0,
            StandingsSource::PreviousSeason => 0.85,
            StandingsSource::DerivedFromRecentForm => 0.65,
            StandingsSource::Default => 0.40,
        }
    }
}

impl fmt::Display for StandingsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StandingsSource::CurrentSeason => write!(f, "current-season"),
            StandingsSource::PreviousSeason => write!(f, "previous-season"),
            StandingsSource::DerivedFromRecentForm => write!(f, "derived-from-recent-form"),
            StandingsSource::Default => write!(f, "default"),
        }
    }
}

/// A team's position in the table at analysis time.
/// Immutable per analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingSnapshot {
    /// 1 = top of the table.
    pub rank: u32,
    pub points: i32,
    pub goals_diff: i32,
    pub games_played: u32,
    pub source: StandingsSource,
    pub confidence_adjustment: f64,
}

impl StandingSnapshot {
    /// The documented last-resort snapshot when no data is obtainable.
    pub fn fallback_default() -> Self {
        Self {
            rank: 10,
            points: 30,
            goals_diff: 0,
            games_played: 20,
            source: StandingsSource::Default,
            confidence_adjustment: StandingsSource::Default.confidence_adjustment(),
        }
    }

    pub fn points_per_game(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.points as f64 / self.games_played as f64
        }
    }

    pub fn goal_diff_per_game(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.goals_diff as f64 / self.games_played as f64
        }
    }
}

impl fmt::Display for StandingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank={} pts={} gd={} gp={} [{}]",
            self.rank, self.points, self.goals_diff, self.games_played, self.source,
        )
    }
}

// ---------------------------------------------------------------------------
// Simulation context ("Trinity metrics")
// ---------------------------------------------------------------------------

/// Contextual signals that perturb the base simulation.
///
/// All numeric fields are bounded 0–100 except `style_matchup`, which is
/// a ratio around 1.0 (>1 favours the home side's scoring tendency).
/// `fatigue_score` and `lineup_strength` describe the home side relative
/// to the away side; fitness and distraction are tracked per side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationContext {
    pub fatigue_score: f64,
    pub lineup_strength: f64,
    pub style_matchup: f64,
    pub home_fitness: f64,
    pub away_fitness: f64,
    pub home_distraction: f64,
    pub away_distraction: f64,
    pub reasoning: String,
}

impl SimulationContext {
    /// The documented neutral default, used whenever upstream data is
    /// unavailable.
    pub fn neutral(reasoning: impl Into<String>) -> Self {
        Self {
            fatigue_score: 50.0,
            lineup_strength: 75.0,
            style_matchup: 1.0,
            home_fitness: 85.0,
            away_fitness: 85.0,
            home_distraction: 15.0,
            away_distraction: 15.0,
            reasoning: reasoning.into(),
        }
    }

    /// Clamp every field into its documented bounds.
    pub fn clamped(mut self) -> Self {
        self.fatigue_score = self.fatigue_score.clamp(0.0, 100.0);
        self.lineup_strength = self.lineup_strength.clamp(0.0, 100.0);
        self.style_matchup = self.style_matchup.clamp(0.25, 4.0);
        self.home_fitness = self.home_fitness.clamp(0.0, 100.0);
        self.away_fitness = self.away_fitness.clamp(0.0, 100.0);
        self.home_distraction = self.home_distraction.clamp(0.0, 100.0);
        self.away_distraction = self.away_distraction.clamp(0.0, 100.0);
        self
    }

    /// Whether the numeric fields equal the neutral default's.
    pub fn is_neutral(&self) -> bool {
        let n = Self::neutral("");
        self.fatigue_score == n.fatigue_score
            && self.lineup_strength == n.lineup_strength
            && self.style_matchup == n.style_matchup
            && self.home_fitness == n.home_fitness
            && self.away_fitness == n.away_fitness
            && self.home_distraction == n.home_distraction
            && self.away_distraction == n.away_distraction
    }
}

// ---------------------------------------------------------------------------
// Tesseract result
// ---------------------------------------------------------------------------

/// Output of the stochastic match simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesseractResult {
    pub home_win_probability: f64,
    pub draw_probability: f64,
    pub away_win_probability: f64,
    /// Literal "H-A" string, e.g. "2-1".
    pub most_likely_score: String,
}

impl TesseractResult {
    /// Sum of the three outcome probabilities.
    pub fn probability_sum(&self) -> f64 {
        self.home_win_probability + self.draw_probability + self.away_win_probability
    }

    /// Whether the triple is internally consistent within tolerance.
    pub fn is_consistent(&self, tolerance: f64) -> bool {
        (self.probability_sum() - 1.0).abs() <= tolerance
    }
}

impl fmt::Display for TesseractResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "H {:.1}% / D {:.1}% / A {:.1}% (most likely {})",
            self.home_win_probability * 100.0,
            self.draw_probability * 100.0,
            self.away_win_probability * 100.0,
            self.most_likely_score,
        )
    }
}

/// Parse a "H-A" scoreline string into goal counts.
/// Both sides must be non-empty runs of ASCII digits.
pub fn parse_score(score: &str) -> Option<(u32, u32)> {
    let (h, a) = score.split_once('-')?;
    if h.is_empty() || a.is_empty() {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !a.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((h.parse().ok()?, a.parse().ok()?))
}

// ---------------------------------------------------------------------------
// LLMGRADE enhancement
// ---------------------------------------------------------------------------

/// Kind of qualitative context signal detected by the grading layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextFactorKind {
    Injuries,
    Suspensions,
    Sentiment,
    News,
    FormAnomaly,
    Motivation,
    Weather,
    Other,
}

impl fmt::Display for ContextFactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextFactorKind::Injuries => write!(f, "INJURIES"),
            ContextFactorKind::Suspensions => write!(f, "SUSPENSIONS"),
            ContextFactorKind::Sentiment => write!(f, "SENTIMENT"),
            ContextFactorKind::News => write!(f, "NEWS"),
            ContextFactorKind::FormAnomaly => write!(f, "FORM_ANOMALY"),
            ContextFactorKind::Motivation => write!(f, "MOTIVATION"),
            ContextFactorKind::Weather => write!(f, "WEATHER"),
            ContextFactorKind::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for ContextFactorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "INJURIES" | "INJURY" => Ok(ContextFactorKind::Injuries),
            "SUSPENSIONS" | "SUSPENSION" => Ok(ContextFactorKind::Suspensions),
            "SENTIMENT" => Ok(ContextFactorKind::Sentiment),
            "NEWS" => Ok(ContextFactorKind::News),
            "FORM_ANOMALY" | "FORM" => Ok(ContextFactorKind::FormAnomaly),
            "MOTIVATION" => Ok(ContextFactorKind::Motivation),
            "WEATHER" => Ok(ContextFactorKind::Weather),
            "OTHER" => Ok(ContextFactorKind::Other),
            other => Err(anyhow::anyhow!("Unknown context factor kind: {other}")),
        }
    }
}

/// One detected qualitative signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFactor {
    pub kind: ContextFactorKind,
    pub description: String,
    /// Relative importance, 0.0–1.0.
    pub weight: f64,
}

/// Overall contextual risk derived from the grading score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Derive a risk level from an overall context score (0–10).
    pub fn from_score(score: f64) -> Self {
        if score <= 3.0 {
            RiskLevel::Low
        } else if score <= 6.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Optional qualitative enhancement produced by the LLMGRADE layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGradeEnhancement {
    pub context_factors: Vec<ContextFactor>,
    pub outlier_scenarios: Vec<String>,
    /// 0–10; higher means more contextual risk around the base model.
    pub overall_context_score: f64,
    pub overall_risk_level: RiskLevel,
}

impl LlmGradeEnhancement {
    /// Count of injury-type factors (one factor per flagged player/group).
    pub fn injury_count(&self) -> u32 {
        self.context_factors
            .iter()
            .filter(|f| f.kind == ContextFactorKind::Injuries)
            .count() as u32
    }

    /// Sum of factor weights, a rough measure of contextual turbulence.
    pub fn total_factor_weight(&self) -> f64 {
        self.context_factors.iter().map(|f| f.weight).sum()
    }
}

// ---------------------------------------------------------------------------
// Oracle analysis (aggregate result)
// ---------------------------------------------------------------------------

/// Aggregate result of one analysis request. Created once per request and
/// enriched in place as later pipeline stages complete; the terminal value
/// is returned to the caller and logged to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleAnalysis {
    pub home_power_score: f64,
    pub away_power_score: f64,
    /// Scoreline string ("H-A"), or "Error" for a terminal degraded result.
    pub prediction: String,
    /// 0–100.
    pub confidence: u32,
    pub reasoning: String,
    pub standings_source: StandingsSource,
    pub confidence_adjustment: f64,
    pub tesseract: Option<TesseractResult>,
    pub simulation_context: Option<SimulationContext>,
    pub llm_grade_enhancement: Option<LlmGradeEnhancement>,
}

impl OracleAnalysis {
    /// Terminal degraded analysis for a truly unexpected failure.
    /// The caller always receives a well-formed value, never an error.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            home_power_score: 0.0,
            away_power_score: 0.0,
            prediction: "Error".to_string(),
            confidence: 0,
            reasoning: reason.into(),
            standings_source: StandingsSource::Default,
            confidence_adjustment: 0.0,
            tesseract: None,
            simulation_context: None,
            llm_grade_enhancement: None,
        }
    }

    /// Home-minus-away power differential.
    pub fn power_differential(&self) -> f64 {
        self.home_power_score - self.away_power_score
    }
}

impl fmt::Display for OracleAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (conf {}%) | power {:.1} vs {:.1} | standings {}",
            self.prediction,
            self.confidence,
            self.home_power_score,
            self.away_power_score,
            self.standings_source,
        )
    }
}

// ---------------------------------------------------------------------------
// Trinity metrics cache entry
// ---------------------------------------------------------------------------

/// Cache row for a computed simulation context, keyed primarily by fixture
/// id and secondarily by (home, away, season). Written on every successful
/// or fallback Trinity computation; read before compute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrinityMetricsEntry {
    pub fixture_id: i64,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub season: u32,
    pub fatigue_score: f64,
    pub lineup_strength: f64,
    pub style_matchup: f64,
    pub home_fitness: f64,
    pub away_fitness: f64,
    pub home_distraction: f64,
    pub away_distraction: f64,
    pub reasoning: String,
    pub cached_at: DateTime<Utc>,
}

impl TrinityMetricsEntry {
    pub fn from_context(
        fixture_id: i64,
        home_team_id: u32,
        away_team_id: u32,
        season: u32,
        ctx: &SimulationContext,
    ) -> Self {
        Self {
            fixture_id,
            home_team_id,
            away_team_id,
            season,
            fatigue_score: ctx.fatigue_score,
            lineup_strength: ctx.lineup_strength,
            style_matchup: ctx.style_matchup,
            home_fitness: ctx.home_fitness,
            away_fitness: ctx.away_fitness,
            home_distraction: ctx.home_distraction,
            away_distraction: ctx.away_distraction,
            reasoning: ctx.reasoning.clone(),
            cached_at: Utc::now(),
        }
    }

    pub fn to_context(&self) -> SimulationContext {
        SimulationContext {
            fatigue_score: self.fatigue_score,
            lineup_strength: self.lineup_strength,
            style_matchup: self.style_matchup,
            home_fitness: self.home_fitness,
            away_fitness: self.away_fitness,
            home_distraction: self.home_distraction,
            away_distraction: self.away_distraction,
            reasoning: self.reasoning.clone(),
        }
    }

    /// Whether this entry is older than the given TTL.
    pub fn is_expired(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.cached_at > ttl
    }
}

// ---------------------------------------------------------------------------
// Prediction ledger record
// ---------------------------------------------------------------------------

/// Validation failures for a ledger record. Fatal for that record;
/// never silently coerced.
#[derive(Debug, thiserror::Error)]
pub enum LedgerValidationError {
    #[error("fixture id must be positive, got {0}")]
    NonPositiveFixtureId(i64),

    #[error("match name must not be blank")]
    BlankMatchName,

    #[error("predicted score {0:?} does not match H-A pattern")]
    MalformedScore(String),

    #[error("{field} probability {value} outside [0, 1]")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("probability sum {0:.3} outside [0.90, 1.10]")]
    ProbabilitySum(f64),

    #[error("{field} value {value} outside [0, 100]")]
    MetricOutOfRange { field: &'static str, value: f64 },

    #[error("context score {0} outside [0, 10]")]
    ContextScoreOutOfRange(f64),

    #[error("timestamp must be positive, got {0}")]
    NonPositiveTimestamp(i64),
}

/// Immutable ledger row, created at the end of every analysis for later
/// reconciliation against the real match result. The `actual_*` fields are
/// filled by a separate reconciliation process, never by this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionLogRecord {
    /// Positive; a composite of the two team ids when no real fixture exists.
    pub fixture_id: i64,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub match_name: String,
    pub predicted_score: String,
    pub home_prob: f64,
    pub draw_prob: f64,
    pub away_prob: f64,
    pub home_fitness: f64,
    pub home_distraction: f64,
    pub llm_grade_context_score: Option<f64>,
    pub llm_grade_risk_level: Option<RiskLevel>,
    pub actual_score: Option<String>,
    pub outcome_correct: Option<bool>,
    pub exact_score_correct: Option<bool>,
    /// Unix millis, > 0.
    pub timestamp: i64,
}

impl PredictionLogRecord {
    /// Validating constructor. Every invariant is checked here; both the
    /// fire-and-forget path and the public `record` path go through it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fixture_id: i64,
        home_team_id: u32,
        away_team_id: u32,
        match_name: String,
        predicted_score: String,
        home_prob: f64,
        draw_prob: f64,
        away_prob: f64,
        home_fitness: f64,
        home_distraction: f64,
        llm_grade_context_score: Option<f64>,
        llm_grade_risk_level: Option<RiskLevel>,
        timestamp: i64,
    ) -> Result<Self, LedgerValidationError> {
        if fixture_id <= 0 {
            return Err(LedgerValidationError::NonPositiveFixtureId(fixture_id));
        }
        if match_name.trim().is_empty() {
            return Err(LedgerValidationError::BlankMatchName);
        }
        if parse_score(&predicted_score).is_none() {
            return Err(LedgerValidationError::MalformedScore(predicted_score));
        }
        for (field, value) in [
            ("home", home_prob),
            ("draw", draw_prob),
            ("away", away_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LedgerValidationError::ProbabilityOutOfRange { field, value });
            }
        }
        let sum = home_prob + draw_prob + away_prob;
        if !(0.90..=1.10).contains(&sum) {
            return Err(LedgerValidationError::ProbabilitySum(sum));
        }
        for (field, value) in [
            ("home_fitness", home_fitness),
            ("home_distraction", home_distraction),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(LedgerValidationError::MetricOutOfRange { field, value });
            }
        }
        if let Some(score) = llm_grade_context_score {
            if !(0.0..=10.0).contains(&score) {
                return Err(LedgerValidationError::ContextScoreOutOfRange(score));
            }
        }
        if timestamp <= 0 {
            return Err(LedgerValidationError::NonPositiveTimestamp(timestamp));
        }

        Ok(Self {
            fixture_id,
            home_team_id,
            away_team_id,
            match_name,
            predicted_score,
            home_prob,
            draw_prob,
            away_prob,
            home_fitness,
            home_distraction,
            llm_grade_context_score,
            llm_grade_risk_level,
            actual_score: None,
            outcome_correct: None,
            exact_score_correct: None,
            timestamp,
        })
    }

    /// Build a record from a terminal analysis. Fails with the same
    /// validation errors as `new` (e.g. a terminal "Error" prediction is
    /// not a loggable scoreline).
    pub fn from_analysis(
        fixture_id: i64,
        home_team_id: u32,
        away_team_id: u32,
        match_name: String,
        analysis: &OracleAnalysis,
    ) -> Result<Self, LedgerValidationError> {
        let (home_prob, draw_prob, away_prob) = match &analysis.tesseract {
            Some(t) => (
                t.home_win_probability,
                t.draw_probability,
                t.away_win_probability,
            ),
            // No simulator output: log an uninformative uniform triple.
            None => (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0),
        };
        let (home_fitness, home_distraction) = match &analysis.simulation_context {
            Some(c) => (c.home_fitness, c.home_distraction),
            None => {
                let n = SimulationContext::neutral("");
                (n.home_fitness, n.home_distraction)
            }
        };
        Self::new(
            fixture_id,
            home_team_id,
            away_team_id,
            match_name,
            analysis.prediction.clone(),
            home_prob,
            draw_prob,
            away_prob,
            home_fitness,
            home_distraction,
            analysis
                .llm_grade_enhancement
                .as_ref()
                .map(|g| g.overall_context_score),
            analysis
                .llm_grade_enhancement
                .as_ref()
                .map(|g| g.overall_risk_level),
            Utc::now().timestamp_millis(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the engine.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Data provider error ({source_name}): {message}")]
    DataProvider { source_name: String, message: String },

    #[error("LLM error ({model}): {message}")]
    Llm { model: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ledger validation failed: {0}")]
    Validation(#[from] LedgerValidationError),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! OpenRouter LLM integration.
//!
//! Routes all LLM calls through OpenRouter's unified API, giving access to
//! multiple model providers with a single API key. Uses the OpenAI-compatible
//! chat completions format.
//!
//! The model is asked for strict JSON; parsing tolerates prose around the
//! payload by extracting the outermost JSON object from the response text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GradeAssessment, MatchBrief, QualitativeAnalyst, TrinityAssessment};
use crate::types::{ContextFactor, ContextFactorKind, TesseractResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-sonnet-4";

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors per model attempt.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

// ---------------------------------------------------------------------------
// Model output shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TrinityPayload {
    #[serde(default = "default_metric")]
    fatigue_score: f64,
    #[serde(default = "default_lineup")]
    lineup_strength: f64,
    #[serde(default = "default_ratio")]
    style_matchup: f64,
    #[serde(default = "default_fitness")]
    home_fitness: f64,
    #[serde(default = "default_fitness")]
    away_fitness: f64,
    #[serde(default = "default_distraction")]
    home_distraction: f64,
    #[serde(default = "default_distraction")]
    away_distraction: f64,
    #[serde(default)]
    reasoning: String,
}

fn default_metric() -> f64 {
    50.0
}
fn default_lineup() -> f64 {
    75.0
}
fn default_ratio() -> f64 {
    1.0
}
fn default_fitness() -> f64 {
    85.0
}
fn default_distraction() -> f64 {
    15.0
}

#[derive(Debug, Deserialize)]
struct GradePayload {
    #[serde(default)]
    context_factors: Vec<FactorPayload>,
    #[serde(default)]
    outlier_scenarios: Vec<String>,
    #[serde(default)]
    overall_context_score: f64,
}

#[derive(Debug, Deserialize)]
struct FactorPayload {
    #[serde(rename = "type", default)]
    factor_type: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    weight: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterClient {
    http: Client,
    api_key: SecretString,
    primary_model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
}

impl OpenRouterClient {
    pub fn new(
        api_key: SecretString,
        primary_model: Option<String>,
        fallback_model: Option<String>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key,
            primary_model: primary_model.unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    /// Send a chat completion request, trying the primary model first and
    /// the fallback model (if configured) after the primary is exhausted.
    async fn complete(&self, system: &str, user_message: &str) -> Result<String> {
        match self.call_model(&self.primary_model, system, user_message).await {
            Ok(text) => Ok(text),
            Err(primary_err) => match &self.fallback_model {
                Some(fallback) => {
                    warn!(
                        primary = %self.primary_model,
                        fallback = %fallback,
                        error = %primary_err,
                        "Primary model failed, trying fallback"
                    );
                    self.call_model(fallback, system, user_message).await
                }
                None => Err(primary_err),
            },
        }
    }

    /// Send a chat completion request for a specific model,
    /// with retry + exponential backoff.
    async fn call_model(&self, model: &str, system: &str, user_message: &str) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, model, "Retrying OpenRouter API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(OPENROUTER_API_URL)
                .header(
                    "Authorization",
                    format!("Bearer {}", self.api_key.expose_secret()),
                )
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenRouter response")?;

                        let text = body
                            .choices
                            .first()
                            .and_then(|c| c.message.as_ref())
                            .map(|m| m.content.clone())
                            .unwrap_or_default();

                        if text.is_empty() {
                            anyhow::bail!("OpenRouter returned an empty completion");
                        }
                        return Ok(text);
                    }

                    // Retryable errors: 429 (rate limit), 500+
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable OpenRouter API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenRouter API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "OpenRouter request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "OpenRouter API failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }

    // -- Prompts -----------------------------------------------------------

    fn trinity_system_prompt() -> &'static str {
        "You are a football match analyst producing contextual metrics for a \
         simulation engine. Given standings, recent form, and fixture data, \
         assess the match context.\n\n\
         Respond with ONLY a JSON object, no prose:\n\
         {\"fatigue_score\": 0-100, \"lineup_strength\": 0-100, \
          \"style_matchup\": ratio around 1.0 (>1 favours the home side), \
          \"home_fitness\": 0-100, \"away_fitness\": 0-100, \
          \"home_distraction\": 0-100, \"away_distraction\": 0-100, \
          \"reasoning\": \"one-paragraph summary\"}\n\n\
         fatigue_score and lineup_strength describe the HOME side relative \
         to the away side. Higher fatigue means a more congested schedule."
    }

    fn grade_system_prompt() -> &'static str {
        "You are a football match risk grader. Given a base model prediction \
         and match context, identify qualitative factors the numeric model \
         cannot see (injuries, suspensions, sentiment, news, form anomalies, \
         motivation, weather).\n\n\
         Respond with ONLY a JSON object, no prose:\n\
         {\"context_factors\": [{\"type\": \"INJURIES|SUSPENSIONS|SENTIMENT|NEWS|FORM_ANOMALY|MOTIVATION|WEATHER|OTHER\", \
           \"description\": \"...\", \"weight\": 0.0-1.0}],\n\
          \"outlier_scenarios\": [\"...\"],\n\
          \"overall_context_score\": 0-10}\n\n\
         overall_context_score reflects how much contextual risk surrounds \
         the base prediction: 0 = nothing notable, 10 = extreme turbulence. \
         Emit one INJURIES factor per flagged player or group."
    }

    fn build_trinity_prompt(brief: &MatchBrief) -> String {
        format!(
            "FIXTURE: {} (season {})\nHOME TEAM ID: {}\nAWAY TEAM ID: {}\n\nDATA:\n{}\n",
            brief.fixture_id, brief.season, brief.home_team_id, brief.away_team_id,
            brief.data_summary,
        )
    }

    fn build_grade_prompt(brief: &MatchBrief, tesseract: &TesseractResult) -> String {
        format!(
            "FIXTURE: {} (season {})\nHOME TEAM ID: {}\nAWAY TEAM ID: {}\n\n\
             BASE PREDICTION: {} (H {:.1}% / D {:.1}% / A {:.1}%)\n\nDATA:\n{}\n",
            brief.fixture_id,
            brief.season,
            brief.home_team_id,
            brief.away_team_id,
            tesseract.most_likely_score,
            tesseract.home_win_probability * 100.0,
            tesseract.draw_probability * 100.0,
            tesseract.away_win_probability * 100.0,
            brief.data_summary,
        )
    }

    // -- Parsing -----------------------------------------------------------

    /// Extract the outermost JSON object from model output that may wrap
    /// the payload in prose or a code fence.
    pub fn extract_json(text: &str) -> Option<&str> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end > start {
            Some(&text[start..=end])
        } else {
            None
        }
    }

    pub fn parse_trinity(text: &str) -> Result<TrinityAssessment> {
        let json = Self::extract_json(text)
            .context("No JSON object found in trinity assessment response")?;
        let payload: TrinityPayload =
            serde_json::from_str(json).context("Malformed trinity assessment JSON")?;
        Ok(TrinityAssessment {
            fatigue_score: payload.fatigue_score,
            lineup_strength: payload.lineup_strength,
            style_matchup: payload.style_matchup,
            home_fitness: payload.home_fitness,
            away_fitness: payload.away_fitness,
            home_distraction: payload.home_distraction,
            away_distraction: payload.away_distraction,
            reasoning: payload.reasoning,
        })
    }

    pub fn parse_grade(text: &str) -> Result<GradeAssessment> {
        let json =
            Self::extract_json(text).context("No JSON object found in grading response")?;
        let payload: GradePayload =
            serde_json::from_str(json).context("Malformed grading JSON")?;
        let context_factors = payload
            .context_factors
            .into_iter()
            .map(|f| ContextFactor {
                kind: f
                    .factor_type
                    .parse()
                    .unwrap_or(ContextFactorKind::Other),
                description: f.description,
                weight: f.weight.clamp(0.0, 1.0),
            })
            .collect();
        Ok(GradeAssessment {
            context_factors,
            outlier_scenarios: payload.outlier_scenarios,
            overall_context_score: payload.overall_context_score,
        })
    }
}

#[async_trait]
impl QualitativeAnalyst for OpenRouterClient {
    async fn assess_trinity(&self, brief: &MatchBrief) -> Result<TrinityAssessment> {
        let prompt = Self::build_trinity_prompt(brief);
        let text = self.complete(Self::trinity_system_prompt(), &prompt).await?;
        Self::parse_trinity(&text)
    }

    async fn grade_context(
        &self,
        brief: &MatchBrief,
        tesseract: &TesseractResult,
    ) -> Result<GradeAssessment> {
        let prompt = Self::build_grade_prompt(brief, tesseract);
        let text = self.complete(Self::grade_system_prompt(), &prompt).await?;
        Self::parse_grade(&text)
    }

    fn model_name(&self) -> &str {
        &self.primary_model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

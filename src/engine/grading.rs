//! LLMGRADE contextual-risk grading.
//!
//! Optional enhancement stage. Absent analyst means absent grading, not
//! an error; any analyst failure is logged and the stage returns `None`
//! so the pipeline continues un-enhanced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::llm::{MatchBrief, QualitativeAnalyst};
use crate::types::{LlmGradeEnhancement, RiskLevel, TesseractResult};

pub struct LlmGrader {
    analyst: Option<Arc<dyn QualitativeAnalyst>>,
    /// Successful gradings keyed by fixture id. Failures are not cached.
    cache: Mutex<HashMap<i64, LlmGradeEnhancement>>,
}

impl LlmGrader {
    pub fn new(analyst: Option<Arc<dyn QualitativeAnalyst>>) -> Self {
        Self {
            analyst,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.analyst.is_some()
    }

    /// Grade the contextual risk around a base prediction. `None` when
    /// the analyst is unconfigured or fails. `force_refresh` bypasses
    /// the response cache.
    pub async fn grade(
        &self,
        brief: &MatchBrief,
        tesseract: &TesseractResult,
        force_refresh: bool,
    ) -> Option<LlmGradeEnhancement> {
        let analyst = self.analyst.as_ref()?;

        if !force_refresh {
            if let Some(cached) = self.cache.lock().unwrap().get(&brief.fixture_id) {
                debug!(fixture_id = brief.fixture_id, "Grading served from cache");
                return Some(cached.clone());
            }
        }

        match analyst.grade_context(brief, tesseract).await {
            Ok(assessment) => {
                let score = assessment.overall_context_score.clamp(0.0, 10.0);
                debug!(
                    fixture_id = brief.fixture_id,
                    score,
                    factors = assessment.context_factors.len(),
                    "Context grading complete"
                );
                let enhancement = LlmGradeEnhancement {
                    context_factors: assessment.context_factors,
                    outlier_scenarios: assessment.outlier_scenarios,
                    overall_context_score: score,
                    overall_risk_level: RiskLevel::from_score(score),
                };
                self.cache
                    .lock()
                    .unwrap()
                    .insert(brief.fixture_id, enhancement.clone());
                Some(enhancement)
            }
            Err(e) => {
                warn!(
                    fixture_id = brief.fixture_id,
                    model = analyst.model_name(),
                    error = %e,
                    "Context grading failed, continuing without enhancement"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GradeAssessment, TrinityAssessment};
    use crate::types::{ContextFactor, ContextFactorKind};
    use anyhow::Result;
    use async_trait::async_trait;

    struct ScriptedAnalyst {
        score: f64,
        fail: bool,
    }

    #[async_trait]
    impl QualitativeAnalyst for ScriptedAnalyst {
        async fn assess_trinity(&self, _brief: &MatchBrief) -> Result<TrinityAssessment> {
            anyhow::bail!("not used here")
        }

        async fn grade_context(
            &self,
            _brief: &MatchBrief,
            _tesseract: &TesseractResult,
        ) -> Result<GradeAssessment> {
            if self.fail {
                anyhow::bail!("timeout");
            }
            Ok(GradeAssessment {
                context_factors: vec![ContextFactor {
                    kind: ContextFactorKind::Injuries,
                    description: "Top scorer out".to_string(),
                    weight: 0.8,
                }],
                outlier_scenarios: vec!["Early red card".to_string()],
                overall_context_score: self.score,
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn brief() -> MatchBrief {
        MatchBrief {
            fixture_id: 9001,
            home_team_id: 50,
            away_team_id: 42,
            season: 2025,
            data_summary: String::new(),
        }
    }

    fn tesseract() -> TesseractResult {
        TesseractResult {
            home_win_probability: 0.5,
            draw_probability: 0.3,
            away_win_probability: 0.2,
            most_likely_score: "2-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_returns_none() {
        let grader = LlmGrader::new(None);
        assert!(!grader.is_configured());
        assert!(grader.grade(&brief(), &tesseract(), false).await.is_none());
    }

    #[tokio::test]
    async fn test_failure_returns_none() {
        let grader = LlmGrader::new(Some(Arc::new(ScriptedAnalyst {
            score: 5.0,
            fail: true,
        })));
        assert!(grader.grade(&brief(), &tesseract(), false).await.is_none());
    }

    #[tokio::test]
    async fn test_success_derives_risk_level() {
        let grader = LlmGrader::new(Some(Arc::new(ScriptedAnalyst {
            score: 7.5,
            fail: false,
        })));
        let grade = grader.grade(&brief(), &tesseract(), false).await.unwrap();
        assert_eq!(grade.overall_context_score, 7.5);
        assert_eq!(grade.overall_risk_level, RiskLevel::High);
        assert_eq!(grade.injury_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_score_clamped() {
        let grader = LlmGrader::new(Some(Arc::new(ScriptedAnalyst {
            score: 14.0,
            fail: false,
        })));
        let grade = grader.grade(&brief(), &tesseract(), false).await.unwrap();
        assert_eq!(grade.overall_context_score, 10.0);
        assert_eq!(grade.overall_risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingAnalyst {
            calls: AtomicU32,
        }

        #[async_trait]
        impl QualitativeAnalyst for CountingAnalyst {
            async fn assess_trinity(&self, _brief: &MatchBrief) -> Result<TrinityAssessment> {
                anyhow::bail!("not used here")
            }

            async fn grade_context(
                &self,
                _brief: &MatchBrief,
                _tesseract: &TesseractResult,
            ) -> Result<GradeAssessment> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(GradeAssessment {
                    context_factors: Vec::new(),
                    outlier_scenarios: Vec::new(),
                    overall_context_score: 2.0,
                })
            }

            fn model_name(&self) -> &str {
                "counting"
            }
        }

        let analyst = Arc::new(CountingAnalyst {
            calls: AtomicU32::new(0),
        });
        let grader = LlmGrader::new(Some(analyst.clone()));

        let first = grader.grade(&brief(), &tesseract(), false).await.unwrap();
        let second = grader.grade(&brief(), &tesseract(), false).await.unwrap();
        assert_eq!(first.overall_context_score, second.overall_context_score);
        assert_eq!(analyst.calls.load(Ordering::SeqCst), 1);

        // force_refresh bypasses the cache.
        let _ = grader.grade(&brief(), &tesseract(), true).await.unwrap();
        assert_eq!(analyst.calls.load(Ordering::SeqCst), 2);
    }
}

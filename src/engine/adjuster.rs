//! Bias-corrected prediction adjustment.
//!
//! Two pure steps. `adjust` folds contextual risk factors into the
//! simulator's scoreline and the power-stage confidence. `quick_fix`
//! then counters the known tendency to over-predict blow-out scorelines
//! when a large power gap coexists with injuries or poor recent form on
//! the favoured side; it only overrides when its own heuristic disagrees,
//! and always explains the override in the reasoning text.

use std::fmt;

use crate::types::{ContextFactor, TesseractResult};

/// Recent-form bucket for the favoured side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormCategory {
    Strong,
    Average,
    Poor,
}

impl FormCategory {
    pub fn from_points_per_game(ppg: f64) -> Self {
        if ppg >= 2.0 {
            FormCategory::Strong
        } else if ppg >= 1.0 {
            FormCategory::Average
        } else {
            FormCategory::Poor
        }
    }
}

impl fmt::Display for FormCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormCategory::Strong => write!(f, "strong"),
            FormCategory::Average => write!(f, "average"),
            FormCategory::Poor => write!(f, "poor"),
        }
    }
}

/// Output of the adjustment stage, written back onto the analysis.
#[derive(Debug, Clone)]
pub struct AdjustedPrediction {
    pub score: String,
    pub confidence: u32,
    pub reasoning: String,
}

/// Fold graded context factors into the base prediction. Each factor's
/// weight shaves confidence; the scoreline is left to `quick_fix`.
pub fn adjust(
    tesseract: &TesseractResult,
    base_confidence: u32,
    base_reasoning: &str,
    factors: &[ContextFactor],
) -> AdjustedPrediction {
    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    let penalty = (total_weight * 6.0).round().min(25.0) as u32;
    let confidence = base_confidence.saturating_sub(penalty).max(5);

    let mut reasoning = base_reasoning.to_string();
    if !factors.is_empty() {
        let kinds: Vec<String> = factors.iter().map(|f| f.kind.to_string()).collect();
        reasoning.push_str(&format!(
            " Contextual risk factors considered ({}): confidence reduced by {}.",
            kinds.join(", "),
            penalty,
        ));
    }

    AdjustedPrediction {
        score: tesseract.most_likely_score.clone(),
        confidence,
        reasoning,
    }
}

/// Heuristic scoreline override. Triggers only when the heuristic's own
/// scoreline disagrees with the adjusted one; the reasoning then carries
/// both the original and corrected scorelines.
pub fn quick_fix(
    mut adjusted: AdjustedPrediction,
    power_differential: f64,
    favored_side_injuries: u32,
    favored_side_form: FormCategory,
) -> AdjustedPrediction {
    let heuristic = heuristic_score(power_differential, favored_side_injuries, favored_side_form);
    if heuristic == adjusted.score {
        return adjusted;
    }

    let original = std::mem::replace(&mut adjusted.score, heuristic.clone());
    adjusted.reasoning.push_str(&format!(
        " Score adjusted from {} to {}: power gap of {:.0} tempered by {} injuries and {} recent form on the favoured side.",
        original,
        heuristic,
        power_differential.abs(),
        favored_side_injuries,
        favored_side_form,
    ));
    adjusted
}

/// Margin band from the raw power gap, pulled in by contextual drag on
/// the favoured side, then mapped to a scoreline.
fn heuristic_score(power_differential: f64, injuries: u32, form: FormCategory) -> String {
    let gap = power_differential.abs();
    let mut band: i32 = if gap >= 40.0 {
        3
    } else if gap >= 18.0 {
        2
    } else if gap >= 8.0 {
        1
    } else {
        0
    };

    if injuries >= 2 {
        band -= 1;
    }
    if form == FormCategory::Poor {
        band -= 1;
    }
    let band = band.max(0);

    let home_favored = power_differential >= 0.0;
    let (favored, other) = match band {
        3 => (3, 0),
        2 => (2, 0),
        1 => (2, 1),
        _ => (1, 1),
    };
    if home_favored {
        format!("{favored}-{other}")
    } else {
        format!("{other}-{favored}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextFactorKind;

    fn tesseract(score: &str) -> TesseractResult {
        TesseractResult {
            home_win_probability: 0.6,
            draw_probability: 0.25,
            away_win_probability: 0.15,
            most_likely_score: score.to_string(),
        }
    }

    fn factor(kind: ContextFactorKind, weight: f64) -> ContextFactor {
        ContextFactor {
            kind,
            description: String::new(),
            weight,
        }
    }

    #[test]
    fn test_form_category() {
        assert_eq!(FormCategory::from_points_per_game(2.4), FormCategory::Strong);
        assert_eq!(FormCategory::from_points_per_game(1.5), FormCategory::Average);
        assert_eq!(FormCategory::from_points_per_game(0.4), FormCategory::Poor);
    }

    #[test]
    fn test_adjust_without_factors() {
        let a = adjust(&tesseract("2-1"), 70, "base", &[]);
        assert_eq!(a.score, "2-1");
        assert_eq!(a.confidence, 70);
        assert_eq!(a.reasoning, "base");
    }

    #[test]
    fn test_adjust_discounts_confidence() {
        let factors = vec![
            factor(ContextFactorKind::Injuries, 0.9),
            factor(ContextFactorKind::Sentiment, 0.5),
        ];
        let a = adjust(&tesseract("2-1"), 70, "base", &factors);
        // 1.4 total weight, penalty round(8.4) = 8.
        assert_eq!(a.confidence, 62);
        assert!(a.reasoning.contains("INJURIES"));
        assert!(a.reasoning.contains("SENTIMENT"));
    }

    #[test]
    fn test_adjust_confidence_floor() {
        let factors = vec![factor(ContextFactorKind::Injuries, 10.0)];
        let a = adjust(&tesseract("2-1"), 10, "base", &factors);
        assert_eq!(a.confidence, 5);
    }

    #[test]
    fn test_quick_fix_overrides_blowout_with_injuries() {
        let adjusted = AdjustedPrediction {
            score: "3-0".to_string(),
            confidence: 80,
            reasoning: "base".to_string(),
        };
        let fixed = quick_fix(adjusted, 45.0, 2, FormCategory::Average);
        assert_eq!(fixed.score, "2-0");
        assert!(fixed.reasoning.contains("Score adjusted from 3-0 to 2-0"));
    }

    #[test]
    fn test_quick_fix_no_override_when_agreeing() {
        let adjusted = AdjustedPrediction {
            score: "3-0".to_string(),
            confidence: 80,
            reasoning: "base".to_string(),
        };
        let fixed = quick_fix(adjusted, 45.0, 0, FormCategory::Strong);
        assert_eq!(fixed.score, "3-0");
        assert_eq!(fixed.reasoning, "base");
    }

    #[test]
    fn test_quick_fix_compounds_injuries_and_poor_form() {
        let adjusted = AdjustedPrediction {
            score: "3-0".to_string(),
            confidence: 80,
            reasoning: String::new(),
        };
        let fixed = quick_fix(adjusted, 45.0, 3, FormCategory::Poor);
        assert_eq!(fixed.score, "2-1");
    }

    #[test]
    fn test_quick_fix_away_favored_mirrored() {
        let adjusted = AdjustedPrediction {
            score: "0-3".to_string(),
            confidence: 80,
            reasoning: String::new(),
        };
        let fixed = quick_fix(adjusted, -45.0, 2, FormCategory::Average);
        assert_eq!(fixed.score, "0-2");
        assert!(fixed.reasoning.contains("0-3"));
        assert!(fixed.reasoning.contains("0-2"));
    }

    #[test]
    fn test_quick_fix_even_match() {
        let adjusted = AdjustedPrediction {
            score: "1-1".to_string(),
            confidence: 50,
            reasoning: String::new(),
        };
        let fixed = quick_fix(adjusted, 2.0, 0, FormCategory::Average);
        assert_eq!(fixed.score, "1-1");
    }
}

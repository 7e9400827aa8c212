//! Tesseract match simulator.
//!
//! Maps two (halved) power scores and a `SimulationContext` to expected
//! goal rates, expands them into an independent-Poisson scoreline grid,
//! and reduces the grid to the outcome probability triple plus the most
//! probable exact scoreline. Fully deterministic: identical inputs give
//! identical outputs.

use crate::types::{SimulationContext, TesseractResult};

/// Scoreline grid covers 0..=MAX_GOALS per side; the tail mass beyond it
/// is folded back in by normalisation.
const MAX_GOALS: usize = 8;

/// Baseline expected goals for evenly matched sides. Home advantage is
/// encoded as the gap between the two.
const HOME_BASE_XG: f64 = 1.45;
const AWAY_BASE_XG: f64 = 1.15;

/// Exponent damping how strongly the strength ratio moves goal rates.
const RATIO_EXPONENT: f64 = 0.65;

const MIN_XG: f64 = 0.2;
const MAX_XG: f64 = 4.5;

/// Simulate a match. `home_power` and `away_power` are in simulator
/// units (power score halved by the caller).
pub fn simulate_match(
    home_power: f64,
    away_power: f64,
    context: &SimulationContext,
) -> TesseractResult {
    let (home_xg, away_xg) = expected_goals(home_power, away_power, context);

    let home_dist = poisson_distribution(home_xg);
    let away_dist = poisson_distribution(away_xg);

    let mut home_win = 0.0;
    let mut draw = 0.0;
    let mut away_win = 0.0;
    let mut best_cell = (0usize, 0usize);
    let mut best_prob = -1.0;
    let mut total = 0.0;

    for h in 0..=MAX_GOALS {
        for a in 0..=MAX_GOALS {
            let p = home_dist[h] * away_dist[a];
            total += p;
            match h.cmp(&a) {
                std::cmp::Ordering::Greater => home_win += p,
                std::cmp::Ordering::Equal => draw += p,
                std::cmp::Ordering::Less => away_win += p,
            }
            if p > best_prob {
                best_prob = p;
                best_cell = (h, a);
            }
        }
    }

    // Normalise so the triple sums to exactly 1 despite grid truncation.
    TesseractResult {
        home_win_probability: home_win / total,
        draw_probability: draw / total,
        away_win_probability: away_win / total,
        most_likely_score: format!("{}-{}", best_cell.0, best_cell.1),
    }
}

/// Perturb the raw powers by the context and convert to goal rates.
fn expected_goals(home_power: f64, away_power: f64, context: &SimulationContext) -> (f64, f64) {
    let ctx = context.clone().clamped();

    let mut home_eff = home_power.max(1.0);
    let mut away_eff = away_power.max(1.0);

    // Fatigue and lineup strength describe the home side relative to the
    // away side; 50 and 75 are their neutral points.
    home_eff *= 1.0 - (ctx.fatigue_score - 50.0) / 250.0;
    home_eff *= 1.0 + (ctx.lineup_strength - 75.0) / 250.0;

    // Per-side fitness lifts, distraction depresses.
    home_eff *= 1.0 + (ctx.home_fitness - 85.0) / 500.0;
    away_eff *= 1.0 + (ctx.away_fitness - 85.0) / 500.0;
    home_eff *= 1.0 - (ctx.home_distraction - 15.0) / 500.0;
    away_eff *= 1.0 - (ctx.away_distraction - 15.0) / 500.0;

    home_eff = home_eff.max(1.0);
    away_eff = away_eff.max(1.0);

    let ratio = home_eff / away_eff;
    let home_xg = (HOME_BASE_XG * ratio.powf(RATIO_EXPONENT) * ctx.style_matchup)
        .clamp(MIN_XG, MAX_XG);
    let away_xg = (AWAY_BASE_XG * ratio.powf(-RATIO_EXPONENT)).clamp(MIN_XG, MAX_XG);

    (home_xg, away_xg)
}

/// Poisson pmf over 0..=MAX_GOALS.
fn poisson_distribution(lambda: f64) -> [f64; MAX_GOALS + 1] {
    let mut dist = [0.0; MAX_GOALS + 1];
    // p(0) = e^-lambda; p(k) = p(k-1) * lambda / k.
    let mut p = (-lambda).exp();
    for (k, slot) in dist.iter_mut().enumerate() {
        if k > 0 {
            p *= lambda / k as f64;
        }
        *slot = p;
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_score;

    fn neutral() -> SimulationContext {
        SimulationContext::neutral("test")
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        for (h, a) in [(25.0, 25.0), (45.0, 10.0), (5.0, 48.0), (1.0, 1.0)] {
            let r = simulate_match(h, a, &neutral());
            assert!(
                r.is_consistent(0.02),
                "sum {} for powers ({h}, {a})",
                r.probability_sum(),
            );
            assert!(r.home_win_probability >= 0.0);
            assert!(r.draw_probability >= 0.0);
            assert!(r.away_win_probability >= 0.0);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = simulate_match(30.0, 20.0, &neutral());
        let b = simulate_match(30.0, 20.0, &neutral());
        assert_eq!(a.home_win_probability, b.home_win_probability);
        assert_eq!(a.most_likely_score, b.most_likely_score);
    }

    #[test]
    fn test_stronger_home_side_favoured() {
        let r = simulate_match(45.0, 15.0, &neutral());
        assert!(r.home_win_probability > r.away_win_probability);
        assert!(r.home_win_probability > 0.5);
    }

    #[test]
    fn test_stronger_away_side_favoured() {
        let r = simulate_match(15.0, 45.0, &neutral());
        assert!(r.away_win_probability > r.home_win_probability);
    }

    #[test]
    fn test_even_match_has_home_edge() {
        // Equal powers still carry home advantage through the base rates.
        let r = simulate_match(25.0, 25.0, &neutral());
        assert!(r.home_win_probability > r.away_win_probability);
    }

    #[test]
    fn test_most_likely_score_is_well_formed() {
        for (h, a) in [(25.0, 25.0), (50.0, 5.0), (5.0, 50.0)] {
            let r = simulate_match(h, a, &neutral());
            let (hg, ag) = parse_score(&r.most_likely_score).expect("H-A scoreline");
            assert!(hg <= MAX_GOALS as u32);
            assert!(ag <= MAX_GOALS as u32);
        }
    }

    #[test]
    fn test_home_distraction_depresses_home_side() {
        let calm = simulate_match(30.0, 25.0, &neutral());
        let mut distracted_ctx = neutral();
        distracted_ctx.home_distraction = 95.0;
        let distracted = simulate_match(30.0, 25.0, &distracted_ctx);
        assert!(distracted.home_win_probability < calm.home_win_probability);
    }

    #[test]
    fn test_fatigue_depresses_home_side() {
        let fresh = simulate_match(30.0, 25.0, &neutral());
        let mut tired_ctx = neutral();
        tired_ctx.fatigue_score = 95.0;
        let tired = simulate_match(30.0, 25.0, &tired_ctx);
        assert!(tired.home_win_probability < fresh.home_win_probability);
    }

    #[test]
    fn test_style_matchup_lifts_home_scoring() {
        let base = simulate_match(25.0, 25.0, &neutral());
        let mut favourable = neutral();
        favourable.style_matchup = 1.6;
        let boosted = simulate_match(25.0, 25.0, &favourable);
        assert!(boosted.home_win_probability > base.home_win_probability);
    }

    #[test]
    fn test_out_of_bounds_context_is_clamped() {
        let mut wild = neutral();
        wild.fatigue_score = 400.0;
        wild.style_matchup = 50.0;
        let r = simulate_match(25.0, 25.0, &wild);
        assert!(r.is_consistent(0.02));
    }

    #[test]
    fn test_poisson_distribution_shape() {
        let dist = poisson_distribution(1.5);
        let total: f64 = dist.iter().sum();
        assert!(total > 0.95 && total <= 1.0);
        // Mode of Poisson(1.5) is 1.
        assert!(dist[1] >= dist[0]);
        assert!(dist[1] >= dist[2]);
    }
}

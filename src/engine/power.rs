//! Deterministic power-score calculation.
//!
//! Pure functions from standing snapshots to a 0-100 power score per
//! team, a seed scoreline, and a confidence figure. Monotone in rank,
//! points per game, and goal difference per game.

use crate::types::StandingSnapshot;

/// Output of the power stage. Power scores feed the simulator (after
/// halving to map power units to attack-strength units); the seed and
/// confidence feed the analysis text.
#[derive(Debug, Clone)]
pub struct PowerScores {
    pub home_power_score: f64,
    pub away_power_score: f64,
    /// Scoreline implied by the raw power gap, before simulation.
    pub prediction_seed: String,
    /// 0-100, already discounted by the standings fallback level.
    pub confidence: u32,
}

impl PowerScores {
    pub fn power_differential(&self) -> f64 {
        self.home_power_score - self.away_power_score
    }
}

/// Weight constants. Rank contributes up to 40 points, points-per-game
/// up to 45, goal-difference-per-game up to 15.
const RANK_WEIGHT: f64 = 2.0;
const PPG_WEIGHT: f64 = 15.0;
const GDPG_WEIGHT: f64 = 2.5;

/// Compute both power scores and the derived seed/confidence.
pub fn calculate(
    home: &StandingSnapshot,
    away: &StandingSnapshot,
    confidence_adjustment: f64,
) -> PowerScores {
    let home_power = team_power(home);
    let away_power = team_power(away);
    let diff = home_power - away_power;

    // Base 50 at even strength, growing with the gap, capped before the
    // fallback discount so a degraded chain can never report near-certainty.
    let confidence = ((50.0 + diff.abs() * 0.8).min(95.0) * confidence_adjustment.clamp(0.0, 1.0))
        .round()
        .clamp(0.0, 100.0) as u32;

    PowerScores {
        home_power_score: home_power,
        away_power_score: away_power,
        prediction_seed: seed_score(diff).to_string(),
        confidence,
    }
}

/// A single team's power on a 0-100 scale.
pub fn team_power(snapshot: &StandingSnapshot) -> f64 {
    let rank_component = (21.0 - snapshot.rank as f64).max(0.0) * RANK_WEIGHT;
    let ppg_component = snapshot.points_per_game().clamp(0.0, 3.0) * PPG_WEIGHT;
    let gdpg_component = (snapshot.goal_diff_per_game().clamp(-3.0, 3.0) + 3.0) * GDPG_WEIGHT;
    rank_component + ppg_component + gdpg_component
}

/// Scoreline implied by a raw power differential.
fn seed_score(diff: f64) -> &'static str {
    match diff {
        d if d >= 30.0 => "3-0",
        d if d >= 18.0 => "2-0",
        d if d >= 8.0 => "2-1",
        d if d > -8.0 => "1-1",
        d if d > -18.0 => "1-2",
        d if d > -30.0 => "0-2",
        _ => "0-3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StandingsSource;

    fn snapshot(rank: u32, points: i32, gd: i32, gp: u32) -> StandingSnapshot {
        StandingSnapshot {
            rank,
            points,
            goals_diff: gd,
            games_played: gp,
            source: StandingsSource::CurrentSeason,
            confidence_adjustment: 1.0,
        }
    }

    #[test]
    fn test_power_in_bounds() {
        let best = snapshot(1, 60, 60, 20);
        let worst = snapshot(20, 0, -60, 20);
        assert!(team_power(&best) <= 100.0);
        assert!(team_power(&worst) >= 0.0);
        assert!(team_power(&best) > team_power(&worst));
    }

    #[test]
    fn test_monotone_in_rank() {
        for rank in 2..=20 {
            let better = snapshot(rank - 1, 30, 0, 20);
            let worse = snapshot(rank, 30, 0, 20);
            assert!(
                team_power(&better) >= team_power(&worse),
                "rank {} should not out-power rank {}",
                rank,
                rank - 1,
            );
        }
    }

    #[test]
    fn test_monotone_in_points_per_game() {
        for points in (0..60).step_by(3) {
            let better = snapshot(10, points + 3, 0, 20);
            let worse = snapshot(10, points, 0, 20);
            assert!(team_power(&better) >= team_power(&worse));
        }
    }

    #[test]
    fn test_monotone_in_goal_diff_per_game() {
        for gd in -40..40 {
            let better = snapshot(10, 30, gd + 1, 20);
            let worse = snapshot(10, 30, gd, 20);
            assert!(team_power(&better) >= team_power(&worse));
        }
    }

    #[test]
    fn test_calculate_even_match() {
        let s = snapshot(10, 30, 0, 20);
        let out = calculate(&s, &s.clone(), 1.0);
        assert_eq!(out.prediction_seed, "1-1");
        assert_eq!(out.confidence, 50);
        assert_eq!(out.power_differential(), 0.0);
    }

    #[test]
    fn test_calculate_lopsided_match() {
        let strong = snapshot(1, 55, 45, 20);
        let weak = snapshot(20, 8, -35, 20);
        let out = calculate(&strong, &weak, 1.0);
        assert_eq!(out.prediction_seed, "3-0");
        assert!(out.confidence > 80);
        assert!(out.confidence <= 95);
        assert!(out.power_differential() > 40.0);
    }

    #[test]
    fn test_confidence_discounted_by_fallback() {
        let strong = snapshot(1, 55, 45, 20);
        let weak = snapshot(20, 8, -35, 20);
        let full = calculate(&strong, &weak, 1.0);
        let degraded = calculate(&strong, &weak, 0.40);
        assert!(degraded.confidence < full.confidence);
        assert!(degraded.confidence <= 100);
    }

    #[test]
    fn test_seed_score_mirrored() {
        assert_eq!(seed_score(35.0), "3-0");
        assert_eq!(seed_score(-35.0), "0-3");
        assert_eq!(seed_score(10.0), "2-1");
        assert_eq!(seed_score(-10.0), "1-2");
        assert_eq!(seed_score(0.0), "1-1");
    }
}

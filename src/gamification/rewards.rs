//! Point-award policies: quiz completion tiers, daily eco-challenge days and
//! one-shot fun challenges. All functions here are pure; at-most-once checks
//! live in the activity store.

use serde::Serialize;

use crate::config::RewardConfig;

/// Seconds per question assumed when a quiz attempt carries no timing.
pub const DEFAULT_SECONDS_PER_QUESTION: f64 = 60.0;

/// `(minimum score percentage, bonus percent of base)`, best tier first.
const SCORE_BONUS_TIERS: [(f64, u32); 3] = [(90.0, 50), (80.0, 30), (70.0, 10)];
/// `(seconds-per-question upper bound, bonus percent of base)`, fastest first.
const SPEED_BONUS_TIERS: [(f64, u32); 2] = [(30.0, 20), (60.0, 10)];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct QuizReward {
    pub base: u32,
    pub bonus: u32,
    pub speed: u32,
    pub total: u32,
}

fn percent_of(base: u32, percent: u32) -> u32 {
    base.saturating_mul(percent) / 100
}

/// Base points for a difficulty tier; unknown tiers get the fallback.
pub fn quiz_base_points(cfg: &RewardConfig, difficulty: &str) -> u32 {
    cfg.quiz_base_points
        .get(&difficulty.trim().to_ascii_lowercase())
        .copied()
        .unwrap_or(cfg.quiz_fallback_points)
}

pub fn score_bonus(base: u32, score_percentage: f64) -> u32 {
    SCORE_BONUS_TIERS
        .iter()
        .find(|(min, _)| score_percentage >= *min)
        .map(|(_, pct)| percent_of(base, *pct))
        .unwrap_or(0)
}

pub fn speed_bonus(base: u32, seconds_per_question: Option<f64>) -> u32 {
    let secs = seconds_per_question.unwrap_or(DEFAULT_SECONDS_PER_QUESTION);
    SPEED_BONUS_TIERS
        .iter()
        .find(|(max, _)| secs < *max)
        .map(|(_, pct)| percent_of(base, *pct))
        .unwrap_or(0)
}

/// Score and speed bonuses are independent and stack on top of the base.
pub fn quiz_reward(
    cfg: &RewardConfig,
    difficulty: &str,
    score_percentage: f64,
    seconds_per_question: Option<f64>,
) -> QuizReward {
    let base = quiz_base_points(cfg, difficulty);
    let bonus = score_bonus(base, score_percentage);
    let speed = speed_bonus(base, seconds_per_question);
    QuizReward { base, bonus, speed, total: base + bonus + speed }
}

/// Share of a challenge's points earned for one completed day.
pub fn daily_challenge_points(challenge_points: u32, duration_days: u32) -> u32 {
    challenge_points / duration_days.max(1)
}

pub fn fun_challenge_points(cfg: &RewardConfig) -> u32 {
    cfg.fun_challenge_points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_points_by_tier() {
        let cfg = RewardConfig::default();
        assert_eq!(quiz_base_points(&cfg, "beginner"), 10);
        assert_eq!(quiz_base_points(&cfg, "intermediate"), 25);
        assert_eq!(quiz_base_points(&cfg, "Advanced"), 50);
        assert_eq!(quiz_base_points(&cfg, "expert"), 15);
    }

    #[test]
    fn bonuses_stack() {
        let cfg = RewardConfig::default();
        let r = quiz_reward(&cfg, "advanced", 95.0, Some(25.0));
        assert_eq!(r, QuizReward { base: 50, bonus: 25, speed: 10, total: 85 });
    }

    #[test]
    fn score_tiers_floor() {
        assert_eq!(score_bonus(25, 90.0), 12);
        assert_eq!(score_bonus(25, 85.0), 7);
        assert_eq!(score_bonus(25, 70.0), 2);
        assert_eq!(score_bonus(25, 69.9), 0);
    }

    #[test]
    fn speed_tiers_and_missing_timing() {
        assert_eq!(speed_bonus(50, Some(29.9)), 10);
        assert_eq!(speed_bonus(50, Some(30.0)), 5);
        assert_eq!(speed_bonus(50, Some(60.0)), 0);
        assert_eq!(speed_bonus(50, None), 0);
    }

    #[test]
    fn slow_low_score_gets_base_only() {
        let cfg = RewardConfig::default();
        let r = quiz_reward(&cfg, "beginner", 40.0, Some(120.0));
        assert_eq!(r.total, 10);
    }

    #[test]
    fn daily_share_is_floored() {
        assert_eq!(daily_challenge_points(150, 7), 21);
        assert_eq!(daily_challenge_points(300, 14), 21);
        assert_eq!(daily_challenge_points(120, 0), 120);
    }

    #[test]
    fn fun_challenge_is_flat() {
        assert_eq!(fun_challenge_points(&RewardConfig::default()), 50);
    }
}

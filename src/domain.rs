//! Domain models used by the backend: the per-user ledger, badge catalog entries,
//! eco challenges and their completion records, and quiz attempts.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::gamification::progression::progression_for;

/// Kind of point-affecting action recorded in the ledger history.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
  QuizCompletion,
  DailyChallenge,
  FunChallenge,
  BadgeReward,
}

impl LedgerAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      LedgerAction::QuizCompletion => "quiz_completion",
      LedgerAction::DailyChallenge => "daily_challenge",
      LedgerAction::FunChallenge => "fun_challenge",
      LedgerAction::BadgeReward => "badge_reward",
    }
  }
}

/// One immutable record of a point-affecting action.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub action: LedgerAction,
  pub points: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reference_id: Option<String>,
  pub date: DateTime<Utc>,
  pub description: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
  pub current: u32,
  pub longest: u32,
  pub last_activity_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medals {
  pub bronze: u32,
  pub silver: u32,
  pub gold: u32,
  pub platinum: u32,
}

/// Environmental impact reported for a completed task (kg, kg CO2, liters, kWh).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
  #[serde(default)] pub plastic_saved: f64,
  #[serde(default)] pub co2_reduced: f64,
  #[serde(default)] pub water_saved: f64,
  #[serde(default)] pub energy_saved: f64,
}

impl Impact {
  pub fn accumulate(&mut self, other: &Impact) {
    self.plastic_saved += other.plastic_saved;
    self.co2_reduced += other.co2_reduced;
    self.water_saved += other.water_saved;
    self.energy_saved += other.energy_saved;
  }

  pub fn is_valid(&self) -> bool {
    [self.plastic_saved, self.co2_reduced, self.water_saved, self.energy_saved]
      .iter()
      .all(|v| v.is_finite() && *v >= 0.0)
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
  pub challenges_completed: u32,
  pub total_impact: Impact,
  pub days_active: u32,
  pub perfect_weeks: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
  pub id: String,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub points: u32,
  pub date_earned: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadge {
  pub badge_id: String,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub category: BadgeCategory,
  pub date_earned: DateTime<Utc>,
}

/// Per-user aggregate. Level fields are always derived from `total_points`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLedger {
  pub user_id: String,
  #[serde(default)]
  pub version: u64,
  pub total_points: i64,
  pub current_level: u32,
  pub level_title: String,
  pub points_to_next_level: i64,
  pub streak: Streak,
  pub history: Vec<HistoryEntry>,
  pub achievements: Vec<Achievement>,
  pub badges: Vec<EarnedBadge>,
  pub medals: Medals,
  pub stats: LedgerStats,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl UserLedger {
  /// Fresh ledger with every counter zeroed.
  pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
    let progression = progression_for(0);
    Self {
      user_id: user_id.into(),
      version: 0,
      total_points: 0,
      current_level: progression.level,
      level_title: progression.title.to_string(),
      points_to_next_level: progression.points_to_next,
      streak: Streak::default(),
      history: Vec::new(),
      achievements: Vec::new(),
      badges: Vec::new(),
      medals: Medals::default(),
      stats: LedgerStats::default(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn has_badge(&self, badge_id: &str) -> bool {
    self.badges.iter().any(|b| b.badge_id == badge_id)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
  Quiz,
  Challenge,
  Streak,
  Achievement,
  Special,
}

impl BadgeCategory {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "quiz" => Some(BadgeCategory::Quiz),
      "challenge" => Some(BadgeCategory::Challenge),
      "streak" => Some(BadgeCategory::Streak),
      "achievement" => Some(BadgeCategory::Achievement),
      "special" => Some(BadgeCategory::Special),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
  #[default]
  Common,
  Rare,
  Epic,
  Legendary,
}

/// How a badge requirement is measured. Kinds this build does not know about
/// deserialize to `Unknown` and are never satisfied.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
  Points,
  Count,
  Streak,
  Score,
  Combination,
  #[serde(other)]
  Unknown,
}

/// Scalar threshold, or a map of sub-thresholds for `combination`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequirementValue {
  Threshold(f64),
  Clauses(BTreeMap<String, f64>),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
  pub kind: RequirementKind,
  pub value: RequirementValue,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub subject: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefinition {
  pub id: String,
  pub name: String,
  pub description: String,
  pub category: BadgeCategory,
  pub icon: String,
  #[serde(default = "default_badge_color")]
  pub color: String,
  #[serde(default)]
  pub rarity: Rarity,
  #[serde(default)]
  pub points_reward: u32,
  #[serde(default)]
  pub order: i32,
  #[serde(default = "default_true")]
  pub is_active: bool,
  pub requirement: Requirement,
}

fn default_badge_color() -> String { "#3B82F6".into() }
fn default_true() -> bool { true }

/// Multi-day eco challenge from the catalog.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EcoChallenge {
  pub id: String,
  pub title: String,
  pub description: String,
  pub category: String,
  pub difficulty: String,
  pub points: u32,
  #[serde(default = "default_daily_goal")]
  pub daily_goal: u32,
  #[serde(default = "default_duration")]
  pub duration_days: u32,
  #[serde(default)]
  pub impact: Impact,
  #[serde(default)]
  pub tips: Vec<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default = "default_max_participants")]
  pub max_participants: u32,
  #[serde(default)]
  pub current_participants: u32,
}

fn default_daily_goal() -> u32 { 1 }
fn default_duration() -> u32 { 7 }
fn default_max_participants() -> u32 { 1000 }

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
  Active,
  Completed,
  Abandoned,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCompletion {
  pub date: NaiveDate,
  pub completed: bool,
  pub impact: Impact,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeProgress {
  pub current_streak: u32,
  pub total_completions: u32,
  pub last_completion_date: Option<NaiveDate>,
  pub daily_completions: Vec<DailyCompletion>,
}

impl ChallengeProgress {
  pub fn is_day_completed(&self, day: NaiveDate) -> bool {
    self.daily_completions.iter().any(|d| d.date == day && d.completed)
  }
}

/// A user's participation in one eco challenge (unique per user x challenge).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserChallenge {
  pub user_id: String,
  pub challenge_id: String,
  pub status: ChallengeStatus,
  pub start_date: DateTime<Utc>,
  pub completion_date: Option<DateTime<Utc>>,
  pub progress: ChallengeProgress,
  pub points_earned: u32,
}

/// One-shot fun challenge completion (unique per user x challenge id).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunChallengeRecord {
  pub user_id: String,
  pub challenge_id: String,
  pub title: String,
  pub category: String,
  pub is_completed: bool,
  pub completed_at: Option<DateTime<Utc>>,
  pub points_earned: u32,
  pub impact: Impact,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
  pub id: String,
  pub user_id: String,
  pub subject: String,
  pub difficulty: String,
  pub score_percentage: f64,
  pub seconds_per_question: Option<f64>,
  pub passed: bool,
  pub points_earned: u32,
  pub completed_at: DateTime<Utc>,
}

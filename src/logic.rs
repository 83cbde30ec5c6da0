//! Core behaviors shared by the HTTP handlers.
//!
//! This includes:
//!   - Awarding points for quizzes, eco challenge days and fun challenges
//!   - Evaluating and granting badges after every award
//!   - Ledger views, leaderboard, badge progress and challenge listings
//!   - Resetting fun challenge points with optimistic retries
//!
//! Every award follows the same shape: validate, compute the amount with the pure
//! reward rules, claim the completion (at most once), then submit one ledger delta.

use std::{collections::{BTreeSet, HashMap}, sync::Arc};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{LedgerConfig, RewardConfig};
use crate::domain::{
  BadgeCategory, BadgeDefinition, ChallengeStatus, EarnedBadge, EcoChallenge, FunChallengeRecord,
  Impact, LedgerAction, QuizAttempt, UserChallenge, UserLedger,
};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::gamification::{
  badges::{is_eligible, requirement_progress, Progress, UserStats},
  ledger::{remove_action, with_medals, LedgerDelta, PointsAward},
  rewards::{daily_challenge_points, fun_challenge_points, quiz_reward, QuizReward},
};
use crate::store::{ActivityStore, BadgeCatalog, Claim, DayCompletion, JoinOutcome, LedgerStore};
use crate::util::{day_key, trunc_for_log, Clock};

/// A finished quiz as reported by the client.
#[derive(Clone, Debug)]
pub struct QuizSubmission {
  pub subject: String,
  pub difficulty: String,
  pub score_percentage: f64,
  pub seconds_per_question: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAward {
  pub points: QuizReward,
  pub attempt: QuizAttempt,
  pub ledger: UserLedger,
  pub new_badges: Vec<BadgeDefinition>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardReceipt {
  pub points_awarded: u32,
  pub ledger: UserLedger,
  pub new_badges: Vec<BadgeDefinition>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub participation: Option<UserChallenge>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fun_challenge: Option<FunChallengeRecord>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
  pub removed_challenges: usize,
  pub ledger: Option<UserLedger>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunChallengeStats {
  pub total_completed: u32,
  pub total_points: u32,
  pub categories: Vec<String>,
  pub total_impact: Impact,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeProgress {
  pub badge: BadgeDefinition,
  pub earned: bool,
  pub progress: Option<Progress>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDetail {
  pub challenge: EcoChallenge,
  pub participation: Option<UserChallenge>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
  pub rank: usize,
  pub user_id: String,
  pub total_points: i64,
  pub current_level: u32,
  pub level_title: String,
}

#[derive(Clone)]
pub struct GamificationService {
  ledgers: Arc<dyn LedgerStore>,
  badges: Arc<dyn BadgeCatalog>,
  activity: Arc<dyn ActivityStore>,
  clock: Arc<dyn Clock>,
  rewards: RewardConfig,
  ledger_cfg: LedgerConfig,
}

fn require(field: &str, value: &str) -> ServiceResult<()> {
  if value.trim().is_empty() {
    return Err(ServiceError::InvalidInput(format!("{field} must not be empty")));
  }
  Ok(())
}

fn require_impact(impact: &Impact) -> ServiceResult<()> {
  if !impact.is_valid() {
    return Err(ServiceError::InvalidInput("impact values must be finite and non-negative".into()));
  }
  Ok(())
}

impl GamificationService {
  pub fn new(
    ledgers: Arc<dyn LedgerStore>,
    badges: Arc<dyn BadgeCatalog>,
    activity: Arc<dyn ActivityStore>,
    clock: Arc<dyn Clock>,
    rewards: RewardConfig,
    ledger_cfg: LedgerConfig,
  ) -> Self {
    Self { ledgers, badges, activity, clock, rewards, ledger_cfg }
  }

  // -------- Awards --------

  #[instrument(level = "info", skip(self, submission), fields(%user_id, subject = %submission.subject, difficulty = %submission.difficulty))]
  pub async fn award_quiz_completion(&self, user_id: &str, submission: QuizSubmission) -> ServiceResult<QuizAward> {
    require("userId", user_id)?;
    require("subject", &submission.subject)?;
    require("difficulty", &submission.difficulty)?;
    let score = submission.score_percentage;
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
      return Err(ServiceError::InvalidInput(format!("scorePercentage {score} outside 0..=100")));
    }
    if submission.seconds_per_question.is_some_and(|s| !s.is_finite() || s < 0.0) {
      return Err(ServiceError::InvalidInput("secondsPerQuestion must be non-negative".into()));
    }

    let now = self.clock.now();
    let reward = quiz_reward(&self.rewards, &submission.difficulty, score, submission.seconds_per_question);
    let attempt = QuizAttempt {
      id: Uuid::new_v4().to_string(),
      user_id: user_id.to_string(),
      subject: submission.subject.clone(),
      difficulty: submission.difficulty.clone(),
      score_percentage: score,
      seconds_per_question: submission.seconds_per_question,
      passed: score >= self.rewards.quiz_passing_score,
      points_earned: reward.total,
      completed_at: now,
    };
    self.activity.record_quiz_attempt(attempt.clone()).await?;

    let mut delta = LedgerDelta::award(PointsAward {
      amount: i64::from(reward.total),
      action: LedgerAction::QuizCompletion,
      description: format!(
        "Completed {} quiz ({}) with {}% score",
        trunc_for_log(&submission.subject, 80),
        submission.difficulty,
        score
      ),
      reference_id: Some(attempt.id.clone()),
    });
    delta.challenges_completed = 1;
    let ledger = match self.ledgers.atomic_update(user_id, &delta, now).await {
      Ok(l) => l,
      Err(e) => {
        error!(target: "ledger", %user_id, attempt_id = %attempt.id, error = %e, "Ledger update failed; removing quiz attempt");
        if let Err(remove_err) = self.activity.remove_quiz_attempt(user_id, &attempt.id).await {
          error!(target: "quiz", %user_id, error = %remove_err, "Failed to remove quiz attempt");
        }
        return Err(e.into());
      }
    };
    info!(target: "quiz", %user_id, base = reward.base, bonus = reward.bonus, speed = reward.speed, total = reward.total, "Quiz points awarded");

    let (new_badges, ledger) = self.grant_badges_after_award(user_id, ledger).await;
    Ok(QuizAward { points: reward, attempt, ledger: with_medals(&ledger), new_badges })
  }

  #[instrument(level = "info", skip(self, impact), fields(%user_id, %challenge_id))]
  pub async fn award_challenge_day(
    &self,
    user_id: &str,
    challenge_id: &str,
    day: Option<NaiveDate>,
    impact: Impact,
  ) -> ServiceResult<AwardReceipt> {
    require("userId", user_id)?;
    require("challengeId", challenge_id)?;
    require_impact(&impact)?;

    let challenge = self
      .activity
      .get_challenge(challenge_id)
      .await?
      .ok_or_else(|| ServiceError::InvalidReference(format!("challenge {challenge_id}")))?;

    let now = self.clock.now();
    let today = day_key(now);
    let day = day.unwrap_or(today);
    if day > today {
      return Err(ServiceError::InvalidInput(format!("{day} is in the future")));
    }
    if let Some(p) = self.activity.user_challenge(user_id, challenge_id).await? {
      if day < day_key(p.start_date) {
        return Err(ServiceError::InvalidInput(format!("{day} is before the challenge was joined")));
      }
    }
    let points = daily_challenge_points(challenge.points, challenge.duration_days);
    let completion = DayCompletion { day, impact, points, duration_days: challenge.duration_days, now };

    let participation = match self.activity.claim_challenge_day(user_id, challenge_id, &completion).await? {
      Claim::Claimed(p) => p,
      Claim::AlreadyCompleted => {
        info!(target: "challenge", %user_id, %challenge_id, %day, "Daily task already completed");
        return Err(ServiceError::AlreadyCompleted(format!("challenge {challenge_id} on {day}")));
      }
      Claim::NotParticipating => return Err(ServiceError::NotParticipating(challenge_id.to_string())),
    };

    let delta = LedgerDelta::award(PointsAward {
      amount: i64::from(points),
      action: LedgerAction::DailyChallenge,
      description: format!("Completed daily task for {}", challenge.title),
      reference_id: Some(challenge_id.to_string()),
    })
    .with_challenge_completion(impact);

    let ledger = match self.ledgers.atomic_update(user_id, &delta, now).await {
      Ok(l) => l,
      Err(e) => {
        error!(target: "ledger", %user_id, %challenge_id, error = %e, "Ledger update failed; releasing day claim");
        if let Err(release_err) = self.activity.release_challenge_day(user_id, challenge_id, &completion).await {
          error!(target: "challenge", %user_id, %challenge_id, error = %release_err, "Failed to release day claim");
        }
        return Err(e.into());
      }
    };
    info!(target: "challenge", %user_id, %challenge_id, %day, points, status = ?participation.status, "Daily task completed");

    let (new_badges, ledger) = self.grant_badges_after_award(user_id, ledger).await;
    Ok(AwardReceipt {
      points_awarded: points,
      ledger: with_medals(&ledger),
      new_badges,
      participation: Some(participation),
      fun_challenge: None,
    })
  }

  #[instrument(level = "info", skip(self, title, category, impact), fields(%user_id, %challenge_id))]
  pub async fn award_fun_challenge(
    &self,
    user_id: &str,
    challenge_id: &str,
    title: &str,
    category: &str,
    impact: Impact,
  ) -> ServiceResult<AwardReceipt> {
    require("userId", user_id)?;
    require("challengeId", challenge_id)?;
    require("title", title)?;
    require("category", category)?;
    require_impact(&impact)?;

    let now = self.clock.now();
    let points = fun_challenge_points(&self.rewards);
    let record = FunChallengeRecord {
      user_id: user_id.to_string(),
      challenge_id: challenge_id.to_string(),
      title: title.to_string(),
      category: category.to_string(),
      is_completed: true,
      completed_at: Some(now),
      points_earned: points,
      impact,
    };
    let record = match self.activity.claim_fun_challenge(record).await? {
      Claim::Claimed(r) => r,
      Claim::AlreadyCompleted | Claim::NotParticipating => {
        info!(target: "challenge", %user_id, %challenge_id, "Fun challenge already completed");
        return Err(ServiceError::AlreadyCompleted(format!("fun challenge {challenge_id}")));
      }
    };

    let delta = LedgerDelta::award(PointsAward {
      amount: i64::from(points),
      action: LedgerAction::FunChallenge,
      description: format!("Completed fun challenge: {}", trunc_for_log(title, 120)),
      reference_id: Some(challenge_id.to_string()),
    })
    .with_challenge_completion(impact);

    let ledger = match self.ledgers.atomic_update(user_id, &delta, now).await {
      Ok(l) => l,
      Err(e) => {
        error!(target: "ledger", %user_id, %challenge_id, error = %e, "Ledger update failed; releasing fun challenge");
        if let Err(release_err) = self.activity.release_fun_challenge(user_id, challenge_id).await {
          error!(target: "challenge", %user_id, %challenge_id, error = %release_err, "Failed to release fun challenge");
        }
        return Err(e.into());
      }
    };
    info!(target: "challenge", %user_id, %challenge_id, points, total = ledger.total_points, "Fun challenge completed");

    let (new_badges, ledger) = self.grant_badges_after_award(user_id, ledger).await;
    Ok(AwardReceipt {
      points_awarded: points,
      ledger: with_medals(&ledger),
      new_badges,
      participation: None,
      fun_challenge: Some(record),
    })
  }

  // -------- Badges --------

  /// Statistics snapshot badge requirements are measured against.
  pub async fn user_stats(&self, ledger: &UserLedger) -> ServiceResult<UserStats> {
    let attempts = self.activity.quiz_attempts(&ledger.user_id).await?;
    let mut subject_attempts: HashMap<String, u32> = HashMap::new();
    let mut difficulty_attempts: HashMap<String, u32> = HashMap::new();
    for a in &attempts {
      *subject_attempts.entry(a.subject.clone()).or_default() += 1;
      *difficulty_attempts.entry(a.difficulty.trim().to_ascii_lowercase()).or_default() += 1;
    }
    let average_score = if attempts.is_empty() {
      0.0
    } else {
      attempts.iter().map(|a| a.score_percentage).sum::<f64>() / attempts.len() as f64
    };
    Ok(UserStats {
      total_points: ledger.total_points,
      total_attempts: u32::try_from(attempts.len()).unwrap_or(u32::MAX),
      current_streak: ledger.streak.current,
      average_score,
      subject_attempts,
      difficulty_attempts,
    })
  }

  /// Grants every active badge the user now qualifies for and returns the ones
  /// earned by this call. Badge rewards can unlock further badges, so evaluation
  /// repeats until nothing new qualifies.
  #[instrument(level = "info", skip(self), fields(%user_id))]
  pub async fn evaluate_badges(&self, user_id: &str) -> ServiceResult<Vec<BadgeDefinition>> {
    require("userId", user_id)?;
    let ledger = self.ledgers.create_ledger(user_id, self.clock.now()).await?;
    let (earned, _) = self.grant_eligible_badges(ledger).await?;
    Ok(earned)
  }

  async fn grant_eligible_badges(&self, mut ledger: UserLedger) -> ServiceResult<(Vec<BadgeDefinition>, UserLedger)> {
    let catalog = self.badges.list_active_badges().await?;
    let mut earned: Vec<BadgeDefinition> = Vec::new();

    for _ in 0..=catalog.len() {
      let stats = self.user_stats(&ledger).await?;
      let eligible: Vec<BadgeDefinition> = catalog
        .iter()
        .filter(|b| !ledger.has_badge(&b.id) && is_eligible(&b.requirement, &stats))
        .cloned()
        .collect();
      if eligible.is_empty() {
        break;
      }
      let names: Vec<&str> = eligible.iter().map(|b| b.name.as_str()).collect();
      info!(target: "badges", user_id = %ledger.user_id, badges = ?names, "Granting badges");
      ledger = self
        .ledgers
        .atomic_update(&ledger.user_id, &LedgerDelta::grant_badges(eligible.clone()), self.clock.now())
        .await?;
      earned.extend(eligible);
    }
    Ok((earned, ledger))
  }

  /// Badge evaluation after an award never fails the award itself.
  async fn grant_badges_after_award(&self, user_id: &str, ledger: UserLedger) -> (Vec<BadgeDefinition>, UserLedger) {
    match self.grant_eligible_badges(ledger.clone()).await {
      Ok(result) => result,
      Err(e) => {
        warn!(target: "badges", %user_id, error = %e, "Badge evaluation failed after award");
        (Vec::new(), ledger)
      }
    }
  }

  pub async fn list_badges(&self, category: Option<BadgeCategory>) -> ServiceResult<Vec<BadgeDefinition>> {
    let all = self.badges.list_active_badges().await?;
    Ok(all.into_iter().filter(|b| category.map_or(true, |c| b.category == c)).collect())
  }

  pub async fn badge(&self, badge_id: &str) -> ServiceResult<BadgeDefinition> {
    self
      .badges
      .get_badge(badge_id)
      .await?
      .ok_or_else(|| ServiceError::InvalidReference(format!("badge {badge_id}")))
  }

  pub async fn user_badges(&self, user_id: &str) -> ServiceResult<Vec<EarnedBadge>> {
    Ok(self.ledgers.load_ledger(user_id).await?.map(|l| l.badges).unwrap_or_default())
  }

  pub async fn badge_progress(&self, user_id: &str) -> ServiceResult<Vec<BadgeProgress>> {
    let ledger = self.ledgers.create_ledger(user_id, self.clock.now()).await?;
    let stats = self.user_stats(&ledger).await?;
    let catalog = self.badges.list_active_badges().await?;
    Ok(catalog
      .into_iter()
      .map(|badge| {
        let earned = ledger.has_badge(&badge.id);
        let progress = requirement_progress(&badge.requirement, &stats);
        BadgeProgress { badge, earned, progress }
      })
      .collect())
  }

  // -------- Ledger --------

  /// Ledger with medals recomputed; created on first access.
  pub async fn ledger_view(&self, user_id: &str) -> ServiceResult<UserLedger> {
    require("userId", user_id)?;
    let ledger = self.ledgers.create_ledger(user_id, self.clock.now()).await?;
    Ok(with_medals(&ledger))
  }

  /// Deletes the user's fun challenge records and removes their points from the
  /// ledger, recomputing the total from the remaining history.
  #[instrument(level = "info", skip(self), fields(%user_id))]
  pub async fn reset_fun_challenges(&self, user_id: &str) -> ServiceResult<ResetOutcome> {
    require("userId", user_id)?;

    for attempt in 0..=self.ledger_cfg.max_update_retries {
      let Some(current) = self.ledgers.load_ledger(user_id).await? else {
        return Ok(ResetOutcome { removed_challenges: 0, ledger: None });
      };
      let reset_ids: Vec<String> = current
        .history
        .iter()
        .filter(|e| e.action == LedgerAction::FunChallenge)
        .filter_map(|e| e.reference_id.clone())
        .collect();
      let next = remove_action(&current, LedgerAction::FunChallenge, self.clock.now());
      match self.ledgers.replace_if_version(next, current.version).await {
        Ok(ledger) => {
          // Only records whose points left the ledger in this write; a claim that
          // lands after it keeps both its record and its history entry.
          let removed_challenges = self.activity.delete_fun_challenges(user_id, &reset_ids).await?;
          info!(target: "ledger", %user_id, removed_challenges, total = ledger.total_points, "Fun challenges reset");
          return Ok(ResetOutcome { removed_challenges, ledger: Some(with_medals(&ledger)) });
        }
        Err(StoreError::VersionConflict { expected, found, .. }) => {
          warn!(target: "ledger", %user_id, attempt, expected, found, "Ledger changed during reset; retrying");
        }
        Err(e) => return Err(e.into()),
      }
    }
    warn!(target: "ledger", %user_id, "Fun challenge reset gave up; records left in place");
    Err(ServiceError::ConcurrentUpdateConflict(user_id.to_string()))
  }

  pub async fn leaderboard(&self, limit: Option<usize>) -> ServiceResult<Vec<LeaderboardEntry>> {
    let limit = limit.unwrap_or(self.ledger_cfg.leaderboard_default_limit);
    let mut all = self.ledgers.list_ledgers().await?;
    all.sort_by(|a, b| b.total_points.cmp(&a.total_points).then_with(|| a.user_id.cmp(&b.user_id)));
    Ok(all
      .into_iter()
      .take(limit)
      .enumerate()
      .map(|(i, l)| LeaderboardEntry {
        rank: i + 1,
        user_id: l.user_id,
        total_points: l.total_points,
        current_level: l.current_level,
        level_title: l.level_title,
      })
      .collect())
  }

  // -------- Challenges --------

  pub async fn list_challenges(
    &self,
    category: Option<&str>,
    difficulty: Option<&str>,
  ) -> ServiceResult<Vec<EcoChallenge>> {
    let fits = |filter: Option<&str>, value: &str| filter.map_or(true, |f| f.eq_ignore_ascii_case(value));
    Ok(self
      .activity
      .list_challenges()
      .await?
      .into_iter()
      .filter(|c| c.is_active && fits(category, &c.category) && fits(difficulty, &c.difficulty))
      .collect())
  }

  pub async fn challenge_detail(&self, challenge_id: &str, user_id: Option<&str>) -> ServiceResult<ChallengeDetail> {
    let challenge = self
      .activity
      .get_challenge(challenge_id)
      .await?
      .ok_or_else(|| ServiceError::InvalidReference(format!("challenge {challenge_id}")))?;
    let participation = match user_id {
      Some(uid) => self.activity.user_challenge(uid, challenge_id).await?,
      None => None,
    };
    Ok(ChallengeDetail { challenge, participation })
  }

  #[instrument(level = "info", skip(self), fields(%user_id, %challenge_id))]
  pub async fn join_challenge(&self, user_id: &str, challenge_id: &str) -> ServiceResult<UserChallenge> {
    require("userId", user_id)?;
    require("challengeId", challenge_id)?;
    let now = self.clock.now();
    match self.activity.join_challenge(user_id, challenge_id, now).await? {
      JoinOutcome::Joined(p) => {
        self.ledgers.create_ledger(user_id, now).await?;
        info!(target: "challenge", %user_id, %challenge_id, "Joined challenge");
        Ok(p)
      }
      JoinOutcome::AlreadyJoined => Err(ServiceError::AlreadyJoined(challenge_id.to_string())),
      JoinOutcome::Unavailable => Err(ServiceError::ChallengeUnavailable(challenge_id.to_string())),
      JoinOutcome::UnknownChallenge => Err(ServiceError::InvalidReference(format!("challenge {challenge_id}"))),
    }
  }

  /// `None` returns participations in every status.
  pub async fn user_challenges(&self, user_id: &str, status: Option<ChallengeStatus>) -> ServiceResult<Vec<UserChallenge>> {
    let all = self.activity.user_challenges(user_id).await?;
    Ok(all.into_iter().filter(|p| status.map_or(true, |s| p.status == s)).collect())
  }

  /// `completed`: `Some(true)` only finished ones, `Some(false)` only open ones.
  pub async fn user_fun_challenges(&self, user_id: &str, completed: Option<bool>) -> ServiceResult<Vec<FunChallengeRecord>> {
    let all = self.activity.fun_challenges(user_id).await?;
    Ok(all.into_iter().filter(|r| completed.map_or(true, |c| r.is_completed == c)).collect())
  }

  pub async fn fun_challenge_stats(&self, user_id: &str) -> ServiceResult<FunChallengeStats> {
    let records = self.activity.fun_challenges(user_id).await?;
    let mut stats = FunChallengeStats::default();
    let mut categories = BTreeSet::new();
    for r in &records {
      if r.is_completed {
        stats.total_completed += 1;
        stats.total_points += r.points_earned;
      }
      categories.insert(r.category.clone());
      stats.total_impact.accumulate(&r.impact);
    }
    stats.categories = categories.into_iter().collect();
    debug!(target: "challenge", %user_id, completed = stats.total_completed, "Fun challenge stats computed");
    Ok(stats)
  }

  // -------- Quizzes --------

  /// Most recent attempts first.
  pub async fn quiz_history(&self, user_id: &str, limit: usize) -> ServiceResult<Vec<QuizAttempt>> {
    let mut attempts = self.activity.quiz_attempts(user_id).await?;
    attempts.reverse();
    attempts.truncate(limit);
    Ok(attempts)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  use async_trait::async_trait;
  use chrono::{DateTime, Duration, Utc};

  use crate::seeds::{seed_badges, seed_challenges};
  use crate::store::MemoryStore;
  use crate::util::testing::FixedClock;

  fn service_with(store: MemoryStore, clock: Arc<FixedClock>) -> GamificationService {
    let store = Arc::new(store);
    GamificationService::new(
      store.clone(),
      store.clone(),
      store,
      clock,
      RewardConfig::default(),
      LedgerConfig::default(),
    )
  }

  fn setup() -> (GamificationService, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at(2024, 4, 22, 9));
    let svc = service_with(MemoryStore::new(seed_badges(), seed_challenges()), clock.clone());
    (svc, clock)
  }

  fn quiz(subject: &str, difficulty: &str, score: f64, secs: Option<f64>) -> QuizSubmission {
    QuizSubmission {
      subject: subject.into(),
      difficulty: difficulty.into(),
      score_percentage: score,
      seconds_per_question: secs,
    }
  }

  #[tokio::test]
  async fn quiz_award_stacks_bonuses_and_grants_first_badges() {
    let (svc, _) = setup();
    let award = svc
      .award_quiz_completion("u1", quiz("Renewable Energy Sources", "advanced", 95.0, Some(25.0)))
      .await
      .unwrap();

    assert_eq!(award.points.total, 85);
    assert!(award.attempt.passed);
    let ids: Vec<&str> = award.new_badges.iter().map(|b| b.id.as_str()).collect();
    // one attempt: both "first quiz" and "first eco challenge" count badges qualify
    assert!(ids.contains(&"quiz-beginner"));
    assert!(ids.contains(&"challenge-starter"));
    // 85 + 10 + 20 reward points crosses the 100 point badge on a second pass
    assert!(ids.contains(&"bronze-achiever"));
    assert_eq!(award.ledger.total_points, 115);
    assert_eq!(award.ledger.history[0].action, LedgerAction::QuizCompletion);
    assert_eq!(award.ledger.history[0].points, 85);
    assert_eq!(award.ledger.stats.challenges_completed, 1);
    assert_eq!(award.ledger.medals.bronze, 0);
    // badge rewards ride on the quiz; they are not extra days of activity
    assert_eq!(award.ledger.streak.current, 1);
  }

  #[tokio::test]
  async fn quiz_rejects_bad_scores() {
    let (svc, _) = setup();
    let err = svc.award_quiz_completion("u1", quiz("Oceans", "beginner", 140.0, None)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    let err = svc.award_quiz_completion("u1", quiz("", "beginner", 50.0, None)).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    assert!(svc.ledgers.load_ledger("u1").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn challenge_day_is_awarded_at_most_once() {
    let (svc, clock) = setup();
    svc.join_challenge("u1", "plastic-free-week").await.unwrap();
    let impact = Impact { plastic_saved: 0.5, ..Impact::default() };

    let receipt = svc.award_challenge_day("u1", "plastic-free-week", None, impact).await.unwrap();
    assert_eq!(receipt.points_awarded, 21);
    let total_after_first = receipt.ledger.total_points;

    let err = svc.award_challenge_day("u1", "plastic-free-week", None, impact).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyCompleted(_)));
    let ledger = svc.ledger_view("u1").await.unwrap();
    assert_eq!(ledger.total_points, total_after_first);
    assert_eq!(ledger.stats.total_impact.plastic_saved, 0.5);

    clock.advance(Duration::days(1));
    let receipt = svc.award_challenge_day("u1", "plastic-free-week", None, impact).await.unwrap();
    let p = receipt.participation.unwrap();
    assert_eq!(p.progress.total_completions, 2);
    assert_eq!(p.points_earned, 42);
  }

  #[tokio::test]
  async fn challenge_day_reference_errors() {
    let (svc, _) = setup();
    let err = svc.award_challenge_day("u1", "no-such", None, Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidReference(_)));
    let err = svc.award_challenge_day("u1", "climate-education", None, Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotParticipating(_)));
    let err = svc
      .award_challenge_day("u1", "climate-education", None, Impact { water_saved: -1.0, ..Impact::default() })
      .await
      .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
  }

  #[tokio::test]
  async fn challenge_day_must_fall_between_join_and_today() {
    let (svc, clock) = setup();
    svc.join_challenge("u1", "plastic-free-week").await.unwrap();
    let day = |d: u32| NaiveDate::from_ymd_opt(2024, 4, d);

    let err = svc.award_challenge_day("u1", "plastic-free-week", day(23), Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    let err = svc.award_challenge_day("u1", "plastic-free-week", day(21), Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    assert_eq!(svc.ledger_view("u1").await.unwrap().total_points, 0);

    svc.award_challenge_day("u1", "plastic-free-week", day(22), Impact::default()).await.unwrap();
    clock.advance(Duration::days(2));
    // a missed day can be caught up later, but never ahead of the clock
    let receipt = svc.award_challenge_day("u1", "plastic-free-week", day(23), Impact::default()).await.unwrap();
    assert_eq!(receipt.participation.unwrap().progress.total_completions, 2);
    let err = svc.award_challenge_day("u1", "plastic-free-week", day(25), Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
  }

  #[tokio::test]
  async fn join_twice_is_rejected() {
    let (svc, _) = setup();
    svc.join_challenge("u1", "water-saving-hero").await.unwrap();
    let err = svc.join_challenge("u1", "water-saving-hero").await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyJoined(_)));
    let detail = svc.challenge_detail("water-saving-hero", Some("u1")).await.unwrap();
    assert_eq!(detail.challenge.current_participants, 1);
    assert!(detail.participation.is_some());
    assert_eq!(svc.user_challenges("u1", Some(ChallengeStatus::Active)).await.unwrap().len(), 1);
    assert!(svc.user_challenges("u1", Some(ChallengeStatus::Completed)).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn fun_challenge_once_then_reset() {
    let (svc, _) = setup();
    let receipt = svc
      .award_fun_challenge("u1", "fun-1", "Pick up litter", "Waste Reduction", Impact::default())
      .await
      .unwrap();
    assert_eq!(receipt.points_awarded, 50);

    let err = svc
      .award_fun_challenge("u1", "fun-1", "Pick up litter", "Waste Reduction", Impact::default())
      .await
      .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyCompleted(_)));

    svc.award_fun_challenge("u1", "fun-2", "Plant a tree", "Plant Care", Impact::default()).await.unwrap();
    svc.award_quiz_completion("u1", quiz("Oceans", "beginner", 50.0, None)).await.unwrap();

    let stats = svc.fun_challenge_stats("u1").await.unwrap();
    assert_eq!(stats.total_completed, 2);
    assert_eq!(stats.total_points, 100);
    assert_eq!(stats.categories, vec!["Plant Care".to_string(), "Waste Reduction".to_string()]);

    let before = svc.ledger_view("u1").await.unwrap();
    let outcome = svc.reset_fun_challenges("u1").await.unwrap();
    let after = outcome.ledger.unwrap();
    assert_eq!(outcome.removed_challenges, 2);
    assert!(after.history.iter().all(|e| e.action != LedgerAction::FunChallenge));
    assert_eq!(after.total_points, after.history.iter().map(|e| e.points).sum::<i64>());
    assert_eq!(after.total_points, before.total_points - 100);
    assert!(svc.user_fun_challenges("u1", None).await.unwrap().is_empty());

    // completions are open again after a reset
    svc.award_fun_challenge("u1", "fun-1", "Pick up litter", "Waste Reduction", Impact::default()).await.unwrap();
  }

  #[tokio::test]
  async fn evaluate_badges_is_idempotent() {
    let (svc, _) = setup();
    svc.award_quiz_completion("u1", quiz("Oceans", "beginner", 50.0, None)).await.unwrap();
    assert!(svc.evaluate_badges("u1").await.unwrap().is_empty());

    let ledger = svc.ledger_view("u1").await.unwrap();
    let mut ids: Vec<&str> = ledger.badges.iter().map(|b| b.badge_id.as_str()).collect();
    let len = ids.len();
    ids.dedup();
    assert_eq!(ids.len(), len);
    assert_eq!(svc.user_badges("u1").await.unwrap().len(), len);
  }

  #[tokio::test]
  async fn badge_progress_marks_earned() {
    let (svc, _) = setup();
    svc.award_quiz_completion("u1", quiz("Oceans", "beginner", 50.0, None)).await.unwrap();
    let progress = svc.badge_progress("u1").await.unwrap();
    let beginner = progress.iter().find(|p| p.badge.id == "quiz-beginner").unwrap();
    assert!(beginner.earned);
    let master = progress.iter().find(|p| p.badge.id == "quiz-master").unwrap();
    assert!(!master.earned);
    assert_eq!(master.progress.unwrap().percent, 10.0);
  }

  #[tokio::test]
  async fn leaderboard_orders_by_points() {
    let (svc, _) = setup();
    svc.award_fun_challenge("a", "f", "t", "c", Impact::default()).await.unwrap();
    svc.award_quiz_completion("b", quiz("Oceans", "advanced", 95.0, Some(10.0))).await.unwrap();
    svc.ledger_view("c").await.unwrap();

    let board = svc.leaderboard(Some(2)).await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].user_id, "b");
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[1].user_id, "a");
  }

  #[tokio::test]
  async fn ledger_view_creates_lazily() {
    let (svc, _) = setup();
    let ledger = svc.ledger_view("fresh").await.unwrap();
    assert_eq!(ledger.total_points, 0);
    assert_eq!(ledger.current_level, 1);
    assert_eq!(ledger.level_title, "Eco-Beginner");
  }

  /// Ledger store whose optimistic writes lose a fixed number of times.
  struct FlakyLedgers {
    inner: MemoryStore,
    conflicts_left: AtomicU32,
    fail_updates: bool,
  }

  #[async_trait]
  impl LedgerStore for FlakyLedgers {
    async fn load_ledger(&self, user_id: &str) -> Result<Option<UserLedger>, StoreError> {
      self.inner.load_ledger(user_id).await
    }
    async fn create_ledger(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserLedger, StoreError> {
      self.inner.create_ledger(user_id, now).await
    }
    async fn atomic_update(&self, user_id: &str, delta: &LedgerDelta, now: DateTime<Utc>) -> Result<UserLedger, StoreError> {
      if self.fail_updates {
        return Err(StoreError::NotFound(format!("ledger {user_id}")));
      }
      self.inner.atomic_update(user_id, delta, now).await
    }
    async fn replace_if_version(&self, ledger: UserLedger, expected_version: u64) -> Result<UserLedger, StoreError> {
      if self.conflicts_left.load(Ordering::SeqCst) > 0 {
        self.conflicts_left.fetch_sub(1, Ordering::SeqCst);
        return Err(StoreError::VersionConflict {
          user_id: ledger.user_id,
          expected: expected_version,
          found: expected_version + 1,
        });
      }
      self.inner.replace_if_version(ledger, expected_version).await
    }
    async fn list_ledgers(&self) -> Result<Vec<UserLedger>, StoreError> {
      self.inner.list_ledgers().await
    }
  }

  fn flaky_service(conflicts: u32) -> GamificationService {
    ledgers_service(conflicts, false)
  }

  fn ledgers_service(conflicts: u32, fail_updates: bool) -> GamificationService {
    let store = MemoryStore::new(seed_badges(), seed_challenges());
    let ledgers = Arc::new(FlakyLedgers {
      inner: store.clone(),
      conflicts_left: AtomicU32::new(conflicts),
      fail_updates,
    });
    let store = Arc::new(store);
    GamificationService::new(
      ledgers,
      store.clone(),
      store,
      Arc::new(FixedClock::at(2024, 4, 22, 9)),
      RewardConfig::default(),
      LedgerConfig { max_update_retries: 2, leaderboard_default_limit: 10 },
    )
  }

  #[tokio::test]
  async fn reset_retries_on_conflict() {
    let svc = flaky_service(2);
    svc.award_fun_challenge("u1", "f1", "t", "c", Impact::default()).await.unwrap();
    let outcome = svc.reset_fun_challenges("u1").await.unwrap();
    assert_eq!(outcome.ledger.unwrap().history.iter().filter(|e| e.action == LedgerAction::FunChallenge).count(), 0);
  }

  #[tokio::test]
  async fn reset_gives_up_after_retries() {
    let svc = flaky_service(3);
    svc.award_fun_challenge("u1", "f1", "t", "c", Impact::default()).await.unwrap();
    let err = svc.reset_fun_challenges("u1").await.unwrap_err();
    assert!(matches!(err, ServiceError::ConcurrentUpdateConflict(_)));

    // nothing was reset, so the challenge stays completed and pays only once
    assert_eq!(svc.user_fun_challenges("u1", None).await.unwrap().len(), 1);
    let err = svc.award_fun_challenge("u1", "f1", "t", "c", Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyCompleted(_)));
    let ledger = svc.ledger_view("u1").await.unwrap();
    assert_eq!(ledger.total_points, 50);
    assert_eq!(ledger.history.iter().filter(|e| e.action == LedgerAction::FunChallenge).count(), 1);
  }

  #[tokio::test]
  async fn reset_keeps_records_not_yet_on_the_ledger() {
    let (svc, clock) = setup();
    svc.award_fun_challenge("u1", "f1", "t", "c", Impact::default()).await.unwrap();
    // claimed by a concurrent award whose ledger write has not landed yet
    let pending = FunChallengeRecord {
      user_id: "u1".into(),
      challenge_id: "f2".into(),
      title: "t".into(),
      category: "c".into(),
      is_completed: true,
      completed_at: Some(clock.now()),
      points_earned: 50,
      impact: Impact::default(),
    };
    svc.activity.claim_fun_challenge(pending).await.unwrap();

    let outcome = svc.reset_fun_challenges("u1").await.unwrap();
    assert_eq!(outcome.removed_challenges, 1);
    let left = svc.user_fun_challenges("u1", None).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].challenge_id, "f2");
  }

  #[tokio::test]
  async fn failed_quiz_ledger_write_leaves_no_attempt() {
    let svc = ledgers_service(0, true);
    let err = svc.award_quiz_completion("u1", quiz("Oceans", "beginner", 80.0, None)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    assert!(svc.quiz_history("u1", 10).await.unwrap().is_empty());

    let err = svc.award_fun_challenge("u1", "f1", "t", "c", Impact::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    assert!(svc.user_fun_challenges("u1", None).await.unwrap().is_empty());
  }
}

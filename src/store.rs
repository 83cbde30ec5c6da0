//! Persistence seams and the in-memory document store.
//!
//! `LedgerStore::atomic_update` is the single mutation point for ledgers: the
//! delta is applied to the stored document inside one write critical section,
//! the same guarantee a document database gives for a single-document update.
//! Completion claims in `ActivityStore` are check-and-set for the same reason.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{
    BadgeDefinition, ChallengeStatus, DailyCompletion, EcoChallenge, FunChallengeRecord, Impact,
    QuizAttempt, UserChallenge, UserLedger,
};
use crate::error::StoreError;
use crate::gamification::ledger::{apply_delta, LedgerDelta};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load_ledger(&self, user_id: &str) -> Result<Option<UserLedger>, StoreError>;

    /// Returns the existing ledger when one is already present.
    async fn create_ledger(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserLedger, StoreError>;

    /// Applies `delta` atomically, creating the ledger first if needed.
    async fn atomic_update(
        &self,
        user_id: &str,
        delta: &LedgerDelta,
        now: DateTime<Utc>,
    ) -> Result<UserLedger, StoreError>;

    /// Writes `ledger` only if the stored version still equals `expected_version`.
    async fn replace_if_version(
        &self,
        ledger: UserLedger,
        expected_version: u64,
    ) -> Result<UserLedger, StoreError>;

    async fn list_ledgers(&self) -> Result<Vec<UserLedger>, StoreError>;
}

#[async_trait]
pub trait BadgeCatalog: Send + Sync {
    /// All badges in evaluation/display order.
    async fn list_badges(&self) -> Result<Vec<BadgeDefinition>, StoreError>;

    async fn list_active_badges(&self) -> Result<Vec<BadgeDefinition>, StoreError> {
        Ok(self.list_badges().await?.into_iter().filter(|b| b.is_active).collect())
    }

    async fn get_badge(&self, id: &str) -> Result<Option<BadgeDefinition>, StoreError> {
        Ok(self.list_badges().await?.into_iter().find(|b| b.id == id))
    }
}

/// Result of a check-and-set completion claim.
#[derive(Clone, Debug, PartialEq)]
pub enum Claim<T> {
    Claimed(T),
    AlreadyCompleted,
    NotParticipating,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JoinOutcome {
    Joined(UserChallenge),
    AlreadyJoined,
    /// Inactive or at capacity.
    Unavailable,
    UnknownChallenge,
}

/// A day completion to claim on a user's challenge participation.
#[derive(Clone, Debug)]
pub struct DayCompletion {
    pub day: NaiveDate,
    pub impact: Impact,
    pub points: u32,
    pub duration_days: u32,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn list_challenges(&self) -> Result<Vec<EcoChallenge>, StoreError>;
    async fn get_challenge(&self, challenge_id: &str) -> Result<Option<EcoChallenge>, StoreError>;

    async fn join_challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome, StoreError>;

    async fn user_challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<UserChallenge>, StoreError>;
    async fn user_challenges(&self, user_id: &str) -> Result<Vec<UserChallenge>, StoreError>;

    /// Marks `completion.day` done on an active participation, at most once.
    async fn claim_challenge_day(
        &self,
        user_id: &str,
        challenge_id: &str,
        completion: &DayCompletion,
    ) -> Result<Claim<UserChallenge>, StoreError>;

    /// Undoes a claim whose ledger update failed.
    async fn release_challenge_day(
        &self,
        user_id: &str,
        challenge_id: &str,
        completion: &DayCompletion,
    ) -> Result<(), StoreError>;

    /// Stores `record` as completed unless that user already completed it.
    async fn claim_fun_challenge(
        &self,
        record: FunChallengeRecord,
    ) -> Result<Claim<FunChallengeRecord>, StoreError>;
    async fn release_fun_challenge(&self, user_id: &str, challenge_id: &str) -> Result<(), StoreError>;
    async fn fun_challenges(&self, user_id: &str) -> Result<Vec<FunChallengeRecord>, StoreError>;
    /// Deletes the user's records for the given challenges; returns how many went.
    async fn delete_fun_challenges(&self, user_id: &str, challenge_ids: &[String]) -> Result<usize, StoreError>;

    async fn record_quiz_attempt(&self, attempt: QuizAttempt) -> Result<(), StoreError>;
    /// Compensation for an attempt whose ledger update failed.
    async fn remove_quiz_attempt(&self, user_id: &str, attempt_id: &str) -> Result<(), StoreError>;
    /// Attempts in completion order.
    async fn quiz_attempts(&self, user_id: &str) -> Result<Vec<QuizAttempt>, StoreError>;
}

type UserKey = (String, String);

fn key(user_id: &str, challenge_id: &str) -> UserKey {
    (user_id.to_string(), challenge_id.to_string())
}

/// In-process implementation of every store, backed by `tokio::sync::RwLock` maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    ledgers: Arc<RwLock<HashMap<String, UserLedger>>>,
    badges: Arc<RwLock<Vec<BadgeDefinition>>>,
    challenges: Arc<RwLock<HashMap<String, EcoChallenge>>>,
    participations: Arc<RwLock<HashMap<UserKey, UserChallenge>>>,
    fun: Arc<RwLock<HashMap<UserKey, FunChallengeRecord>>>,
    quizzes: Arc<RwLock<HashMap<String, Vec<QuizAttempt>>>>,
}

impl MemoryStore {
    pub fn new(mut badges: Vec<BadgeDefinition>, challenges: Vec<EcoChallenge>) -> Self {
        badges.sort_by_key(|b| b.order);
        let challenges = challenges.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            badges: Arc::new(RwLock::new(badges)),
            challenges: Arc::new(RwLock::new(challenges)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load_ledger(&self, user_id: &str) -> Result<Option<UserLedger>, StoreError> {
        Ok(self.ledgers.read().await.get(user_id).cloned())
    }

    async fn create_ledger(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserLedger, StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedger::new(user_id, now));
        Ok(ledger.clone())
    }

    #[instrument(level = "debug", skip(self, delta), fields(%user_id, awards = delta.awards.len(), badges = delta.badges.len()))]
    async fn atomic_update(
        &self,
        user_id: &str,
        delta: &LedgerDelta,
        now: DateTime<Utc>,
    ) -> Result<UserLedger, StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let current = ledgers
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedger::new(user_id, now));
        let mut next = apply_delta(current, delta, now);
        next.version = current.version + 1;
        *current = next.clone();
        let actions: Vec<&str> = delta.awards.iter().map(|a| a.action.as_str()).collect();
        debug!(target: "ledger", %user_id, version = next.version, total = next.total_points, ?actions, "Ledger updated");
        Ok(next)
    }

    async fn replace_if_version(
        &self,
        mut ledger: UserLedger,
        expected_version: u64,
    ) -> Result<UserLedger, StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let current = ledgers
            .get_mut(&ledger.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("ledger {}", ledger.user_id)))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                user_id: ledger.user_id,
                expected: expected_version,
                found: current.version,
            });
        }
        ledger.version = expected_version + 1;
        *current = ledger.clone();
        Ok(ledger)
    }

    async fn list_ledgers(&self) -> Result<Vec<UserLedger>, StoreError> {
        Ok(self.ledgers.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl BadgeCatalog for MemoryStore {
    async fn list_badges(&self) -> Result<Vec<BadgeDefinition>, StoreError> {
        Ok(self.badges.read().await.clone())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn list_challenges(&self) -> Result<Vec<EcoChallenge>, StoreError> {
        let mut all: Vec<EcoChallenge> = self.challenges.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(all)
    }

    async fn get_challenge(&self, challenge_id: &str) -> Result<Option<EcoChallenge>, StoreError> {
        Ok(self.challenges.read().await.get(challenge_id).cloned())
    }

    #[instrument(level = "debug", skip(self))]
    async fn join_challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome, StoreError> {
        // Lock order: challenges, then participations.
        let mut challenges = self.challenges.write().await;
        let mut participations = self.participations.write().await;

        let Some(challenge) = challenges.get_mut(challenge_id) else {
            return Ok(JoinOutcome::UnknownChallenge);
        };
        if participations.contains_key(&key(user_id, challenge_id)) {
            return Ok(JoinOutcome::AlreadyJoined);
        }
        if !challenge.is_active || challenge.current_participants >= challenge.max_participants {
            return Ok(JoinOutcome::Unavailable);
        }

        challenge.current_participants += 1;
        let participation = UserChallenge {
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
            status: ChallengeStatus::Active,
            start_date: now,
            completion_date: None,
            progress: Default::default(),
            points_earned: 0,
        };
        participations.insert(key(user_id, challenge_id), participation.clone());
        Ok(JoinOutcome::Joined(participation))
    }

    async fn user_challenge(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<UserChallenge>, StoreError> {
        Ok(self.participations.read().await.get(&key(user_id, challenge_id)).cloned())
    }

    async fn user_challenges(&self, user_id: &str) -> Result<Vec<UserChallenge>, StoreError> {
        let mut mine: Vec<UserChallenge> = self
            .participations
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(mine)
    }

    #[instrument(level = "debug", skip(self, completion), fields(day = %completion.day))]
    async fn claim_challenge_day(
        &self,
        user_id: &str,
        challenge_id: &str,
        completion: &DayCompletion,
    ) -> Result<Claim<UserChallenge>, StoreError> {
        let mut participations = self.participations.write().await;
        let Some(p) = participations.get_mut(&key(user_id, challenge_id)) else {
            return Ok(Claim::NotParticipating);
        };
        if p.status != ChallengeStatus::Active {
            return Ok(Claim::NotParticipating);
        }
        if p.progress.is_day_completed(completion.day) {
            return Ok(Claim::AlreadyCompleted);
        }

        match p.progress.daily_completions.iter_mut().find(|d| d.date == completion.day) {
            Some(existing) => {
                existing.completed = true;
                existing.impact = completion.impact;
            }
            None => p.progress.daily_completions.push(DailyCompletion {
                date: completion.day,
                completed: true,
                impact: completion.impact,
            }),
        }
        p.progress.total_completions += 1;
        p.progress.current_streak += 1;
        p.progress.last_completion_date = Some(completion.day);
        p.points_earned += completion.points;
        if p.progress.total_completions >= completion.duration_days.max(1) {
            p.status = ChallengeStatus::Completed;
            p.completion_date = Some(completion.now);
        }
        Ok(Claim::Claimed(p.clone()))
    }

    async fn release_challenge_day(
        &self,
        user_id: &str,
        challenge_id: &str,
        completion: &DayCompletion,
    ) -> Result<(), StoreError> {
        let mut participations = self.participations.write().await;
        let p = participations
            .get_mut(&key(user_id, challenge_id))
            .ok_or_else(|| StoreError::NotFound(format!("participation {user_id}/{challenge_id}")))?;
        if !p.progress.is_day_completed(completion.day) {
            return Ok(());
        }
        p.progress.daily_completions.retain(|d| d.date != completion.day);
        p.progress.total_completions = p.progress.total_completions.saturating_sub(1);
        p.progress.current_streak = p.progress.current_streak.saturating_sub(1);
        p.progress.last_completion_date = p
            .progress
            .daily_completions
            .iter()
            .filter(|d| d.completed)
            .map(|d| d.date)
            .max();
        p.points_earned = p.points_earned.saturating_sub(completion.points);
        p.status = ChallengeStatus::Active;
        p.completion_date = None;
        Ok(())
    }

    async fn claim_fun_challenge(
        &self,
        record: FunChallengeRecord,
    ) -> Result<Claim<FunChallengeRecord>, StoreError> {
        let mut fun = self.fun.write().await;
        let k = key(&record.user_id, &record.challenge_id);
        if fun.get(&k).is_some_and(|r| r.is_completed) {
            return Ok(Claim::AlreadyCompleted);
        }
        fun.insert(k, record.clone());
        Ok(Claim::Claimed(record))
    }

    async fn release_fun_challenge(&self, user_id: &str, challenge_id: &str) -> Result<(), StoreError> {
        self.fun.write().await.remove(&key(user_id, challenge_id));
        Ok(())
    }

    async fn fun_challenges(&self, user_id: &str) -> Result<Vec<FunChallengeRecord>, StoreError> {
        let mut mine: Vec<FunChallengeRecord> = self
            .fun
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(mine)
    }

    async fn delete_fun_challenges(&self, user_id: &str, challenge_ids: &[String]) -> Result<usize, StoreError> {
        let mut fun = self.fun.write().await;
        let before = fun.len();
        fun.retain(|(uid, cid), _| uid != user_id || !challenge_ids.contains(cid));
        Ok(before - fun.len())
    }

    async fn record_quiz_attempt(&self, attempt: QuizAttempt) -> Result<(), StoreError> {
        self.quizzes
            .write()
            .await
            .entry(attempt.user_id.clone())
            .or_default()
            .push(attempt);
        Ok(())
    }

    async fn remove_quiz_attempt(&self, user_id: &str, attempt_id: &str) -> Result<(), StoreError> {
        if let Some(attempts) = self.quizzes.write().await.get_mut(user_id) {
            attempts.retain(|a| a.id != attempt_id);
        }
        Ok(())
    }

    async fn quiz_attempts(&self, user_id: &str) -> Result<Vec<QuizAttempt>, StoreError> {
        Ok(self.quizzes.read().await.get(user_id).cloned().unwrap_or_default())
    }
}

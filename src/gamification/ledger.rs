//! Points ledger: append-only history, running total, derived level, streak.
//!
//! Every function takes the current ledger by reference and returns a new
//! value. Stores apply these inside their atomic update.

use chrono::{DateTime, Utc};

use crate::domain::{
    Achievement, BadgeDefinition, EarnedBadge, HistoryEntry, Impact, LedgerAction, UserLedger,
};
use crate::gamification::{medals, progression::progression_for, streak};

/// Points handed to the ledger for one action.
#[derive(Clone, Debug, PartialEq)]
pub struct PointsAward {
    pub amount: i64,
    pub action: LedgerAction,
    pub description: String,
    pub reference_id: Option<String>,
}

/// Everything one award operation changes on a ledger, applied as a unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedgerDelta {
    pub awards: Vec<PointsAward>,
    pub challenges_completed: u32,
    pub impact: Option<Impact>,
    pub badges: Vec<BadgeDefinition>,
}

impl LedgerDelta {
    pub fn award(award: PointsAward) -> Self {
        Self { awards: vec![award], ..Self::default() }
    }

    pub fn with_challenge_completion(mut self, impact: Impact) -> Self {
        self.challenges_completed += 1;
        self.impact = Some(impact);
        self
    }

    pub fn grant_badges(badges: Vec<BadgeDefinition>) -> Self {
        Self { badges, ..Self::default() }
    }
}

fn refresh_progression(ledger: &mut UserLedger) {
    let p = progression_for(ledger.total_points);
    ledger.current_level = p.level;
    ledger.level_title = p.title.to_string();
    ledger.points_to_next_level = p.points_to_next;
}

/// Total, level and history only. Badge rewards go through here so they do not
/// count as a day of activity.
fn record_points(ledger: &mut UserLedger, award: &PointsAward, now: DateTime<Utc>) {
    ledger.total_points += award.amount;
    refresh_progression(ledger);
    ledger.history.push(HistoryEntry {
        action: award.action,
        points: award.amount,
        reference_id: award.reference_id.clone(),
        date: now,
        description: award.description.clone(),
    });
    ledger.updated_at = now;
}

/// Adds `award` to the total, records it in history and advances the streak.
/// Negative amounts are not rejected here.
pub fn append_points(ledger: &UserLedger, award: &PointsAward, now: DateTime<Utc>) -> UserLedger {
    let mut next = ledger.clone();
    record_points(&mut next, award, now);
    next.streak = streak::track(&next.streak, now);
    next
}

fn grant_badge(ledger: &mut UserLedger, badge: &BadgeDefinition, now: DateTime<Utc>) {
    if ledger.has_badge(&badge.id) {
        return;
    }
    ledger.badges.push(EarnedBadge {
        badge_id: badge.id.clone(),
        name: badge.name.clone(),
        description: badge.description.clone(),
        icon: badge.icon.clone(),
        category: badge.category,
        date_earned: now,
    });
    ledger.achievements.push(Achievement {
        id: badge.id.clone(),
        name: badge.name.clone(),
        description: badge.description.clone(),
        icon: badge.icon.clone(),
        points: badge.points_reward,
        date_earned: now,
    });
    if badge.points_reward > 0 {
        let reward = PointsAward {
            amount: i64::from(badge.points_reward),
            action: LedgerAction::BadgeReward,
            description: format!("Earned badge: {}", badge.name),
            reference_id: Some(badge.id.clone()),
        };
        record_points(ledger, &reward, now);
    }
}

/// Applies a whole delta. Badges already on the ledger are skipped, together
/// with their reward points.
pub fn apply_delta(ledger: &UserLedger, delta: &LedgerDelta, now: DateTime<Utc>) -> UserLedger {
    let mut next = ledger.clone();
    for award in &delta.awards {
        next = append_points(&next, award, now);
    }
    next.stats.challenges_completed += delta.challenges_completed;
    if let Some(impact) = &delta.impact {
        next.stats.total_impact.accumulate(impact);
    }
    for badge in &delta.badges {
        grant_badge(&mut next, badge, now);
    }
    next.medals = medals::tally(next.achievements.len());
    next.updated_at = now;
    next
}

/// Drops every history entry of `action` and recomputes the total from what
/// remains. This is the only path that lowers the total.
pub fn remove_action(ledger: &UserLedger, action: LedgerAction, now: DateTime<Utc>) -> UserLedger {
    let mut next = ledger.clone();
    next.history = ledger
        .history
        .iter()
        .filter(|entry| entry.action != action)
        .cloned()
        .collect();
    next.total_points = next.history.iter().map(|entry| entry.points).sum();
    refresh_progression(&mut next);
    next.updated_at = now;
    next
}

/// Ledger as shown to users: medals recomputed from the achievement count.
pub fn with_medals(ledger: &UserLedger) -> UserLedger {
    let mut view = ledger.clone();
    view.medals = medals::tally(view.achievements.len());
    view
}

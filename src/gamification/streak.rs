//! Consecutive-day streak tracking.
//!
//! Two activities count as consecutive when they are at most 24 hours apart in
//! either direction. This is looser than calendar-day adjacency: several
//! actions inside one day each extend the streak.

use chrono::{DateTime, Duration, Utc};

use crate::domain::Streak;

pub fn consecutive_window() -> Duration {
    Duration::hours(24)
}

pub fn is_consecutive(last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let diff = now - last;
    let window = consecutive_window();
    diff <= window && diff >= -window
}

/// Returns the streak after an activity at `now`.
pub fn track(streak: &Streak, now: DateTime<Utc>) -> Streak {
    let extends = match streak.last_activity_date {
        None => true,
        Some(last) => is_consecutive(last, now),
    };
    let current = if extends {
        streak.current.saturating_add(1)
    } else {
        1
    };
    Streak {
        current,
        longest: streak.longest.max(current),
        last_activity_date: Some(now),
    }
}

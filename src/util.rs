//! Small utility helpers used across modules: the injectable clock, calendar-day
//! keys and log-safe truncation.

use chrono::{DateTime, NaiveDate, Utc};

/// Source of "now". Injected so ledger and streak behavior is reproducible.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Calendar day (UTC) an instant falls on; used to key daily challenge completions.
pub fn day_key(at: DateTime<Utc>) -> NaiveDate {
  at.date_naive()
}

/// Log-safe truncation for user-supplied strings.
/// Avoids spamming logs with huge request payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

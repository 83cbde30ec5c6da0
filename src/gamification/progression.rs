//! Level and title derived from a cumulative point total.

use serde::Serialize;

pub const POINTS_PER_LEVEL: i64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub level: u32,
    pub title: &'static str,
    pub points_to_next: i64,
}

/// Title step function over the level number.
pub fn title_for_level(level: u32) -> &'static str {
    match level {
        l if l >= 10 => "Eco-Master",
        l if l >= 7 => "Eco-Expert",
        l if l >= 5 => "Eco-Professional",
        l if l >= 3 => "Eco-Enthusiast",
        2 => "Eco-Learner",
        _ => "Eco-Beginner",
    }
}

/// Negative totals (only reachable through manual adjustments) count as zero.
pub fn progression_for(total_points: i64) -> Progression {
    let points = total_points.max(0);
    let level = if points < POINTS_PER_LEVEL {
        1
    } else {
        u32::try_from(points / POINTS_PER_LEVEL + 1).unwrap_or(u32::MAX)
    };
    Progression {
        level,
        title: title_for_level(level),
        points_to_next: i64::from(level) * POINTS_PER_LEVEL - points,
    }
}

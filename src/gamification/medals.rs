//! Display-only medal counts derived from the number of achievements.
//!
//! Each tier is computed independently from the same count; a user with 60
//! achievements holds medals of every tier at once.

use crate::domain::Medals;

const BRONZE_EVERY: usize = 5;
const SILVER_EVERY: usize = 10;
const GOLD_EVERY: usize = 25;
const PLATINUM_EVERY: usize = 50;

fn tier(achievements: usize, every: usize) -> u32 {
    if achievements >= every {
        u32::try_from(achievements / every).unwrap_or(u32::MAX)
    } else {
        0
    }
}

pub fn tally(achievements: usize) -> Medals {
    Medals {
        bronze: tier(achievements, BRONZE_EVERY),
        silver: tier(achievements, SILVER_EVERY),
        gold: tier(achievements, GOLD_EVERY),
        platinum: tier(achievements, PLATINUM_EVERY),
    }
}

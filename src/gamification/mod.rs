//! Pure scoring and progression rules.
//!
//! Nothing in here touches storage or the clock: callers pass `now` and get a
//! new value back. The ledger store is the only place a ledger is mutated.

pub mod badges;
pub mod ledger;
pub mod medals;
pub mod progression;
pub mod rewards;
pub mod streak;

// # Clock Trait
//
// Source of the current instant for the licensing rules.
//
// Evaluation windows and cooldowns are computed from `Clock::now()` only, so
// tests can move time by swapping the implementation.

use chrono::{DateTime, Utc};

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// The current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

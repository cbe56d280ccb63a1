// SPDX-License-Identifier: MIT OR Apache-2.0
//! The injected clock port.
//!
//! Every place the pipeline needs "now" (policy expiry checks, informational
//! timestamps) goes through this trait rather than calling `Utc::now()`
//! directly, so tests can pin time and the deterministic core never has a
//! hidden wall-clock dependency. Entropy has no equivalent port: nothing
//! downstream of [`crate::canon`] is permitted to consult an RNG at all.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait ClockPort: Send + Sync {
    /// The current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_always_returns_same_instant() {
        let t = "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let clock = FixedClock(t);
        assert_eq!(clock.now(), t);
        assert_eq!(clock.now(), clock.now());
    }
}

//! Simulated time.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Monotonic simulated timestamp advanced in fixed steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    now: NaiveDateTime,
    step: Duration,
}

impl SimulationClock {
    /// Creates a clock at `start` advancing by `step`.
    ///
    /// # Panics
    ///
    /// Panics if `step` is zero or negative.
    #[must_use]
    pub fn new(start: NaiveDateTime, step: Duration) -> Self {
        assert!(step > Duration::zero(), "clock step must be positive");
        Self { now: start, step }
    }

    /// Creates a clock at `start` advancing one minute per step.
    #[must_use]
    pub fn per_minute(start: NaiveDateTime) -> Self {
        Self::new(start, Duration::minutes(1))
    }

    /// Current simulated time.
    #[must_use]
    pub const fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Calendar date of the current time.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Simulated time per advance.
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }

    /// Advances one step and returns the new time.
    pub fn advance(&mut self) -> NaiveDateTime {
        self.now += self.step;
        self.now
    }
}

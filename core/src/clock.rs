//! Simulation clock. Owns the hour cursor over the fixed window.

use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct HourClock {
    pub start:       NaiveDateTime,
    pub total_steps: u64,
    steps_taken:     u64,
}

impl HourClock {
    pub fn new(start: NaiveDateTime, total_steps: u64) -> Self {
        Self { start, total_steps, steps_taken: 0 }
    }

    /// Start of the hour the next step will simulate, or `None` once the
    /// window is exhausted.
    pub fn current(&self) -> Option<NaiveDateTime> {
        if self.is_finished() {
            return None;
        }
        Some(self.start + Duration::hours(self.steps_taken as i64))
    }

    /// Move to the next hour. Returns the number of completed steps.
    pub fn advance(&mut self) -> u64 {
        assert!(!self.is_finished(), "advance() called on a finished clock");
        self.steps_taken += 1;
        self.steps_taken
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn is_finished(&self) -> bool {
        self.steps_taken >= self.total_steps
    }

    /// End of the window (exclusive).
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::hours(self.total_steps as i64)
    }
}

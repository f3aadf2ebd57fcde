//! Presentation clock utilities.
//!
//! The playback engine reports presentation timestamps in microseconds;
//! rasterizers work in milliseconds. This module provides:
//! - The truncating microsecond to millisecond conversion
//! - Frame budget measurement for rasterizer calls

use std::time::{Duration, Instant};

/// Presentation timestamp in microseconds, as reported by the playback engine.
pub type TimestampUs = u64;

/// Rasterizer timestamp in milliseconds.
pub type TimestampMs = u64;

/// Convert a presentation timestamp to rasterizer milliseconds.
///
/// Sub-millisecond precision is dropped: `1999us` becomes `1ms`.
pub fn us_to_ms(us: TimestampUs) -> TimestampMs {
    us / 1000
}

/// Time allowed for a single rasterizer call before the frame is
/// considered late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBudget {
    budget: Duration,
}

impl FrameBudget {
    /// Create a budget of the given number of milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self {
            budget: Duration::from_millis(ms),
        }
    }

    /// Budget for a display refresh rate (e.g. 60Hz ~ 16ms).
    pub fn for_refresh_rate(hz: u32) -> Self {
        Self {
            budget: Duration::from_nanos(1_000_000_000 / hz.max(1) as u64),
        }
    }

    /// The configured budget.
    pub fn duration(&self) -> Duration {
        self.budget
    }

    /// Start timing a call against this budget.
    pub fn start(&self) -> BudgetTimer {
        BudgetTimer {
            started: Instant::now(),
            budget: self.budget,
        }
    }

    /// Check an already measured duration against the budget.
    pub fn check(&self, elapsed: Duration) -> BudgetOutcome {
        BudgetOutcome {
            elapsed,
            budget: self.budget,
        }
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::for_refresh_rate(60)
    }
}

/// A running measurement started by [`FrameBudget::start`].
#[derive(Debug)]
pub struct BudgetTimer {
    started: Instant,
    budget: Duration,
}

impl BudgetTimer {
    /// Stop the timer.
    pub fn finish(self) -> BudgetOutcome {
        BudgetOutcome {
            elapsed: self.started.elapsed(),
            budget: self.budget,
        }
    }
}

/// Result of a budget measurement.
#[derive(Debug, Clone, Copy)]
pub struct BudgetOutcome {
    /// How long the call took.
    pub elapsed: Duration,
    /// The budget it was measured against.
    pub budget: Duration,
}

impl BudgetOutcome {
    /// Whether the call took longer than the budget.
    pub fn overran(&self) -> bool {
        self.elapsed > self.budget
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

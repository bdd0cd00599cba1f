//! Tick budget tracking for the streaming update loop
//!
//! The streamer runs its pipeline stages inside the caller's frame, so each
//! tick gets a wall-clock budget that stages consume in order. A stage checks
//! the budget between items and stops early when it runs out; whatever is
//! left carries over to later stages in the same tick.
//!
//! For deterministic tests the budget can also be constructed in a frozen
//! state ([`TickBudget::unlimited`] / [`TickBudget::expired`]) so stage logic
//! can be exercised without sleeping.

use std::time::{Duration, Instant};

/// Default per-tick budget for texture work (~10% of a 60 FPS frame,
/// doubled: streaming competes with render work, not with vsync).
pub const DEFAULT_TICK_BUDGET: Duration = Duration::from_micros(3_300);

/// Fraction of the total budget each stage is guaranteed even when
/// earlier stages overran.
pub const STAGE_FLOOR_FRACTION: f64 = 0.33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BudgetMode {
    /// Normal wall-clock tracking
    Timed,

    /// Never expires (tests and flush paths)
    Unlimited,

    /// Already expired (tests)
    Expired,
}

/// Wall-clock budget for one streaming tick.
///
/// # Example
///
/// ```
/// use texture_streamer_scheduler::budget::TickBudget;
/// use std::time::Duration;
///
/// let mut budget = TickBudget::new(Duration::from_millis(4));
/// while !budget.should_yield() {
///     // process one item
///     # break;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TickBudget {
    /// When this tick started
    start: Instant,

    /// Total budget for this tick
    budget: Duration,

    /// Clock behaviour
    mode: BudgetMode,

    /// Number of yield checks performed
    check_count: u32,
}

impl TickBudget {
    /// Create a new wall-clock budget
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
            mode: BudgetMode::Timed,
            check_count: 0,
        }
    }

    /// Create a budget that never expires.
    ///
    /// Used by shutdown flushes and by tests that need every queued item
    /// processed in a single tick.
    pub fn unlimited() -> Self {
        Self {
            start: Instant::now(),
            budget: Duration::MAX,
            mode: BudgetMode::Unlimited,
            check_count: 0,
        }
    }

    /// Create a budget that is already expired.
    ///
    /// Used by tests exercising early-stop and minimum-batch behaviour.
    pub fn expired() -> Self {
        Self {
            start: Instant::now(),
            budget: Duration::ZERO,
            mode: BudgetMode::Expired,
            check_count: 0,
        }
    }

    /// Reset the budget for a new tick
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.check_count = 0;
    }

    /// Elapsed time since the tick started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Remaining time in this tick's budget.
    ///
    /// Returns `Duration::ZERO` once the budget is exceeded.
    pub fn remaining(&self) -> Duration {
        match self.mode {
            BudgetMode::Unlimited => Duration::MAX,
            BudgetMode::Expired => Duration::ZERO,
            BudgetMode::Timed => self.budget.saturating_sub(self.elapsed()),
        }
    }

    /// Whether the budget has been exceeded
    pub fn is_exceeded(&self) -> bool {
        self.remaining() == Duration::ZERO
    }

    /// Check if the current stage should stop, counting the check.
    pub fn should_yield(&mut self) -> bool {
        self.check_count += 1;
        self.is_exceeded()
    }

    /// The total tick budget
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Number of yield checks performed this tick
    pub fn check_count(&self) -> u32 {
        self.check_count
    }

    /// Minimum slice every stage gets regardless of earlier overruns.
    ///
    /// Prevents one hungry stage from starving the rest of the pipeline
    /// indefinitely.
    pub fn stage_floor(&self) -> Duration {
        match self.mode {
            BudgetMode::Unlimited => Duration::MAX,
            BudgetMode::Expired => Duration::ZERO,
            BudgetMode::Timed => self.budget.mul_f64(STAGE_FLOOR_FRACTION),
        }
    }

    /// Budget for one stage: the larger of the remaining time and the
    /// guaranteed stage floor.
    pub fn stage_budget(&self) -> TickBudget {
        match self.mode {
            BudgetMode::Timed => TickBudget::new(self.remaining().max(self.stage_floor())),
            _ => self.clone(),
        }
    }
}

impl Default for TickBudget {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_BUDGET)
    }
}

//! Texture Streamer Scheduler Library
//!
//! Tick budgeting and shared pipeline state for the texture streaming cache.
//!
//! The streamer runs its pipeline stages inside the caller's frame, so every
//! tick gets a wall-clock [`TickBudget`] that stages consume in order, with a
//! guaranteed floor so late stages are never starved. The
//! [`SchedulerContext`] carries the tick counter, the memory-pressure-driven
//! discard bias and the session statistics across stages.
//!
//! # Example
//!
//! ```
//! use texture_streamer_scheduler::{SchedulerContext, TickBudget};
//! use std::time::Duration;
//!
//! let mut ctx = SchedulerContext::new();
//! ctx.set_bias_from_utilization(0.95);
//! assert!(ctx.bias_elevated());
//!
//! let mut budget = TickBudget::new(Duration::from_millis(3));
//! while !budget.should_yield() {
//!     // process one queue entry
//!     # break;
//! }
//! ```

pub mod budget;
pub mod context;

// Re-export public API
pub use budget::{TickBudget, DEFAULT_TICK_BUDGET, STAGE_FLOOR_FRACTION};
pub use context::{
    bias_for_utilization, MemoryPressure, SchedulerContext, StreamStats, MAX_DISCARD_BIAS,
    MIN_DISCARD_BIAS,
};

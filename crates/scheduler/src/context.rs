//! Shared tick state for the streaming pipeline
//!
//! Tracks the tick counter, the global discard bias driven by memory
//! pressure, and the per-session statistics counters the pipeline stages
//! update as they run.

/// Lowest (neutral) value of the global discard bias.
pub const MIN_DISCARD_BIAS: f32 = 1.0;

/// Highest value of the global discard bias (two extra discard levels
/// for off-screen textures).
pub const MAX_DISCARD_BIAS: f32 = 4.0;

/// Utilization at which the bias starts climbing above neutral.
pub const BIAS_LOW_WATER: f64 = 0.85;

/// Memory pressure level derived from GPU budget utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    /// Memory usage is comfortable (< 70% utilization)
    Low,
    /// Memory usage is moderate (70-85% utilization)
    Moderate,
    /// Memory usage is high (85-95% utilization)
    High,
    /// Memory usage is critical (> 95% utilization)
    Critical,
}

impl MemoryPressure {
    /// Get the memory pressure level from a utilization ratio (0.0 to 1.0+)
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization < 0.70 {
            MemoryPressure::Low
        } else if utilization < BIAS_LOW_WATER {
            MemoryPressure::Moderate
        } else if utilization < 0.95 {
            MemoryPressure::High
        } else {
            MemoryPressure::Critical
        }
    }

    /// Returns true if pressure should drive the discard bias above neutral
    pub fn needs_bias(&self) -> bool {
        matches!(self, MemoryPressure::High | MemoryPressure::Critical)
    }
}

/// Map a GPU budget utilization ratio to a discard bias.
///
/// While the pressure level stays below [`MemoryPressure::High`] the bias is
/// neutral; past that the bias climbs linearly, reaching
/// [`MAX_DISCARD_BIAS`] at 30% over budget.
pub fn bias_for_utilization(utilization: f64) -> f32 {
    if !MemoryPressure::from_utilization(utilization).needs_bias() {
        return MIN_DISCARD_BIAS;
    }
    let span = 1.30 - BIAS_LOW_WATER;
    let t = ((utilization - BIAS_LOW_WATER) / span) as f32;
    (MIN_DISCARD_BIAS + t * (MAX_DISCARD_BIAS - MIN_DISCARD_BIAS))
        .clamp(MIN_DISCARD_BIAS, MAX_DISCARD_BIAS)
}

/// Per-session statistics counters updated by the pipeline stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Fetch requests dispatched to the transport
    pub fetches_dispatched: u64,

    /// Decoded results delivered by the transport
    pub fetches_delivered: u64,

    /// Fetches that ended in a missing asset or terminal error
    pub fetches_failed: u64,

    /// GPU creations completed
    pub creates_completed: u64,

    /// Create-queue entries skipped as redundant
    pub creates_skipped: u64,

    /// In-place downscales completed
    pub downscales_completed: u64,

    /// One-shot fast cache loads that found an entry
    pub fast_cache_hits: u64,

    /// One-shot fast cache loads that found nothing
    pub fast_cache_misses: u64,

    /// Resources reclaimed by the eviction sweeper
    pub evicted: u64,

    /// Last-good fallback buffers released on timeout
    pub fallbacks_released: u64,

    /// Resources visited by the most recent fetch-scheduler sweep
    pub scanned_last_tick: u32,
}

impl StreamStats {
    /// Fast cache hit rate over this session (0.0 to 1.0)
    pub fn fast_cache_hit_rate(&self) -> f64 {
        let total = self.fast_cache_hits + self.fast_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.fast_cache_hits as f64 / total as f64
        }
    }

    /// Fetches still outstanding on the transport
    pub fn fetches_in_flight(&self) -> u64 {
        self.fetches_dispatched
            .saturating_sub(self.fetches_delivered + self.fetches_failed)
    }

    /// Reset all counters to zero
    pub fn reset(&mut self) {
        *self = StreamStats::default();
    }
}

/// Tick-scoped state shared by every pipeline stage.
///
/// Owned by the streamer and handed mutably to each stage in turn. The tick
/// counter doubles as the staleness clock for visibility samples.
#[derive(Debug)]
pub struct SchedulerContext {
    /// Monotonic tick counter
    tick: u64,

    /// Global discard bias in [1, 4]
    bias: f32,

    /// Resources already re-biased since the bias last rose;
    /// bounds the per-tick cost of applying a new bias to the whole set
    bias_textures_updated: usize,

    /// Session statistics
    pub stats: StreamStats,
}

impl Default for SchedulerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerContext {
    /// Create a fresh context at tick zero with a neutral bias
    pub fn new() -> Self {
        Self {
            tick: 0,
            bias: MIN_DISCARD_BIAS,
            bias_textures_updated: 0,
            stats: StreamStats::default(),
        }
    }

    /// Current tick number
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the tick counter
    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }

    /// Current global discard bias
    pub fn bias(&self) -> f32 {
        self.bias
    }

    /// Whether the bias is elevated above neutral
    pub fn bias_elevated(&self) -> bool {
        self.bias > MIN_DISCARD_BIAS
    }

    /// Set the global bias, clamped to [1, 4].
    ///
    /// An increase restarts the re-bias bookkeeping so the next fetch sweeps
    /// run with an inflated slice until every resource has been revisited.
    pub fn set_bias(&mut self, bias: f32) {
        let bias = bias.clamp(MIN_DISCARD_BIAS, MAX_DISCARD_BIAS);
        if bias > self.bias {
            self.bias_textures_updated = 0;
        }
        self.bias = bias;
    }

    /// Derive and apply the bias from a GPU budget utilization ratio
    pub fn set_bias_from_utilization(&mut self, utilization: f64) {
        self.set_bias(bias_for_utilization(utilization));
    }

    /// Resources already revisited since the bias last rose
    pub fn bias_textures_updated(&self) -> usize {
        self.bias_textures_updated
    }

    /// Record that a sweep revisited `count` more resources under the
    /// current bias
    pub fn note_bias_textures_updated(&mut self, count: usize) {
        self.bias_textures_updated = self.bias_textures_updated.saturating_add(count);
    }

    /// Whether a sweep over `population` resources still needs an inflated
    /// slice to finish propagating the current bias
    pub fn bias_sweep_incomplete(&self, population: usize) -> bool {
        self.bias_elevated() && self.bias_textures_updated < population
    }
}

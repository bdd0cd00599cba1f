//! Eviction sweeping.
//!
//! Lazily reclaims resources nothing has referenced for a while, and
//! separately releases last-good fallback buffers on their own, longer
//! timeout. Sweeps run at most once per interval; between sweeps idle
//! resources simply sit in the registry.

use std::time::{Duration, Instant};

use texture_streamer_cache::{StreamerConfig, TextureRegistry};
use texture_streamer_scheduler::SchedulerContext;
use tracing::debug;

use crate::transport::GpuUploader;

/// Interval-gated reclaimer of idle resources.
#[derive(Debug, Default)]
pub struct EvictionSweeper {
    last_sweep: Option<Instant>,
}

impl EvictionSweeper {
    /// Create a sweeper that will run on its first opportunity
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a sweep if the configured interval has passed; otherwise do
    /// nothing. Returns the number of resources evicted.
    pub fn maybe_sweep(
        &mut self,
        registry: &mut TextureRegistry,
        ctx: &mut SchedulerContext,
        cfg: &StreamerConfig,
        gpu: &mut dyn GpuUploader,
        now: Instant,
    ) -> usize {
        if let Some(last) = self.last_sweep {
            if now.saturating_duration_since(last) < Duration::from_secs(cfg.sweep_interval_secs) {
                return 0;
            }
        }
        self.last_sweep = Some(now);
        self.sweep(registry, ctx, cfg, gpu, now)
    }

    /// Run a sweep unconditionally. Returns the number of resources evicted.
    ///
    /// A resource is reclaimed when every hold on it is gone: no handles
    /// above the structural floor, no live consumers, no pipeline queue
    /// membership, no exemption, and idle past the configured timeout. An
    /// in-flight fetch does not keep a resource alive; a late delivery for
    /// an evicted key is discarded when the create queue rechecks liveness.
    /// Last-good buffers are released independently on their own timeout,
    /// exempt or not.
    pub fn sweep(
        &mut self,
        registry: &mut TextureRegistry,
        ctx: &mut SchedulerContext,
        cfg: &StreamerConfig,
        gpu: &mut dyn GpuUploader,
        now: Instant,
    ) -> usize {
        let eviction_idle = Duration::from_secs(cfg.eviction_idle_secs);
        let last_good_idle = Duration::from_secs(cfg.last_good_idle_secs);

        let mut doomed = Vec::new();
        for (key, res) in registry.iter_mut() {
            if res.last_good.is_some() && res.last_good_idle_for(now) > last_good_idle {
                res.last_good = None;
                ctx.stats.fallbacks_released += 1;
            }

            if res.at_structural_floor()
                && res.consumer_count() == 0
                && !res.is_eviction_exempt()
                && !res.in_any_queue()
                && res.idle_for(now) > eviction_idle
            {
                doomed.push(*key);
            }
        }

        for key in &doomed {
            gpu.release(*key);
            registry.remove(key);
            ctx.stats.evicted += 1;
        }

        if !doomed.is_empty() {
            debug!(count = doomed.len(), "evicted idle textures");
        }
        doomed.len()
    }
}

//! Downscale queue.
//!
//! Resources whose resident level is finer than desired are reduced in
//! place on the GPU instead of waiting for a coarser refetch. Freeing
//! memory is the whole point, so the queue is allowed a small overdraft:
//! a minimum batch is processed every tick even with the budget spent,
//! otherwise memory pressure could never be relieved on busy frames.

use std::collections::VecDeque;

use texture_streamer_cache::{StreamerConfig, TextureKey, TextureRegistry};
use texture_streamer_scheduler::{SchedulerContext, TickBudget};
use tracing::warn;

use crate::transport::GpuUploader;

/// FIFO of resources waiting for an in-place GPU reduction.
#[derive(Debug, Default)]
pub struct DownscaleQueue {
    queue: VecDeque<TextureKey>,
}

impl DownscaleQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries waiting for reduction
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueue a resource; the caller is responsible for having set its
    /// `downscale_pending` flag.
    pub fn push(&mut self, key: TextureKey) {
        self.queue.push_back(key);
    }

    /// Reduce queued resources until the queue runs out, or the budget is
    /// spent and the minimum batch has been met.
    ///
    /// Entries are re-validated when drained: a resource may have been
    /// evicted, or its desired level may have caught back up with the
    /// resident level, in which case nothing happens.
    pub fn drain(
        &mut self,
        registry: &mut TextureRegistry,
        ctx: &mut SchedulerContext,
        cfg: &StreamerConfig,
        gpu: &mut dyn GpuUploader,
        budget: &mut TickBudget,
    ) {
        let mut processed = 0usize;

        while let Some(key) = self.queue.pop_front() {
            if processed >= cfg.min_downscale_batch && budget.should_yield() {
                self.queue.push_front(key);
                break;
            }
            processed += 1;

            let Some(res) = registry.get_mut(&key) else {
                continue;
            };
            res.downscale_pending = false;

            let Some(current) = res.current_level else {
                continue;
            };
            // desire caught up; nothing to reduce
            if current >= res.desired_level {
                continue;
            }

            let target = res.desired_level;
            match gpu.downscale(key, current, target) {
                Ok(()) => {
                    res.demote_level(target);
                    ctx.stats.downscales_completed += 1;
                }
                Err(e) => {
                    warn!(id = %key.id, error = %e, "gpu downscale failed");
                }
            }
        }
    }
}

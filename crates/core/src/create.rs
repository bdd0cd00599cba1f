//! GPU create queue.
//!
//! Receives decoded results from the transport, stages them on their
//! resources, and turns staged pixels into resident GPU textures under the
//! tick budget. Every entry is re-validated against the registry when it is
//! drained: resources may have been evicted, or may have obtained finer data
//! by other means, since the entry was queued.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::time::Instant;

use texture_streamer_cache::{
    FastCacheStore, FetchState, TextureKey, TextureRegistry, FAST_CACHE_MAX_DIM,
};
use texture_streamer_scheduler::{SchedulerContext, TickBudget};
use tracing::{debug, warn};

use crate::downscale::DownscaleQueue;
use crate::transport::{Delivery, FetchOutcome, GpuUploader};

/// FIFO of resources with decoded pixels waiting for GPU creation.
pub struct CreateQueue {
    queue: VecDeque<TextureKey>,
    rx: Receiver<Delivery>,
}

impl CreateQueue {
    /// Create a queue fed by the transport's delivery channel
    pub fn new(rx: Receiver<Delivery>) -> Self {
        Self {
            queue: VecDeque::new(),
            rx,
        }
    }

    /// Entries waiting for creation
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueue a resource whose decoded pixels were staged outside the
    /// delivery path (the fast cache loader uses this).
    pub fn push(&mut self, key: TextureKey) {
        self.queue.push_back(key);
    }

    /// Drain the delivery channel, staging decoded results on their
    /// resources and enqueueing them for creation.
    ///
    /// Cheap regardless of volume: no GPU work happens here.
    pub fn pump(&mut self, registry: &mut TextureRegistry, ctx: &mut SchedulerContext) {
        while let Ok(delivery) = self.rx.try_recv() {
            let Some(res) = registry.get_mut(&delivery.key) else {
                debug!(id = %delivery.key.id, "delivery for evicted resource, dropping");
                continue;
            };

            match delivery.outcome {
                FetchOutcome::Decoded(decoded) => {
                    res.decoded = Some(decoded);
                    res.fetch_state = FetchState::Loaded;
                    ctx.stats.fetches_delivered += 1;
                    if !res.create_pending {
                        res.create_pending = true;
                        self.queue.push_back(delivery.key);
                    }
                }
                FetchOutcome::Missing => {
                    debug!(id = %delivery.key.id, "asset missing");
                    res.fetch_state = FetchState::MissingAsset;
                    res.requested_level = None;
                    ctx.stats.fetches_failed += 1;
                }
                FetchOutcome::Failed(reason) => {
                    warn!(id = %delivery.key.id, %reason, "fetch failed");
                    res.fetch_state = FetchState::Error;
                    res.requested_level = None;
                    ctx.stats.fetches_failed += 1;
                }
            }
        }
    }

    /// Create GPU textures from staged pixels until the queue or the budget
    /// runs out.
    ///
    /// Entries whose GPU upload fails are re-queued for the next tick.
    /// Resources already resident at a level at least as fine as desired are
    /// skipped without touching the GPU.
    #[allow(clippy::too_many_arguments)]
    pub fn drain(
        &mut self,
        registry: &mut TextureRegistry,
        ctx: &mut SchedulerContext,
        gpu: &mut dyn GpuUploader,
        downscale: &mut DownscaleQueue,
        fast: &mut FastCacheStore,
        now: Instant,
        budget: &mut TickBudget,
    ) {
        let mut retry = Vec::new();

        while let Some(key) = self.queue.pop_front() {
            if budget.should_yield() {
                self.queue.push_front(key);
                break;
            }

            let Some(res) = registry.get_mut(&key) else {
                continue;
            };
            res.create_pending = false;

            let Some(decoded) = res.decoded.take() else {
                continue;
            };

            // redundant load: something at least as fine is already resident
            if res.current_satisfies_desired() {
                ctx.stats.creates_skipped += 1;
                res.keep_last_good(decoded.buffer, now);
                continue;
            }

            match gpu.upload(key, &decoded.buffer, decoded.level) {
                Ok(()) => {
                    res.promote_level(decoded.level);
                    res.fetch_state = FetchState::Loaded;
                    ctx.stats.creates_completed += 1;

                    // persist tiny heads for next session's fast path
                    if !res.params.volatile
                        && decoded.buffer.width <= FAST_CACHE_MAX_DIM
                        && decoded.buffer.height <= FAST_CACHE_MAX_DIM
                    {
                        if let Err(e) = fast.put(key.id, &decoded.buffer, decoded.level) {
                            warn!(id = %key.id, error = %e, "fast cache write failed");
                        }
                    }

                    // arrived finer than currently wanted: reduce in place
                    // instead of waiting for a refetch
                    let finer_than_desired = res
                        .current_level
                        .map_or(false, |cur| cur < res.desired_level);
                    if finer_than_desired && !res.downscale_pending {
                        res.downscale_pending = true;
                        downscale.push(key);
                    }

                    res.keep_last_good(decoded.buffer, now);
                }
                Err(e) => {
                    warn!(id = %key.id, error = %e, "gpu create failed, retrying next tick");
                    res.decoded = Some(decoded);
                    res.create_pending = true;
                    retry.push(key);
                }
            }
        }

        self.queue.extend(retry);
    }
}

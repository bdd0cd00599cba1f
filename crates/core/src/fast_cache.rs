//! One-shot fast cache loading.
//!
//! Newly registered resources get a single chance to pick up a tiny
//! low-resolution head from the persistent fast cache, so something is on
//! screen within a tick or two of registration instead of after a full
//! fetch round trip. Each resource passes through this queue exactly once;
//! hit or miss, it is never re-queued.

use std::collections::VecDeque;

use texture_streamer_cache::{DecodedLevel, FastCacheStore, TextureKey, TextureRegistry};
use texture_streamer_scheduler::{SchedulerContext, TickBudget};
use tracing::warn;

use crate::create::CreateQueue;

/// FIFO of resources awaiting their one fast cache lookup.
#[derive(Debug, Default)]
pub struct FastCacheLoader {
    queue: VecDeque<TextureKey>,
}

impl FastCacheLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries awaiting lookup
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue a resource for its one-shot lookup; the caller is responsible
    /// for having set its `in_fast_cache_queue` flag.
    pub fn push(&mut self, key: TextureKey) {
        self.queue.push_back(key);
    }

    /// Look up queued resources in the store and stage hits for GPU
    /// creation, until the queue or the budget runs out.
    ///
    /// A hit only ever improves a resource: if real fetched data already
    /// arrived, the stale head is discarded.
    pub fn drain(
        &mut self,
        registry: &mut TextureRegistry,
        store: &mut FastCacheStore,
        create: &mut CreateQueue,
        ctx: &mut SchedulerContext,
        budget: &mut TickBudget,
    ) {
        while let Some(key) = self.queue.pop_front() {
            if budget.should_yield() {
                self.queue.push_front(key);
                break;
            }

            let Some(res) = registry.get_mut(&key) else {
                continue;
            };
            res.in_fast_cache_queue = false;

            // real data beat us to it
            if res.has_gpu_data() || res.decoded.is_some() {
                continue;
            }

            let entry = match store.get(key.id) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(id = %key.id, error = %e, "fast cache read failed");
                    ctx.stats.fast_cache_misses += 1;
                    continue;
                }
            };

            match entry {
                Some(entry) => {
                    res.decoded = Some(DecodedLevel {
                        buffer: entry.buffer,
                        level: entry.level,
                    });
                    if !res.create_pending {
                        res.create_pending = true;
                        create.push(key);
                    }
                    ctx.stats.fast_cache_hits += 1;
                }
                None => {
                    ctx.stats.fast_cache_misses += 1;
                }
            }
        }
    }
}

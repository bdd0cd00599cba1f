//! Fetch scheduling.
//!
//! Sweeps a slice of the registry each tick with a resumable cursor,
//! refreshing every visited resource's importance and desired level, letting
//! footprints decay under pressure, queueing downscales where the resident
//! level overshoots the desired one, and dispatching fetches where it falls
//! short. Bounded both by the slice size and by the tick budget, so no
//! single tick ever touches the whole registry when it is large.

use texture_streamer_cache::{
    FetchState, StreamerConfig, TextureKey, TextureRegistry,
};
use texture_streamer_scheduler::{SchedulerContext, TickBudget};
use tracing::trace;

use crate::discard;
use crate::downscale::DownscaleQueue;
use crate::error::Result;
use crate::importance;
use crate::transport::{FetchRequest, FetchTransport};

/// Cursor-based registry sweeper that keeps fetches flowing.
#[derive(Debug, Default)]
pub struct FetchScheduler {
    /// Key the previous sweep stopped at; the next sweep resumes after it
    cursor: Option<TextureKey>,
}

impl FetchScheduler {
    /// Create a scheduler with the cursor at the start of the registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources one sweep should visit.
    ///
    /// A fraction of the registry with a fixed floor; inflated by the bias
    /// while a raised bias still has resources left to revisit, so pressure
    /// propagates through the whole set quickly.
    fn slice_size(&self, population: usize, cfg: &StreamerConfig, ctx: &SchedulerContext) -> usize {
        let mut slice = cfg
            .fetch_slice_min
            .max((population as f32 * cfg.fetch_slice_fraction) as usize);
        if ctx.bias_sweep_incomplete(population) {
            slice = (slice as f32 * ctx.bias()) as usize;
        }
        slice.min(population)
    }

    /// Run one sweep: refresh importance and desired levels for a slice of
    /// the registry and dispatch fetches where needed.
    ///
    /// Returns the number of resources visited. Stops early when the budget
    /// runs out; the cursor keeps its place either way.
    pub fn sweep(
        &mut self,
        registry: &mut TextureRegistry,
        ctx: &mut SchedulerContext,
        cfg: &StreamerConfig,
        transport: &mut dyn FetchTransport,
        downscale: &mut DownscaleQueue,
        budget: &mut TickBudget,
    ) -> Result<usize> {
        let population = registry.len();
        if population == 0 {
            return Ok(0);
        }

        let slice = self.slice_size(population, cfg, ctx);
        let mut scanned = 0usize;

        let mut key = match self.cursor {
            Some(prev) => registry.next_key_after(&prev),
            None => registry.first_key(),
        };

        while scanned < slice {
            let Some(current) = key else {
                // end of the map: wrap within the tick so small registries
                // still get their full slice (slice <= population, so no
                // resource is visited twice)
                key = registry.first_key();
                continue;
            };

            if budget.should_yield() {
                break;
            }

            self.visit(current, registry, ctx, cfg, transport, downscale)?;
            scanned += 1;
            self.cursor = Some(current);
            key = registry.next_key_after(&current);
        }

        if ctx.bias_elevated() {
            ctx.note_bias_textures_updated(scanned);
        }
        ctx.stats.scanned_last_tick = scanned as u32;
        Ok(scanned)
    }

    /// Refresh one resource, flag it for downscaling if it is resident
    /// finer than needed, and dispatch a fetch if it needs finer data.
    fn visit(
        &mut self,
        key: TextureKey,
        registry: &mut TextureRegistry,
        ctx: &mut SchedulerContext,
        cfg: &StreamerConfig,
        transport: &mut dyn FetchTransport,
        downscale: &mut DownscaleQueue,
    ) -> Result<()> {
        let Some(res) = registry.get_mut(&key) else {
            return Ok(());
        };

        // nothing references it and nothing seeded an estimate (manifest
        // prefetch seeds the accumulator); leave it for the sweeper
        if res.at_structural_floor() && res.consumer_count() == 0 && res.virtual_size == 0.0 {
            return Ok(());
        }

        let verdict = importance::update_importance(res, cfg, ctx);
        discard::update_desired_level(res, &verdict, cfg);
        discard::maybe_decay(res, cfg, ctx);

        // the desire moved coarser than what is resident (bias rose or the
        // footprint decayed): reclaim the extra memory in place
        let finer_than_desired = res
            .current_level
            .map_or(false, |cur| cur < res.desired_level);
        if finer_than_desired && !res.downscale_pending {
            res.downscale_pending = true;
            downscale.push(key);
        }

        // nothing wants pixels yet; a zero footprint fetches nothing
        if res.virtual_size <= 0.0 {
            return Ok(());
        }

        let wants_fetch = match res.fetch_state {
            FetchState::Unrequested => true,
            // data is resident but coarser than wanted, and nothing finer
            // is already on its way
            FetchState::Loaded => {
                !res.current_satisfies_desired()
                    && res.requested_level.map_or(true, |r| r > res.desired_level)
            }
            FetchState::Pending | FetchState::MissingAsset | FetchState::Error => false,
        };

        if wants_fetch {
            let level = res.desired_level;
            let (width, height) = res.level_dimensions(level);
            let request = FetchRequest {
                key,
                level,
                width,
                height,
                source_url: res.params.source_url.clone(),
            };
            trace!(id = %key.id, level, "dispatching fetch");
            transport.dispatch(request)?;
            res.fetch_state = FetchState::Pending;
            res.requested_level = Some(level);
            ctx.stats.fetches_dispatched += 1;
        }

        Ok(())
    }

    /// Put every in-flight fetch back to unrequested so the next sweeps
    /// re-dispatch them. Recovery hook for a wedged transport.
    pub fn reset_fetching(&mut self, registry: &mut TextureRegistry, ctx: &mut SchedulerContext) {
        let mut reset = 0u64;
        for (_, res) in registry.iter_mut() {
            if res.fetch_state == FetchState::Pending {
                res.fetch_state = FetchState::Unrequested;
                res.requested_level = None;
                reset += 1;
            }
        }
        // dispatched-but-abandoned requests no longer count as in flight
        ctx.stats.fetches_failed += reset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::doubles::SilentTransport;
    use texture_streamer_cache::{CreationParams, ListKind, VisibilitySample};
    use uuid::Uuid;

    fn populate(registry: &mut TextureRegistry, n: usize) -> Vec<TextureKey> {
        for _ in 0..n {
            let key = TextureKey::new(Uuid::new_v4(), ListKind::Standard);
            let (res, _) = registry.get_or_create(key, CreationParams::default());
            res.ref_count += 1; // a live handle
            res.record_sample(
                1,
                VisibilitySample {
                    pixel_area: 512.0 * 512.0,
                    on_screen: true,
                    ..Default::default()
                },
            );
        }
        registry.keys()
    }

    #[test]
    fn test_sweep_dispatches_for_visible_resources() {
        let mut registry = TextureRegistry::new();
        populate(&mut registry, 4);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();

        let scanned = FetchScheduler::new()
            .sweep(
                &mut registry,
                &mut ctx,
                &cfg,
                &mut transport,
                &mut DownscaleQueue::new(),
                &mut TickBudget::unlimited(),
            )
            .unwrap();

        assert_eq!(scanned, 4);
        assert_eq!(transport.dispatched.len(), 4);
        assert_eq!(ctx.stats.fetches_dispatched, 4);
        for (_, res) in registry.iter() {
            assert_eq!(res.fetch_state, FetchState::Pending);
        }
    }

    #[test]
    fn test_pending_resources_not_redispatched() {
        let mut registry = TextureRegistry::new();
        populate(&mut registry, 2);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();
        let mut sched = FetchScheduler::new();

        sched
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();
        sched
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();

        assert_eq!(transport.dispatched.len(), 2);
    }

    #[test]
    fn test_refetch_for_finer_level() {
        let mut registry = TextureRegistry::new();
        let keys = populate(&mut registry, 1);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();
        let mut sched = FetchScheduler::new();

        // loaded at a coarse level, wanting finer
        {
            let res = registry.get_mut(&keys[0]).unwrap();
            res.fetch_state = FetchState::Loaded;
            res.promote_level(4);
            res.requested_level = Some(4);
        }

        sched
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();

        assert_eq!(transport.dispatched.len(), 1);
        let res = registry.get(&keys[0]).unwrap();
        assert_eq!(res.fetch_state, FetchState::Pending);
        assert!(res.requested_level.unwrap() < 4);
    }

    #[test]
    fn test_satisfied_resource_not_refetched() {
        let mut registry = TextureRegistry::new();
        let keys = populate(&mut registry, 1);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();

        {
            let res = registry.get_mut(&keys[0]).unwrap();
            res.fetch_state = FetchState::Loaded;
            res.promote_level(0);
        }

        FetchScheduler::new()
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();
        assert!(transport.dispatched.is_empty());
    }

    #[test]
    fn test_missing_asset_never_retried() {
        let mut registry = TextureRegistry::new();
        let keys = populate(&mut registry, 1);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();

        registry.get_mut(&keys[0]).unwrap().fetch_state = FetchState::MissingAsset;

        FetchScheduler::new()
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();
        assert!(transport.dispatched.is_empty());
    }

    #[test]
    fn test_slice_floor_and_fraction() {
        let sched = FetchScheduler::new();
        let cfg = StreamerConfig::default();
        let ctx = SchedulerContext::new();

        // small population: the floor wins but never exceeds the population
        assert_eq!(sched.slice_size(10, &cfg, &ctx), 10);
        assert_eq!(sched.slice_size(100, &cfg, &ctx), 32);
        // large population: 5% wins
        assert_eq!(sched.slice_size(10_000, &cfg, &ctx), 500);
    }

    #[test]
    fn test_slice_inflated_while_bias_sweep_incomplete() {
        let sched = FetchScheduler::new();
        let cfg = StreamerConfig::default();
        let mut ctx = SchedulerContext::new();
        ctx.set_bias(2.0);

        assert_eq!(sched.slice_size(10_000, &cfg, &ctx), 1000);

        // once every resource has been revisited the slice shrinks back
        ctx.note_bias_textures_updated(10_000);
        assert_eq!(sched.slice_size(10_000, &cfg, &ctx), 500);
    }

    #[test]
    fn test_cursor_resumes_and_wraps() {
        let mut registry = TextureRegistry::new();
        populate(&mut registry, 100);
        let mut ctx = SchedulerContext::new();
        let mut cfg = StreamerConfig::default();
        cfg.fetch_slice_min = 40;
        let mut transport = SilentTransport::new();
        let mut sched = FetchScheduler::new();

        // three sweeps of 40 cover all 100 and wrap
        for _ in 0..3 {
            sched
                .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
                .unwrap();
        }
        assert_eq!(transport.dispatched.len(), 100);
    }

    #[test]
    fn test_over_resident_resource_enqueued_for_downscale() {
        let mut registry = TextureRegistry::new();
        let key = TextureKey::new(Uuid::new_v4(), ListKind::Standard);
        {
            let (res, _) = registry.get_or_create(key, CreationParams::default());
            res.ref_count += 1;
            // tiny footprint wants the coarsest level
            res.record_sample(
                1,
                VisibilitySample {
                    pixel_area: 1024.0,
                    on_screen: true,
                    ..Default::default()
                },
            );
            res.fetch_state = FetchState::Loaded;
            res.promote_level(0); // resident at full resolution
        }

        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();
        let mut downscale = DownscaleQueue::new();

        FetchScheduler::new()
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut downscale, &mut TickBudget::unlimited())
            .unwrap();

        let res = registry.get(&key).unwrap();
        assert_eq!(res.desired_level, res.max_level());
        assert!(res.downscale_pending);
        assert_eq!(downscale.len(), 1);
        // already finer than desired: no refetch either
        assert!(transport.dispatched.is_empty());
    }

    #[test]
    fn test_small_registry_scanned_every_sweep() {
        let mut registry = TextureRegistry::new();
        populate(&mut registry, 2);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();
        let mut sched = FetchScheduler::new();

        // the cursor wraps inside the tick, so a registry smaller than the
        // slice is fully visited every sweep
        for _ in 0..3 {
            let scanned = sched
                .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
                .unwrap();
            assert_eq!(scanned, 2);
        }
    }

    #[test]
    fn test_budget_stops_sweep_early() {
        let mut registry = TextureRegistry::new();
        populate(&mut registry, 50);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();

        let scanned = FetchScheduler::new()
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::expired())
            .unwrap();
        assert_eq!(scanned, 0);
        assert!(transport.dispatched.is_empty());
    }

    #[test]
    fn test_structural_floor_resources_skipped() {
        let mut registry = TextureRegistry::new();
        // resource with no handle and no consumers
        registry.get_or_create(
            TextureKey::new(Uuid::new_v4(), ListKind::Standard),
            CreationParams::default(),
        );
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();

        FetchScheduler::new()
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();
        assert!(transport.dispatched.is_empty());
    }

    #[test]
    fn test_reset_fetching() {
        let mut registry = TextureRegistry::new();
        populate(&mut registry, 3);
        let mut ctx = SchedulerContext::new();
        let cfg = StreamerConfig::default();
        let mut transport = SilentTransport::new();
        let mut sched = FetchScheduler::new();

        sched
            .sweep(&mut registry, &mut ctx, &cfg, &mut transport, &mut DownscaleQueue::new(), &mut TickBudget::unlimited())
            .unwrap();
        sched.reset_fetching(&mut registry, &mut ctx);

        for (_, res) in registry.iter() {
            assert_eq!(res.fetch_state, FetchState::Unrequested);
            assert_eq!(res.requested_level, None);
        }
        assert_eq!(ctx.stats.fetches_in_flight(), 0);
    }
}

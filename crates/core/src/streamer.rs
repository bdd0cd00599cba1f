//! The texture streamer facade.
//!
//! Owns the registry, the scheduler context and every pipeline stage, and
//! runs them in order inside [`TextureStreamer::tick`]. Consumers interact
//! only with this type: register textures, report visibility, tick, and the
//! pipeline keeps resident resolutions converging toward what the screen
//! needs within the GPU budget.
//!
//! Stage order per tick: fast cache loads (cheapest way to get pixels on
//! screen), then the fetch sweep, then GPU creation, then downscales, then
//! the eviction sweep. Under elevated bias the downscale queue additionally
//! runs before creation, so memory is freed before more is allocated.

use std::sync::mpsc::Receiver;
use std::time::Instant;

use texture_streamer_cache::{
    manifest, ConsumerId, CreationParams, FastCacheStore, ListKind, ManifestEntry, PriorityClass,
    StreamerConfig, TextureId, TextureKey, TextureRegistry, TextureResource, VisibilitySample,
    STRUCTURAL_REFS,
};
use texture_streamer_scheduler::{SchedulerContext, StreamStats, TickBudget};
use tracing::{debug, error, info};

use crate::create::CreateQueue;
use crate::downscale::DownscaleQueue;
use crate::error::Result;
use crate::evict::EvictionSweeper;
use crate::fast_cache::FastCacheLoader;
use crate::fetch::FetchScheduler;
use crate::transport::{Delivery, FetchTransport, GpuUploader};

/// Single-threaded texture streaming cache.
///
/// Owned by one thread; fetch and decode happen elsewhere and come back
/// over the delivery channel the [`CreateQueue`] drains.
pub struct TextureStreamer {
    config: StreamerConfig,
    registry: TextureRegistry,
    ctx: SchedulerContext,
    fetch: FetchScheduler,
    create: CreateQueue,
    downscale: DownscaleQueue,
    fast_loader: FastCacheLoader,
    sweeper: EvictionSweeper,
    fast_store: FastCacheStore,
    transport: Box<dyn FetchTransport>,
    gpu: Box<dyn GpuUploader>,
}

impl TextureStreamer {
    /// Create a streamer.
    ///
    /// `deliveries` is the receiving end of the channel the transport sends
    /// its results on. Opens (or creates) the fast cache under the
    /// configured cache directory.
    pub fn new(
        config: StreamerConfig,
        transport: Box<dyn FetchTransport>,
        gpu: Box<dyn GpuUploader>,
        deliveries: Receiver<Delivery>,
    ) -> Result<Self> {
        let fast_store = FastCacheStore::open(config.fast_cache_dir())?;
        info!(cache_dir = %config.cache_dir.display(), "texture streamer starting");
        Ok(Self {
            config,
            registry: TextureRegistry::new(),
            ctx: SchedulerContext::new(),
            fetch: FetchScheduler::new(),
            create: CreateQueue::new(deliveries),
            downscale: DownscaleQueue::new(),
            fast_loader: FastCacheLoader::new(),
            sweeper: EvictionSweeper::new(),
            fast_store,
            transport,
            gpu,
        })
    }

    /// Register (or re-reference) a texture and take a handle on it.
    ///
    /// Every `request` must be paired with a [`release`](Self::release).
    /// When the fast cache is enabled, a newly registered, non-volatile
    /// texture with a fast cache entry is queued for its one-shot fast load.
    pub fn request(&mut self, id: TextureId, kind: ListKind, params: CreationParams) -> TextureKey {
        let key = TextureKey::new(id, kind);
        let volatile = params.volatile;
        let (res, created) = self.registry.get_or_create(key, params);
        res.ref_count += 1;
        res.touch(Instant::now());

        if created && !volatile && self.config.fast_cache_enabled && self.fast_store.contains(id) {
            res.in_fast_cache_queue = true;
            self.fast_loader.push(key);
        }
        key
    }

    /// Give back a handle taken by [`request`](Self::request).
    ///
    /// The resource stays registered; once all handles are gone and it has
    /// idled past the timeout, the sweeper reclaims it.
    pub fn release(&mut self, key: TextureKey) {
        if let Some(res) = self.registry.get_mut(&key) {
            res.ref_count = res.ref_count.saturating_sub(1).max(STRUCTURAL_REFS);
            res.touch(Instant::now());
        }
    }

    /// Report one consumer's visibility of a texture for this tick.
    pub fn report_visibility(
        &mut self,
        key: TextureKey,
        consumer: ConsumerId,
        mut sample: VisibilitySample,
    ) {
        let tick = self.ctx.tick();
        if let Some(res) = self.registry.get_mut(&key) {
            sample.tick = tick;
            res.record_sample(consumer, sample);
            res.touch(Instant::now());
        }
    }

    /// Remove a consumer's visibility record.
    pub fn drop_consumer(&mut self, key: TextureKey, consumer: ConsumerId) {
        if let Some(res) = self.registry.get_mut(&key) {
            res.remove_consumer(consumer);
        }
    }

    /// Set a texture's priority class.
    pub fn set_priority_class(&mut self, key: TextureKey, class: PriorityClass) {
        if let Some(res) = self.registry.get_mut(&key) {
            res.priority_class = class;
        }
    }

    /// Pin or unpin a texture against eviction.
    pub fn set_no_evict(&mut self, key: TextureKey, no_evict: bool) {
        if let Some(res) = self.registry.get_mut(&key) {
            res.no_evict = no_evict;
        }
    }

    /// Look up a resource's current state.
    pub fn resource(&self, key: &TextureKey) -> Option<&TextureResource> {
        self.registry.get(key)
    }

    /// Number of registered textures
    pub fn texture_count(&self) -> usize {
        self.registry.len()
    }

    /// Current global discard bias
    pub fn bias(&self) -> f32 {
        self.ctx.bias()
    }

    /// Session statistics
    pub fn stats(&self) -> StreamStats {
        self.ctx.stats
    }

    /// Run one streaming tick within `budget`.
    ///
    /// Each stage gets the remaining budget with a guaranteed floor, so an
    /// overrun in one stage slows the rest down but never starves them.
    pub fn tick(&mut self, budget: TickBudget) {
        self.ctx.advance_tick();

        let utilization = self.gpu.used_bytes() as f64 / self.config.gpu_budget_bytes as f64;
        self.ctx.set_bias_from_utilization(utilization);

        let now = Instant::now();

        {
            let mut stage = budget.stage_budget();
            self.fast_loader.drain(
                &mut self.registry,
                &mut self.fast_store,
                &mut self.create,
                &mut self.ctx,
                &mut stage,
            );
        }

        {
            let mut stage = budget.stage_budget();
            if let Err(e) = self.fetch.sweep(
                &mut self.registry,
                &mut self.ctx,
                &self.config,
                self.transport.as_mut(),
                &mut self.downscale,
                &mut stage,
            ) {
                error!(error = %e, "fetch sweep failed");
            }
        }

        // under pressure, free memory before allocating more
        if self.ctx.bias_elevated() {
            let mut stage = budget.stage_budget();
            self.downscale.drain(
                &mut self.registry,
                &mut self.ctx,
                &self.config,
                self.gpu.as_mut(),
                &mut stage,
            );
        }

        self.create.pump(&mut self.registry, &mut self.ctx);
        {
            let mut stage = budget.stage_budget();
            self.create.drain(
                &mut self.registry,
                &mut self.ctx,
                self.gpu.as_mut(),
                &mut self.downscale,
                &mut self.fast_store,
                now,
                &mut stage,
            );
        }

        {
            let mut stage = budget.stage_budget();
            self.downscale.drain(
                &mut self.registry,
                &mut self.ctx,
                &self.config,
                self.gpu.as_mut(),
                &mut stage,
            );
        }

        self.sweeper.maybe_sweep(
            &mut self.registry,
            &mut self.ctx,
            &self.config,
            self.gpu.as_mut(),
            now,
        );
    }

    /// Seed the registry from the persisted prefetch manifest.
    ///
    /// Each entry is registered with its saved footprint as the initial
    /// estimate, so fetching starts before any consumer reports visibility.
    /// Returns the number of textures seeded.
    pub fn prefetch_from_manifest(&mut self) -> Result<usize> {
        let entries = manifest::load(self.config.manifest_path())?;
        let mut seeded = 0usize;
        for entry in entries {
            let key = TextureKey::new(entry.id, entry.kind);
            let (res, created) = self.registry.get_or_create(key, CreationParams::default());
            if created {
                res.add_texture_stats(entry.pixel_area);
                seeded += 1;
                if self.config.fast_cache_enabled && self.fast_store.contains(entry.id) {
                    res.in_fast_cache_queue = true;
                    self.fast_loader.push(key);
                }
            }
        }
        debug!(seeded, "prefetch manifest applied");
        Ok(seeded)
    }

    /// Persist the prefetch manifest and stop.
    ///
    /// Only ordinary streamed textures are recorded: volatile content,
    /// pinned textures and UI classes are registered deterministically by
    /// the host at startup and gain nothing from prefetching.
    pub fn shutdown(&mut self) -> Result<()> {
        let entries: Vec<ManifestEntry> = self
            .registry
            .iter()
            .filter(|(_, res)| {
                res.has_gpu_data()
                    && !res.params.volatile
                    && !res.no_evict
                    && res.priority_class < PriorityClass::Ui
            })
            .map(|(key, res)| ManifestEntry {
                id: key.id,
                kind: key.kind,
                // the area of the level we settled on, not the live
                // accumulator: a decayed footprint would seed nothing
                pixel_area: res.pixel_area_at(res.desired_level) as f32,
            })
            .collect();

        info!(count = entries.len(), "saving prefetch manifest");
        manifest::save(
            self.config.manifest_path(),
            entries,
            self.config.manifest_cap,
        )?;
        Ok(())
    }

    /// Zero every statistics counter and footprint accumulator.
    ///
    /// Debug hook for measuring streaming behaviour from a clean slate.
    pub fn force_reset_stats(&mut self) {
        self.ctx.stats.reset();
        for (_, res) in self.registry.iter_mut() {
            res.reset_texture_stats();
        }
    }

    /// Re-dispatch every in-flight fetch. Recovery hook for a wedged
    /// transport.
    pub fn reset_fetching(&mut self) {
        self.fetch.reset_fetching(&mut self.registry, &mut self.ctx);
    }
}

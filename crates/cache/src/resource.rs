//! Texture resource data model
//!
//! Defines the central entity of the streaming cache: a keyed texture
//! resource carrying its discard-level state, fetch state, importance
//! accumulators and pipeline flags. Resources are owned exclusively by the
//! registry; every other component refers to them by key and re-validates
//! liveness before acting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content identifier for a texture (stable across sessions).
pub type TextureId = Uuid;

/// Identifier for a consumer displaying a resource.
///
/// Consumers are never owned by the resource; the id indexes a side table of
/// visibility samples used purely for importance aggregation.
pub type ConsumerId = u64;

/// Coarsest discard level a texture can be reduced to.
///
/// Level 0 is full resolution; each level halves both dimensions.
pub const MAX_DISCARD_LEVEL: u8 = 5;

/// Structural reference count floor: one for the registry, one for the
/// keyed index. A resource at the floor has no live consumers.
pub const STRUCTURAL_REFS: u32 = 2;

/// Upper clamp for the virtual size accumulator (a 4096x4096 footprint).
pub const MAX_VIRTUAL_SIZE: f32 = (4096 * 4096) as f32;

/// Which list a resource belongs to.
///
/// The same content id may exist once per kind, as independent resources
/// (a scaled icon is cached separately from the full texture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ListKind {
    /// Regular streamed texture
    Standard,

    /// Pre-scaled icon/thumbnail variant
    ScaledIcon,
}

/// Priority class, ordered low to high.
///
/// Higher classes are exempt from memory-pressure bias; the top classes are
/// additionally exempt from eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
    /// Default class, fully subject to bias and eviction
    None = 0,

    /// Currently selected object
    Selected = 1,

    /// Preview surfaces (editor panels and the like)
    Preview = 2,

    /// Heavily shared or otherwise important textures; bias exempt
    High = 3,

    /// UI-critical textures; never downgraded or evicted
    Ui = 4,

    /// Explicitly pinned; never evicted
    Pinned = 5,
}

impl PriorityClass {
    /// Classes at or above `High` keep their unbiased footprint under
    /// memory pressure.
    pub fn is_bias_exempt(&self) -> bool {
        *self >= PriorityClass::High
    }

    /// Classes at or above `Ui` are never reclaimed regardless of idle time.
    pub fn is_eviction_exempt(&self) -> bool {
        *self >= PriorityClass::Ui
    }
}

/// Fetch pipeline state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// No fetch has been dispatched yet
    Unrequested,

    /// A fetch/decode is in flight on the external transport
    Pending,

    /// Decoded data has been delivered at least once
    Loaded,

    /// The transport authoritatively reported the asset missing; never retried
    MissingAsset,

    /// The transport reported a terminal error
    Error,
}

/// Registry key: `(id, kind)` uniquely identifies a live resource.
///
/// Ordered so the fetch scheduler can keep a stable cursor across
/// insertions and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureKey {
    /// Content identifier
    pub id: TextureId,

    /// List the resource belongs to
    pub kind: ListKind,
}

impl TextureKey {
    /// Create a new texture key
    pub fn new(id: TextureId, kind: ListKind) -> Self {
        Self { id, kind }
    }
}

/// Raw decoded pixel data (RGBA format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Raw pixel data
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Create a new pixel buffer
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Memory size of the buffer in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Parameters supplied when a resource is first created.
///
/// A repeated `get_or_create` with conflicting parameters is logged and the
/// existing resource returned; the original parameters win.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationParams {
    /// Optional source location (local file or URL)
    pub source_url: Option<String>,

    /// Full-resolution width in pixels
    pub full_width: u32,

    /// Full-resolution height in pixels
    pub full_height: u32,

    /// Coarsest discard level allowed for this resource
    pub max_level: u8,

    /// Write-sensitive/procedural content; excluded from the fast cache
    /// and from the persisted prefetch manifest
    pub volatile: bool,
}

impl Default for CreationParams {
    fn default() -> Self {
        Self {
            source_url: None,
            full_width: 1024,
            full_height: 1024,
            max_level: MAX_DISCARD_LEVEL,
            volatile: false,
        }
    }
}

/// One consumer's visibility report for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilitySample {
    /// Projected on-screen pixel footprint
    pub pixel_area: f32,

    /// View-direction importance in [0, 1]; 1 = dead center
    pub camera_importance: f32,

    /// Consumer is within the near-camera distance threshold
    pub near_camera: bool,

    /// Consumer is inside the view frustum
    pub on_screen: bool,

    /// Smallest texture repeat scale on the surface (atlas compensation)
    pub texture_scale: f32,

    /// Tick the sample was reported on (staleness tracking)
    pub tick: u64,
}

impl Default for VisibilitySample {
    fn default() -> Self {
        Self {
            pixel_area: 0.0,
            camera_importance: 0.0,
            near_camera: false,
            on_screen: false,
            texture_scale: 1.0,
            tick: 0,
        }
    }
}

/// A decoded image staged for GPU creation.
#[derive(Debug, Clone)]
pub struct DecodedLevel {
    /// Decoded pixel data
    pub buffer: PixelBuffer,

    /// Discard level the decode reached (0 = full resolution)
    pub level: u8,
}

/// The central streaming cache entity.
///
/// Owned by the registry; mutated every tick by the importance estimator and
/// the pipeline stages. All level fields follow the discard convention:
/// 0 = full resolution, larger = coarser.
#[derive(Debug)]
pub struct TextureResource {
    /// Registry key
    pub key: TextureKey,

    /// Creation parameters (first-call values win)
    pub params: CreationParams,

    /// Priority class controlling bias and eviction exemption
    pub priority_class: PriorityClass,

    /// Resolution currently resident on the GPU; `None` until first create
    pub current_level: Option<u8>,

    /// Resolution the controller wants resident
    pub desired_level: u8,

    /// Running accumulator of estimated on-screen pixel footprint
    pub virtual_size: f32,

    /// Max footprint across consumers with the global bias applied
    pub biased_vsize: f32,

    /// Max footprint across consumers, never divided by bias
    pub unbiased_vsize: f32,

    /// Fetch pipeline state
    pub fetch_state: FetchState,

    /// Discard level most recently requested from the transport
    pub requested_level: Option<u8>,

    /// Reference count; starts at [`STRUCTURAL_REFS`]
    pub ref_count: u32,

    /// Last time the resource was referenced above the structural floor
    pub last_referenced: Instant,

    /// Weak back-references: consumer id -> latest visibility sample
    pub consumers: HashMap<ConsumerId, VisibilitySample>,

    /// Queued for the one-shot fast cache load
    pub in_fast_cache_queue: bool,

    /// Sitting in the create queue
    pub create_pending: bool,

    /// Sitting in the downscale queue
    pub downscale_pending: bool,

    /// Never evict regardless of idle time
    pub no_evict: bool,

    /// Decoded pixels staged for the create queue
    pub decoded: Option<DecodedLevel>,

    /// Last-good fallback pixels, released on its own idle timeout
    pub last_good: Option<PixelBuffer>,

    /// Last time the fallback buffer was touched
    pub last_good_touched: Instant,

    /// True while the resource is on screen (set by the estimator)
    pub on_screen: bool,
}

impl TextureResource {
    /// Create a new resource at the structural reference floor.
    pub fn new(key: TextureKey, params: CreationParams) -> Self {
        let now = Instant::now();
        let max_level = params.max_level.min(MAX_DISCARD_LEVEL);
        Self {
            key,
            params,
            priority_class: PriorityClass::None,
            current_level: None,
            desired_level: max_level,
            virtual_size: 0.0,
            biased_vsize: 0.0,
            unbiased_vsize: 0.0,
            fetch_state: FetchState::Unrequested,
            requested_level: None,
            ref_count: STRUCTURAL_REFS,
            last_referenced: now,
            consumers: HashMap::new(),
            in_fast_cache_queue: false,
            create_pending: false,
            downscale_pending: false,
            no_evict: false,
            decoded: None,
            last_good: None,
            last_good_touched: now,
            on_screen: false,
        }
    }

    /// Coarsest level this resource may be reduced to.
    pub fn max_level(&self) -> u8 {
        self.params.max_level.min(MAX_DISCARD_LEVEL)
    }

    /// Dimensions of the texture at a given discard level.
    pub fn level_dimensions(&self, level: u8) -> (u32, u32) {
        (
            (self.params.full_width >> level).max(1),
            (self.params.full_height >> level).max(1),
        )
    }

    /// Pixel area of the texture at a given discard level.
    pub fn pixel_area_at(&self, level: u8) -> u64 {
        let (w, h) = self.level_dimensions(level);
        w as u64 * h as u64
    }

    /// Full-resolution pixel area.
    pub fn full_pixel_area(&self) -> u64 {
        self.params.full_width as u64 * self.params.full_height as u64
    }

    /// Accumulate a footprint estimate, keeping the running maximum.
    ///
    /// Clamped to [`MAX_VIRTUAL_SIZE`]; decayed or reset by the discard
    /// controller, not here.
    pub fn add_texture_stats(&mut self, vsize: f32) {
        self.virtual_size = self.virtual_size.max(vsize).min(MAX_VIRTUAL_SIZE);
    }

    /// Reset the footprint accumulator to zero.
    pub fn reset_texture_stats(&mut self) {
        self.virtual_size = 0.0;
    }

    /// Whether any GPU data is resident.
    pub fn has_gpu_data(&self) -> bool {
        self.current_level.is_some()
    }

    /// Whether the resident level already satisfies the desired level.
    ///
    /// A finer (smaller) resident level satisfies any coarser desire.
    pub fn current_satisfies_desired(&self) -> bool {
        matches!(self.current_level, Some(cur) if cur <= self.desired_level)
    }

    /// Improve the resident level. Only ever moves toward full resolution;
    /// a coarser value than what is resident is ignored.
    pub fn promote_level(&mut self, level: u8) {
        match self.current_level {
            Some(cur) if cur <= level => {}
            _ => self.current_level = Some(level),
        }
    }

    /// Degrade the resident level in place. Only ever moves coarser.
    pub fn demote_level(&mut self, level: u8) {
        if let Some(cur) = self.current_level {
            if level > cur {
                self.current_level = Some(level.min(self.max_level()));
            }
        }
    }

    /// Record (or refresh) a consumer's visibility sample.
    pub fn record_sample(&mut self, consumer: ConsumerId, sample: VisibilitySample) {
        self.consumers.insert(consumer, sample);
    }

    /// Drop a consumer's back-reference.
    pub fn remove_consumer(&mut self, consumer: ConsumerId) {
        self.consumers.remove(&consumer);
    }

    /// Number of consumers currently referencing this resource.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Whether the resource sits in any pipeline queue.
    pub fn in_any_queue(&self) -> bool {
        self.in_fast_cache_queue || self.create_pending || self.downscale_pending
    }

    /// Whether the resource is at the structural reference floor
    /// (no live consumers).
    pub fn at_structural_floor(&self) -> bool {
        self.ref_count <= STRUCTURAL_REFS
    }

    /// Reset the liveness timer.
    pub fn touch(&mut self, now: Instant) {
        self.last_referenced = now;
    }

    /// Idle time since the last reference.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_referenced)
    }

    /// Idle time of the last-good fallback buffer.
    pub fn last_good_idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_good_touched)
    }

    /// Store a last-good fallback buffer, refreshing its timer.
    pub fn keep_last_good(&mut self, buffer: PixelBuffer, now: Instant) {
        self.last_good = Some(buffer);
        self.last_good_touched = now;
    }

    /// Whether eviction may reclaim this resource (class and flag check only;
    /// refcount, queues and idle time are the sweeper's business).
    pub fn is_eviction_exempt(&self) -> bool {
        self.no_evict || self.priority_class.is_eviction_exempt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> TextureResource {
        TextureResource::new(
            TextureKey::new(Uuid::new_v4(), ListKind::Standard),
            CreationParams::default(),
        )
    }

    #[test]
    fn test_priority_class_ordering() {
        assert!(PriorityClass::Pinned > PriorityClass::Ui);
        assert!(PriorityClass::Ui > PriorityClass::High);
        assert!(PriorityClass::High > PriorityClass::Preview);
        assert!(PriorityClass::Preview > PriorityClass::Selected);
        assert!(PriorityClass::Selected > PriorityClass::None);
    }

    #[test]
    fn test_priority_class_exemptions() {
        assert!(!PriorityClass::None.is_bias_exempt());
        assert!(!PriorityClass::Preview.is_bias_exempt());
        assert!(PriorityClass::High.is_bias_exempt());
        assert!(PriorityClass::Ui.is_bias_exempt());

        assert!(!PriorityClass::High.is_eviction_exempt());
        assert!(PriorityClass::Ui.is_eviction_exempt());
        assert!(PriorityClass::Pinned.is_eviction_exempt());
    }

    #[test]
    fn test_new_resource_defaults() {
        let r = resource();
        assert_eq!(r.ref_count, STRUCTURAL_REFS);
        assert!(r.at_structural_floor());
        assert_eq!(r.fetch_state, FetchState::Unrequested);
        assert_eq!(r.current_level, None);
        assert_eq!(r.desired_level, r.max_level());
        assert!(!r.has_gpu_data());
        assert!(!r.in_any_queue());
    }

    #[test]
    fn test_level_dimensions() {
        let r = resource();
        assert_eq!(r.level_dimensions(0), (1024, 1024));
        assert_eq!(r.level_dimensions(1), (512, 512));
        assert_eq!(r.level_dimensions(5), (32, 32));
        assert_eq!(r.pixel_area_at(1), 512 * 512);
    }

    #[test]
    fn test_level_dimensions_never_zero() {
        let mut r = resource();
        r.params.full_width = 4;
        r.params.full_height = 4;
        assert_eq!(r.level_dimensions(5), (1, 1));
    }

    #[test]
    fn test_add_texture_stats_keeps_maximum() {
        let mut r = resource();
        r.add_texture_stats(100.0);
        r.add_texture_stats(50.0);
        assert_eq!(r.virtual_size, 100.0);
        r.add_texture_stats(400.0);
        assert_eq!(r.virtual_size, 400.0);
    }

    #[test]
    fn test_add_texture_stats_clamped() {
        let mut r = resource();
        r.add_texture_stats(MAX_VIRTUAL_SIZE * 10.0);
        assert_eq!(r.virtual_size, MAX_VIRTUAL_SIZE);
    }

    #[test]
    fn test_promote_level_only_improves() {
        let mut r = resource();
        r.promote_level(3);
        assert_eq!(r.current_level, Some(3));
        r.promote_level(1);
        assert_eq!(r.current_level, Some(1));
        // coarser promote is ignored
        r.promote_level(4);
        assert_eq!(r.current_level, Some(1));
    }

    #[test]
    fn test_demote_level_only_degrades() {
        let mut r = resource();
        // no GPU data: demote is a no-op
        r.demote_level(3);
        assert_eq!(r.current_level, None);

        r.promote_level(1);
        r.demote_level(3);
        assert_eq!(r.current_level, Some(3));
        r.demote_level(2);
        assert_eq!(r.current_level, Some(3));
    }

    #[test]
    fn test_current_satisfies_desired() {
        let mut r = resource();
        r.desired_level = 2;
        assert!(!r.current_satisfies_desired());
        r.promote_level(3);
        assert!(!r.current_satisfies_desired());
        r.promote_level(2);
        assert!(r.current_satisfies_desired());
        r.promote_level(0);
        assert!(r.current_satisfies_desired());
    }

    #[test]
    fn test_consumer_samples() {
        let mut r = resource();
        r.record_sample(1, VisibilitySample::default());
        r.record_sample(
            2,
            VisibilitySample {
                pixel_area: 400.0,
                ..Default::default()
            },
        );
        assert_eq!(r.consumer_count(), 2);

        // re-recording replaces, not duplicates
        r.record_sample(1, VisibilitySample::default());
        assert_eq!(r.consumer_count(), 2);

        r.remove_consumer(1);
        assert_eq!(r.consumer_count(), 1);
    }

    #[test]
    fn test_idle_tracking() {
        let mut r = resource();
        let later = Instant::now() + Duration::from_secs(40);
        assert!(r.idle_for(later) >= Duration::from_secs(39));
        r.touch(later);
        assert_eq!(r.idle_for(later), Duration::ZERO);
    }

    #[test]
    fn test_last_good_buffer() {
        let mut r = resource();
        let now = Instant::now();
        r.keep_last_good(PixelBuffer::new(32, 32, vec![0u8; 32 * 32 * 4]), now);
        assert!(r.last_good.is_some());
        let later = now + Duration::from_secs(90);
        assert!(r.last_good_idle_for(later) >= Duration::from_secs(89));
    }

    #[test]
    fn test_max_level_clamped_to_global_max() {
        let mut params = CreationParams::default();
        params.max_level = 40;
        let r = TextureResource::new(
            TextureKey::new(Uuid::new_v4(), ListKind::ScaledIcon),
            params,
        );
        assert_eq!(r.max_level(), MAX_DISCARD_LEVEL);
    }
}

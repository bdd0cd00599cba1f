//! Texture Streamer Cache Library
//!
//! Resource model and persistent stores for the texture streaming cache.
//!
//! This crate provides:
//! - The texture resource model ([`TextureResource`], [`TextureKey`],
//!   priority classes, fetch states and visibility samples)
//! - The key-ordered [`TextureRegistry`], the single owning store that the
//!   streaming pipeline sweeps with a resumable cursor
//! - The on-disk [`FastCacheStore`] of tiny low-resolution texture heads
//!   used to put something on screen before the fetch pipeline warms up
//! - The persisted prefetch [`manifest`] that seeds next session's registry
//! - The [`StreamerConfig`] tying the tuning knobs together
//!
//! # Example
//!
//! ```
//! use texture_streamer_cache::{
//!     CreationParams, ListKind, TextureKey, TextureRegistry,
//! };
//! use uuid::Uuid;
//!
//! let mut registry = TextureRegistry::new();
//! let key = TextureKey::new(Uuid::new_v4(), ListKind::Standard);
//!
//! let (resource, created) = registry.get_or_create(key, CreationParams::default());
//! assert!(created);
//! resource.add_texture_stats(512.0 * 512.0);
//! ```

pub mod config;
pub mod fast_cache;
pub mod manifest;
pub mod registry;
pub mod resource;

// Re-export public API
pub use config::{ConfigError, StreamerConfig};
pub use fast_cache::{FastCacheEntry, FastCacheStats, FastCacheStore, FAST_CACHE_MAX_DIM};
pub use manifest::ManifestEntry;
pub use registry::TextureRegistry;
pub use resource::{
    ConsumerId, CreationParams, DecodedLevel, FetchState, ListKind, PixelBuffer, PriorityClass,
    TextureId, TextureKey, TextureResource, VisibilitySample, MAX_DISCARD_LEVEL,
    MAX_VIRTUAL_SIZE, STRUCTURAL_REFS,
};

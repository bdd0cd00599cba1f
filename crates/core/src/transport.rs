//! External seams of the streaming pipeline.
//!
//! The streamer never performs network, decode or GPU work itself. Fetching
//! goes out through [`FetchTransport`] and results come back asynchronously
//! over a channel as [`Delivery`] values; GPU residency changes go through
//! [`GpuUploader`]. Both traits are object-safe so the host application can
//! plug in its own backends.

use texture_streamer_cache::{DecodedLevel, PixelBuffer, TextureKey};

use crate::error::Result;

/// A fetch-and-decode request handed to the transport.
///
/// Carries the dimensions the decode should reach so the transport never
/// needs to consult the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Resource the data is for
    pub key: TextureKey,

    /// Discard level the decode should reach (0 = full resolution)
    pub level: u8,

    /// Expected width at that level
    pub width: u32,

    /// Expected height at that level
    pub height: u32,

    /// Optional source location
    pub source_url: Option<String>,
}

/// Terminal outcome of one fetch request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Decode succeeded
    Decoded(DecodedLevel),

    /// The asset authoritatively does not exist; never retried
    Missing,

    /// The fetch or decode failed
    Failed(String),
}

/// One asynchronous result delivered back to the streaming thread.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Resource the result is for
    pub key: TextureKey,

    /// What happened
    pub outcome: FetchOutcome,
}

/// Asynchronous fetch-and-decode backend.
///
/// `dispatch` must not block; results are sent back over the delivery
/// channel whenever they complete, possibly many ticks later and in any
/// order.
pub trait FetchTransport {
    /// Queue a fetch. An `Err` means the request was never accepted and the
    /// resource stays unrequested.
    fn dispatch(&mut self, request: FetchRequest) -> Result<()>;
}

/// GPU residency backend.
pub trait GpuUploader {
    /// Create or replace the resident texture with `buffer` at `level`.
    fn upload(&mut self, key: TextureKey, buffer: &PixelBuffer, level: u8) -> Result<()>;

    /// Reduce the resident texture from `from_level` to the coarser
    /// `to_level` in place, without refetching.
    fn downscale(&mut self, key: TextureKey, from_level: u8, to_level: u8) -> Result<()>;

    /// Release all GPU data for the resource. Must tolerate keys that were
    /// never uploaded.
    fn release(&mut self, key: TextureKey);

    /// Current GPU bytes in use; drives the global discard bias.
    fn used_bytes(&self) -> usize;
}

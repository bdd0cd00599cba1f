//! Texture Streamer Core Library
//!
//! The streaming pipeline: importance estimation, discard level control,
//! fetch scheduling, GPU creation, in-place downscaling, fast cache loading
//! and eviction, all driven from a single owning thread by
//! [`TextureStreamer::tick`] under a wall-clock budget.
//!
//! Fetching, decoding and GPU work are behind the [`FetchTransport`] and
//! [`GpuUploader`] traits; the host application supplies both and feeds
//! decode results back over a channel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::mpsc;
//! use texture_streamer_cache::{CreationParams, ListKind, StreamerConfig, VisibilitySample};
//! use texture_streamer_core::{FetchRequest, FetchTransport, TextureStreamer};
//! use texture_streamer_scheduler::TickBudget;
//! use uuid::Uuid;
//!
//! # struct MyTransport;
//! # impl FetchTransport for MyTransport {
//! #     fn dispatch(&mut self, _r: FetchRequest) -> texture_streamer_core::Result<()> { Ok(()) }
//! # }
//! # struct MyGpu;
//! # impl texture_streamer_core::GpuUploader for MyGpu {
//! #     fn upload(&mut self, _k: texture_streamer_cache::TextureKey, _b: &texture_streamer_cache::PixelBuffer, _l: u8) -> texture_streamer_core::Result<()> { Ok(()) }
//! #     fn downscale(&mut self, _k: texture_streamer_cache::TextureKey, _f: u8, _t: u8) -> texture_streamer_core::Result<()> { Ok(()) }
//! #     fn release(&mut self, _k: texture_streamer_cache::TextureKey) {}
//! #     fn used_bytes(&self) -> usize { 0 }
//! # }
//! let (tx, rx) = mpsc::channel();
//! # let _ = &tx;
//! let mut streamer = TextureStreamer::new(
//!     StreamerConfig::default(),
//!     Box::new(MyTransport),
//!     Box::new(MyGpu),
//!     rx,
//! )?;
//!
//! let key = streamer.request(Uuid::new_v4(), ListKind::Standard, CreationParams::default());
//! streamer.report_visibility(key, 1, VisibilitySample {
//!     pixel_area: 256.0 * 256.0,
//!     on_screen: true,
//!     ..Default::default()
//! });
//!
//! // once per frame
//! streamer.tick(TickBudget::default());
//! # Ok::<(), texture_streamer_core::StreamError>(())
//! ```

pub mod create;
pub mod discard;
pub mod downscale;
pub mod error;
pub mod evict;
pub mod fast_cache;
pub mod fetch;
pub mod importance;
pub mod streamer;
pub mod transport;

// Re-export public API
pub use create::CreateQueue;
pub use downscale::DownscaleQueue;
pub use error::{Result, StreamError};
pub use evict::EvictionSweeper;
pub use fast_cache::FastCacheLoader;
pub use fetch::FetchScheduler;
pub use importance::ImportanceVerdict;
pub use streamer::TextureStreamer;
pub use transport::{Delivery, FetchOutcome, FetchRequest, FetchTransport, GpuUploader};

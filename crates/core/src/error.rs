//! Error types for the streaming pipeline.

use std::io;

use texture_streamer_cache::{ConfigError, TextureId};
use thiserror::Error;

/// Errors surfaced by the streaming pipeline.
///
/// Per-texture fetch failures are not errors; they are recorded on the
/// resource's fetch state and the pipeline moves on. These variants cover
/// failures of the machinery itself.
#[derive(Debug, Error)]
pub enum StreamError {
    /// I/O failure in the fast cache or manifest
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The fetch transport refused a dispatch
    #[error("transport error: {0}")]
    Transport(String),

    /// A GPU operation failed
    #[error("gpu operation failed for {id}: {reason}")]
    Gpu {
        /// Texture the operation was for
        id: TextureId,
        /// Backend-supplied failure description
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, StreamError>;

//! Persistent fast cache holding tiny low-resolution texture heads.
//!
//! Each entry is the coarse head of a texture (at most 16x16 RGBA), enough
//! to put *something* on screen immediately at startup while the real fetch
//! pipeline warms up. Entries are content-addressed by texture id, one file
//! per entry, with a small fixed header carrying dimensions and the discard
//! level the pixels correspond to.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::resource::{PixelBuffer, TextureId};

/// Largest dimension a fast cache entry may have.
pub const FAST_CACHE_MAX_DIM: u32 = 16;

/// Header size: width (4) + height (4) + level (1)
const HEADER_SIZE: usize = 9;

/// Statistics for monitoring fast cache performance
#[derive(Debug, Clone, Default)]
pub struct FastCacheStats {
    /// Number of successful loads
    pub hits: u64,
    /// Number of lookups that found nothing
    pub misses: u64,
    /// Entries dropped because the file was corrupt
    pub corrupt_dropped: u64,
    /// Total number of entries on disk
    pub entry_count: usize,
}

impl FastCacheStats {
    /// Calculate cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A fast cache entry: low-resolution pixels plus the discard level they
/// were saved at.
#[derive(Debug, Clone)]
pub struct FastCacheEntry {
    /// Decoded pixel data
    pub buffer: PixelBuffer,
    /// Discard level of the stored pixels
    pub level: u8,
}

/// On-disk store of low-resolution texture heads.
///
/// Owned by the streaming thread; no internal locking. The index is built
/// once by scanning the directory at startup, then kept in step with every
/// put and remove.
pub struct FastCacheStore {
    cache_dir: PathBuf,
    entries: HashMap<TextureId, PathBuf>,
    stats: FastCacheStats,
}

impl FastCacheStore {
    /// Open (or create) a fast cache rooted at `cache_dir`.
    ///
    /// Scans the directory and indexes every existing entry.
    pub fn open<P: AsRef<Path>>(cache_dir: P) -> io::Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        let mut entries = HashMap::new();
        for dir_entry in fs::read_dir(&cache_dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tex") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<TextureId>().ok())
            {
                entries.insert(id, path);
            }
        }

        debug!(count = entries.len(), dir = %cache_dir.display(), "fast cache opened");

        let entry_count = entries.len();
        Ok(Self {
            cache_dir,
            entries,
            stats: FastCacheStats {
                entry_count,
                ..Default::default()
            },
        })
    }

    fn id_to_path(cache_dir: &Path, id: TextureId) -> PathBuf {
        cache_dir.join(format!("{}.tex", id.simple()))
    }

    /// Number of entries on disk
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry exists for the id
    pub fn contains(&self, id: TextureId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Session statistics
    pub fn stats(&self) -> FastCacheStats {
        FastCacheStats {
            entry_count: self.entries.len(),
            ..self.stats.clone()
        }
    }

    /// Store a texture head. Replaces any existing entry for the id.
    ///
    /// Returns `InvalidInput` if the buffer exceeds [`FAST_CACHE_MAX_DIM`]
    /// in either dimension; callers downsample before storing.
    pub fn put(&mut self, id: TextureId, buffer: &PixelBuffer, level: u8) -> io::Result<()> {
        if buffer.width > FAST_CACHE_MAX_DIM || buffer.height > FAST_CACHE_MAX_DIM {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "fast cache entry {}x{} exceeds {}x{}",
                    buffer.width, buffer.height, FAST_CACHE_MAX_DIM, FAST_CACHE_MAX_DIM
                ),
            ));
        }

        let path = Self::id_to_path(&self.cache_dir, id);
        let mut file = File::create(&path)?;

        // Header: width (4 bytes) + height (4 bytes) + level (1 byte)
        file.write_all(&buffer.width.to_le_bytes())?;
        file.write_all(&buffer.height.to_le_bytes())?;
        file.write_all(&[level])?;
        file.write_all(&buffer.pixels)?;
        file.sync_all()?;

        self.entries.insert(id, path);
        Ok(())
    }

    /// Load a texture head, if one is stored.
    ///
    /// A corrupt entry (short header or truncated pixels) is deleted and
    /// treated as a miss rather than an error.
    pub fn get(&mut self, id: TextureId) -> io::Result<Option<FastCacheEntry>> {
        let Some(path) = self.entries.get(&id).cloned() else {
            self.stats.misses += 1;
            return Ok(None);
        };

        match Self::read_entry(&path) {
            Ok(Some(entry)) => {
                self.stats.hits += 1;
                Ok(Some(entry))
            }
            Ok(None) => {
                warn!(id = %id, path = %path.display(), "corrupt fast cache entry, dropping");
                self.entries.remove(&id);
                let _ = fs::remove_file(&path);
                self.stats.corrupt_dropped += 1;
                self.stats.misses += 1;
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // deleted out from under us; treat as a miss
                self.entries.remove(&id);
                self.stats.misses += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Read and validate one entry file. `Ok(None)` means corrupt.
    fn read_entry(path: &Path) -> io::Result<Option<FastCacheEntry>> {
        let mut file = File::open(path)?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;

        if raw.len() < HEADER_SIZE {
            return Ok(None);
        }

        let width = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let height = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let level = raw[8];

        if width == 0
            || height == 0
            || width > FAST_CACHE_MAX_DIM
            || height > FAST_CACHE_MAX_DIM
            || raw.len() - HEADER_SIZE != (width * height * 4) as usize
        {
            return Ok(None);
        }

        let pixels = raw[HEADER_SIZE..].to_vec();
        Ok(Some(FastCacheEntry {
            buffer: PixelBuffer::new(width, height, pixels),
            level,
        }))
    }

    /// Remove an entry, ignoring a missing file.
    pub fn remove(&mut self, id: TextureId) -> io::Result<()> {
        if let Some(path) = self.entries.remove(&id) {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

//! Persisted prefetch manifest.
//!
//! At shutdown the streamer writes out the identities of the textures most
//! worth having warm next session, sorted by on-screen pixel footprint and
//! capped. At startup the manifest seeds the registry so fetching begins
//! before any consumer reports visibility. A manifest that fails to parse is
//! deleted and ignored; it is an optimization, never a source of truth.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resource::{ListKind, TextureId};

/// One manifest record: enough to recreate a resource and give it an
/// initial footprint estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Content identifier
    pub id: TextureId,

    /// List the resource belonged to
    pub kind: ListKind,

    /// Pixel footprint at shutdown, used as the initial estimate
    pub pixel_area: f32,
}

/// Write entries to `path`, sorted by descending footprint and capped
/// at `cap` records.
pub fn save<P: AsRef<Path>>(path: P, mut entries: Vec<ManifestEntry>, cap: usize) -> io::Result<()> {
    entries.sort_by(|a, b| {
        b.pixel_area
            .partial_cmp(&a.pixel_area)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries.truncate(cap);

    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&entries)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path.as_ref(), json)?;

    debug!(count = entries.len(), path = %path.as_ref().display(), "manifest saved");
    Ok(())
}

/// Load the manifest at `path`.
///
/// A missing file yields an empty list. A corrupt file is deleted and also
/// yields an empty list; only genuine I/O failures surface as errors.
pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    match serde_json::from_str::<Vec<ManifestEntry>>(&contents) {
        Ok(entries) => {
            debug!(count = entries.len(), path = %path.display(), "manifest loaded");
            Ok(entries)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt manifest, deleting");
            let _ = fs::remove_file(path);
            Ok(Vec::new())
        }
    }
}

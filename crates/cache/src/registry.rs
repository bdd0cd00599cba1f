//! Texture registry: the single owning store for all live resources
//!
//! Keeps every [`TextureResource`] in a key-ordered map so the fetch
//! scheduler can sweep it with a stable resumable cursor. The registry is
//! owned by one thread; all other components address resources by key and
//! re-validate through the registry before touching them.

use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::{debug, warn};

use crate::resource::{CreationParams, TextureKey, TextureResource};

/// Key-ordered store of live texture resources.
///
/// Insertion is idempotent per key: repeated `get_or_create` calls return
/// the existing resource, logging if the caller supplied conflicting
/// creation parameters (the original parameters win).
#[derive(Debug, Default)]
pub struct TextureRegistry {
    resources: BTreeMap<TextureKey, TextureResource>,
}

impl TextureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
        }
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Whether a resource exists for the key
    pub fn contains(&self, key: &TextureKey) -> bool {
        self.resources.contains_key(key)
    }

    /// Look up a resource
    pub fn get(&self, key: &TextureKey) -> Option<&TextureResource> {
        self.resources.get(key)
    }

    /// Look up a resource mutably
    pub fn get_mut(&mut self, key: &TextureKey) -> Option<&mut TextureResource> {
        self.resources.get_mut(key)
    }

    /// Fetch the resource for `key`, creating it if absent.
    ///
    /// Returns the resource and whether it was created by this call. If the
    /// key already exists with different creation parameters the mismatch is
    /// logged and the existing resource returned unchanged.
    pub fn get_or_create(
        &mut self,
        key: TextureKey,
        params: CreationParams,
    ) -> (&mut TextureResource, bool) {
        match self.resources.entry(key) {
            std::collections::btree_map::Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                if existing.params != params {
                    warn!(
                        id = %key.id,
                        kind = ?key.kind,
                        "get_or_create with conflicting parameters; keeping originals"
                    );
                }
                (existing, false)
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                debug!(id = %key.id, kind = ?key.kind, "registering texture");
                (entry.insert(TextureResource::new(key, params)), true)
            }
        }
    }

    /// Remove a resource, returning it if present
    pub fn remove(&mut self, key: &TextureKey) -> Option<TextureResource> {
        let removed = self.resources.remove(key);
        if removed.is_some() {
            debug!(id = %key.id, kind = ?key.kind, "removed texture");
        }
        removed
    }

    /// Smallest key in the registry (sweep start position)
    pub fn first_key(&self) -> Option<TextureKey> {
        self.resources.keys().next().copied()
    }

    /// Next key strictly after `key` in order, or `None` at the end.
    ///
    /// Safe to call with a key that has since been removed; the cursor
    /// lands on the nearest surviving successor.
    pub fn next_key_after(&self, key: &TextureKey) -> Option<TextureKey> {
        self.resources
            .range((Bound::Excluded(*key), Bound::Unbounded))
            .next()
            .map(|(k, _)| *k)
    }

    /// Iterate over all resources in key order
    pub fn iter(&self) -> impl Iterator<Item = (&TextureKey, &TextureResource)> {
        self.resources.iter()
    }

    /// Iterate mutably over all resources in key order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&TextureKey, &mut TextureResource)> {
        self.resources.iter_mut()
    }

    /// All keys in order (snapshot)
    pub fn keys(&self) -> Vec<TextureKey> {
        self.resources.keys().copied().collect()
    }
}

//! Weak association from costume LODs to GPU resources.
//!
//! The cache never keeps a LOD alive: entries hold a [`Weak`] back-reference
//! keyed by the LOD's id, and `prune` drops resources whose LOD has been
//! released. Generic over the resource so the policy tests without a device.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::model::costume::CostumeLod;

pub(crate) struct LodCache<T> {
    entries: HashMap<u64, (Weak<CostumeLod>, T)>,
}

impl<T> LodCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, lod: &Arc<CostumeLod>) -> Option<&T> {
        self.entries.get(&lod.id()).map(|(_, value)| value)
    }

    pub(crate) fn insert(&mut self, lod: &Arc<CostumeLod>, value: T) {
        self.entries
            .insert(lod.id(), (Arc::downgrade(lod), value));
    }

    /// Drop entries whose LOD is gone; returns how many were released.
    pub(crate) fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (weak, _)| weak.strong_count() > 0);
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/texture_cache.rs"]
mod tests;

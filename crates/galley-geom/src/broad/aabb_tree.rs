// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use crate::types::aabb::Aabb;
use std::collections::BTreeMap;

/// Broad-phase interface for registering boxes and probing for overlaps.
///
/// Implementations must return results deterministically: probes return ids
/// in ascending order.
pub trait BroadPhase {
    /// Inserts or updates the proxy with the given `id` and `aabb`.
    fn upsert(&mut self, id: usize, aabb: Aabb);
    /// Returns the ids of proxies overlapping `probe`, ascending.
    fn query(&self, probe: &Aabb) -> Vec<usize>;
}

/// AABB store with an `O(n)` probe.
///
/// Scenes hold tens of objects, so a linear scan is sufficient for
/// placement rejection.
#[derive(Debug, Default, Clone)]
pub struct AabbTree {
    items: BTreeMap<usize, Aabb>,
}

impl AabbTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    /// Number of stored proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when no proxies are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl BroadPhase for AabbTree {
    fn upsert(&mut self, id: usize, aabb: Aabb) {
        self.items.insert(id, aabb);
    }

    fn query(&self, probe: &Aabb) -> Vec<usize> {
        self.items
            .iter()
            .filter(|(_, bb)| bb.overlaps(probe))
            .map(|(id, _)| *id)
            .collect()
    }
}

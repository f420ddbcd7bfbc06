//! Document-wide registry for Global-mode bindings.

use super::node::NodeId;
use std::collections::HashMap;

/// Maps a name hash to the Data node every Global-mode Template node of that
/// name binds to.
///
/// The first registration for a hash wins for the lifetime of the registry;
/// only a full re-merge clears it.
#[derive(Debug, Clone, Default)]
pub struct GlobalBindingRegistry {
    entries: HashMap<u32, NodeId>,
}

impl GlobalBindingRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data node registered under `hash`.
    pub fn lookup(&self, hash: u32) -> Option<NodeId> {
        self.entries.get(&hash).copied()
    }

    /// Register `data` under `hash` unless the hash is already taken.
    ///
    /// Returns true when the entry was inserted.
    pub fn register(&mut self, hash: u32, data: NodeId) -> bool {
        match self.entries.entry(hash) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(data);
                true
            },
        }
    }

    /// Drop every entry pointing at `data`, returning how many were removed.
    ///
    /// Called when `data` leaves the Data tree so no later lookup hands it out.
    pub fn forget(&mut self, data: NodeId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, node| *node != data);
        before - self.entries.len()
    }

    /// Forget every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered hashes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

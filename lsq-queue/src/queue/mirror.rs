//! Player playlist side table
//!
//! Records which queue entry occupies each slot of the player's playlist.
//! Rebuilt on every full reconciliation and patched on single-slot inserts
//! and removals, so it always mirrors what was pushed to the player.

use lsq_common::{CatalogId, QueueItem};
use uuid::Uuid;

/// Queue entry pushed into one player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorSlot {
    pub instance_id: Uuid,
    pub catalog_id: CatalogId,
}

impl From<&QueueItem> for MirrorSlot {
    fn from(item: &QueueItem) -> Self {
        Self {
            instance_id: item.instance_id,
            catalog_id: item.catalog_id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistMirror {
    slots: Vec<MirrorSlot>,
}

impl PlaylistMirror {
    /// Replace the table with a freshly pushed playlist
    pub fn rebuild(&mut self, items: &[QueueItem]) {
        self.slots = items.iter().map(MirrorSlot::from).collect();
    }

    /// Record a single insert; indices past the end append
    pub fn insert(&mut self, index: usize, item: &QueueItem) -> usize {
        let index = index.min(self.slots.len());
        self.slots.insert(index, MirrorSlot::from(item));
        index
    }

    /// Drop the slot holding `instance_id`, returning its index
    pub fn remove(&mut self, instance_id: Uuid) -> Option<usize> {
        let index = self.position_of(instance_id)?;
        self.slots.remove(index);
        Some(index)
    }

    pub fn position_of(&self, instance_id: Uuid) -> Option<usize> {
        self.slots.iter().position(|slot| slot.instance_id == instance_id)
    }

    pub fn get(&self, index: usize) -> Option<MirrorSlot> {
        self.slots.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

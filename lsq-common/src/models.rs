//! Queue and catalog data models
//!
//! Value types shared between the queue manager, the sub-track tracker and
//! the external collaborators (catalog lookup, manual queue store, player).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque numeric catalog identifier
pub type CatalogId = i64;

/// One entry of an item's embedded tracklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTrack {
    /// Catalog id of the labelled track, when the tracklist links one
    #[serde(default)]
    pub id: Option<i64>,

    /// Offset from the start of the parent item, in seconds.
    /// Entries without a timestamp are not placeable and are skipped.
    #[serde(default)]
    pub timestamp_secs: Option<f64>,

    pub title: String,

    #[serde(default)]
    pub artist: Option<String>,
}

impl SubTrack {
    /// Offset in milliseconds, if the entry carries a timestamp
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.timestamp_secs.map(|s| (s * 1000.0).round() as i64)
    }
}

/// Result of a catalog lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub catalog_id: CatalogId,

    /// Stream URL. None means the item has no playable source.
    #[serde(default)]
    pub url: Option<String>,

    /// Collection this item belongs to (album, show, series)
    #[serde(default)]
    pub parent_id: Option<CatalogId>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// Embedded tracklist (may be empty, may be unsorted)
    #[serde(default)]
    pub tracks: Vec<SubTrack>,
}

impl PlayableItem {
    /// Build the reference handed to the player, or None for a lookup-miss
    pub fn playable_ref(&self) -> Option<PlayableRef> {
        let url = self.url.as_ref()?;
        Some(PlayableRef {
            media_id: self.catalog_id.to_string(),
            url: url.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            duration_ms: self.duration_ms,
        })
    }
}

/// Media reference as understood by the external player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableRef {
    /// Decimal catalog id of the item
    pub media_id: String,
    pub url: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_ms: Option<u64>,
}

impl PlayableRef {
    /// Catalog identity encoded in `media_id`, or None if it does not parse
    pub fn catalog_id(&self) -> Option<CatalogId> {
        self.media_id.parse().ok()
    }
}

/// One entry of either queue lane
///
/// `instance_id` is minted per resolution and is the only identity used to
/// correlate an entry with a player playlist slot; `catalog_id` may repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub catalog_id: CatalogId,
    pub playable: PlayableRef,
    /// Persisted manual entry id (None for context entries)
    pub manual_entry_id: Option<i64>,
    pub instance_id: Uuid,
}

impl QueueItem {
    /// Create an entry with a fresh instance identity
    pub fn new(catalog_id: CatalogId, playable: PlayableRef, manual_entry_id: Option<i64>) -> Self {
        Self {
            catalog_id,
            playable,
            manual_entry_id,
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn is_manual(&self) -> bool {
        self.manual_entry_id.is_some()
    }
}

/// Persisted manual queue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualQueueEntry {
    pub id: i64,
    pub catalog_id: CatalogId,
    /// Sparse sort key; appends use `max + 1`
    pub order_index: f64,
    pub added_at: DateTime<Utc>,
}

impl ManualQueueEntry {
    /// Sort key for an entry appended after `entries`
    pub fn next_order_index<'a>(entries: impl IntoIterator<Item = &'a ManualQueueEntry>) -> f64 {
        entries
            .into_iter()
            .map(|e| e.order_index)
            .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
            .map_or(0.0, |max| max + 1.0)
    }
}

/// Published queue snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub manual: Vec<QueueItem>,
    pub context: Vec<QueueItem>,
    pub effective: Vec<QueueItem>,
    pub current_effective_index: usize,
    pub current_catalog_id: Option<CatalogId>,
    pub is_playing: bool,
}

impl QueueState {
    /// Entry at the current effective index
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.effective.get(self.current_effective_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, order_index: f64) -> ManualQueueEntry {
        ManualQueueEntry {
            id,
            catalog_id: id * 100,
            order_index,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_order_index_empty() {
        assert_eq!(ManualQueueEntry::next_order_index(&[]), 0.0);
    }

    #[test]
    fn test_next_order_index_uses_max_not_last() {
        let entries = vec![entry(1, 4.0), entry(2, 9.5), entry(3, 2.0)];
        assert_eq!(ManualQueueEntry::next_order_index(&entries), 10.5);
    }

    #[test]
    fn test_next_order_index_negative_keys() {
        let entries = vec![entry(1, -3.0), entry(2, -7.0)];
        assert_eq!(ManualQueueEntry::next_order_index(&entries), -2.0);
    }

    #[test]
    fn test_playable_ref_requires_url() {
        let mut item = PlayableItem {
            catalog_id: 42,
            url: None,
            parent_id: Some(7),
            title: Some("Boiler Room".to_string()),
            artist: Some("Someone".to_string()),
            duration_ms: Some(3_600_000),
            tracks: Vec::new(),
        };
        assert!(item.playable_ref().is_none());

        item.url = Some("https://cdn.example/42.mp3".to_string());
        let playable = item.playable_ref().unwrap();
        assert_eq!(playable.media_id, "42");
        assert_eq!(playable.catalog_id(), Some(42));
        assert_eq!(playable.title.as_deref(), Some("Boiler Room"));
    }

    #[test]
    fn test_catalog_id_unparseable_media_id() {
        let playable = PlayableRef {
            media_id: "local:file.mp3".to_string(),
            url: "file:///tmp/file.mp3".to_string(),
            title: None,
            artist: None,
            duration_ms: None,
        };
        assert_eq!(playable.catalog_id(), None);
    }

    #[test]
    fn test_sub_track_timestamp_ms() {
        let track = SubTrack {
            id: None,
            timestamp_secs: Some(90.0),
            title: "Intro".to_string(),
            artist: None,
        };
        assert_eq!(track.timestamp_ms(), Some(90_000));

        let untimed = SubTrack { timestamp_secs: None, ..track };
        assert_eq!(untimed.timestamp_ms(), None);
    }

    #[test]
    fn test_queue_items_get_distinct_instance_ids() {
        let playable = PlayableRef {
            media_id: "1".to_string(),
            url: "u".to_string(),
            title: None,
            artist: None,
            duration_ms: None,
        };
        let a = QueueItem::new(1, playable.clone(), None);
        let b = QueueItem::new(1, playable, Some(5));
        assert_ne!(a.instance_id, b.instance_id);
        assert!(!a.is_manual());
        assert!(b.is_manual());
    }

    #[test]
    fn test_queue_state_current_item_empty() {
        let state = QueueState::default();
        assert!(state.current_item().is_none());
        assert_eq!(state.current_effective_index, 0);
    }
}

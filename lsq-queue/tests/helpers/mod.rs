//! Shared fixtures for lsq-queue integration tests
//!
//! Catalog builders, an in-memory manual queue store, a recording observer
//! and a queue harness wired to the simulated player.

#![allow(dead_code)]

use async_trait::async_trait;
use lsq_common::events::EventBus;
use lsq_common::{CatalogId, ManualQueueEntry, PlayableItem, QueueItem, SubTrack};
use lsq_queue::catalog::{CatalogLookup, InMemoryCatalog};
use lsq_queue::db::ManualQueueStore;
use lsq_queue::player::{PlayerEvent, PlayerHandle, SimulatedPlayer};
use lsq_queue::{LivesetObserver, QueueManager, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

pub const ITEM_DURATION_MS: u64 = 60_000;

/// Playable item with a stream URL
pub fn playable(catalog_id: CatalogId, parent_id: Option<CatalogId>) -> PlayableItem {
    PlayableItem {
        catalog_id,
        url: Some(format!("https://cdn.example/{}.mp3", catalog_id)),
        parent_id,
        title: Some(format!("Item {}", catalog_id)),
        artist: Some("Test Artist".to_string()),
        duration_ms: Some(ITEM_DURATION_MS),
        tracks: Vec::new(),
    }
}

/// Catalog entry without a stream URL (lookup-miss)
pub fn unplayable(catalog_id: CatalogId) -> PlayableItem {
    PlayableItem {
        url: None,
        ..playable(catalog_id, None)
    }
}

/// Liveset with a tracklist of `(seconds, id, title)` entries
pub fn liveset(
    catalog_id: CatalogId,
    duration_ms: u64,
    tracks: &[(Option<f64>, Option<i64>, &str)],
) -> PlayableItem {
    PlayableItem {
        title: Some(format!("Liveset {}", catalog_id)),
        artist: Some("Resident DJ".to_string()),
        duration_ms: Some(duration_ms),
        tracks: tracks
            .iter()
            .map(|(secs, id, title)| SubTrack {
                id: *id,
                timestamp_secs: *secs,
                title: title.to_string(),
                artist: Some(format!("{} Artist", title)),
            })
            .collect(),
        ..playable(catalog_id, None)
    }
}

pub fn catalog_ids(items: &[QueueItem]) -> Vec<CatalogId> {
    items.iter().map(|item| item.catalog_id).collect()
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Manual queue store kept in memory
#[derive(Default)]
pub struct MemoryManualQueueStore {
    entries: Mutex<Vec<ManualQueueEntry>>,
}

impl MemoryManualQueueStore {
    pub fn with_entries(entries: Vec<ManualQueueEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Stored entries ordered by `order_index`
    pub fn entries(&self) -> Vec<ManualQueueEntry> {
        let mut entries = self.entries.lock().unwrap().clone();
        entries.sort_by(|a, b| a.order_index.total_cmp(&b.order_index));
        entries
    }
}

#[async_trait]
impl ManualQueueStore for MemoryManualQueueStore {
    async fn load_all(&self) -> Result<Vec<ManualQueueEntry>> {
        Ok(self.entries())
    }

    async fn upsert(&self, entry: &ManualQueueEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.id != entry.id);
        entries.push(entry.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        self.entries.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// Catalog that answers some ids only after a delay
pub struct DelayedCatalog {
    inner: InMemoryCatalog,
    delays: HashMap<CatalogId, Duration>,
}

impl DelayedCatalog {
    pub fn new(inner: InMemoryCatalog, delays: HashMap<CatalogId, Duration>) -> Self {
        Self { inner, delays }
    }
}

#[async_trait]
impl CatalogLookup for DelayedCatalog {
    async fn find(&self, catalog_id: CatalogId) -> Result<Option<PlayableItem>> {
        if let Some(delay) = self.delays.get(&catalog_id) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.find(catalog_id).await
    }

    async fn children(&self, parent_id: CatalogId) -> Result<Vec<CatalogId>> {
        self.inner.children(parent_id).await
    }
}

/// One observer callback, reduced to comparable values
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverCall {
    Liveset(Option<CatalogId>),
    SubTrack(Option<String>),
    PrevNext(bool, bool),
    Progress(Option<u64>),
}

#[derive(Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<ObserverCall>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<ObserverCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than position progress
    pub fn changes(&self) -> Vec<ObserverCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, ObserverCall::Progress(_)))
            .collect()
    }

    pub fn progress_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ObserverCall::Progress(_)))
            .count()
    }

    fn record(&self, call: ObserverCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl LivesetObserver for RecordingObserver {
    fn on_liveset_changed(&self, item: Option<&PlayableItem>) {
        self.record(ObserverCall::Liveset(item.map(|i| i.catalog_id)));
    }

    fn on_sub_track_changed(&self, track: Option<&SubTrack>) {
        self.record(ObserverCall::SubTrack(track.map(|t| t.title.clone())));
    }

    fn on_prev_next_availability_changed(&self, has_prev: bool, has_next: bool) {
        self.record(ObserverCall::PrevNext(has_prev, has_next));
    }

    fn on_position_progress(&self, position_ms: Option<u64>, _duration_ms: Option<u64>) {
        self.record(ObserverCall::Progress(position_ms));
    }
}

/// Queue manager wired to a simulated player
///
/// Player notifications are delivered explicitly through [`pump`](Self::pump)
/// so each test controls when transitions are processed.
pub struct QueueHarness {
    pub player: SimulatedPlayer,
    pub handle: PlayerHandle,
    pub manager: Arc<QueueManager>,
    pub store: Arc<MemoryManualQueueStore>,
    pub event_bus: EventBus,
    events: broadcast::Receiver<PlayerEvent>,
}

impl QueueHarness {
    pub fn new(items: Vec<PlayableItem>) -> Self {
        Self::with_store(items, Arc::new(MemoryManualQueueStore::default()))
    }

    pub fn with_store(items: Vec<PlayableItem>, store: Arc<MemoryManualQueueStore>) -> Self {
        let player = SimulatedPlayer::new();
        let (handle, _thread) = PlayerHandle::spawn(player.clone(), 256).unwrap();
        let events = handle.subscribe();
        let event_bus = EventBus::new(100);

        let manager = Arc::new(QueueManager::new(
            handle.clone(),
            Arc::new(InMemoryCatalog::new(items)),
            store.clone(),
            event_bus.clone(),
        ));

        Self {
            player,
            handle,
            manager,
            store,
            event_bus,
            events,
        }
    }

    /// Deliver every pending player notification to the manager
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.manager.on_player_event(event).await;
        }
    }

    /// Complete the loaded item and process the resulting transition
    pub async fn finish_current(&mut self) {
        self.player.finish_current();
        self.pump().await;
    }

    pub fn playlist(&self) -> Vec<CatalogId> {
        self.player
            .playlist_media_ids()
            .iter()
            .map(|id| id.parse().unwrap())
            .collect()
    }
}

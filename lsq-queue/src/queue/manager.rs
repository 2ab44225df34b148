//! Queue Manager
//!
//! Owns the manual and context lanes, merges them into the effective order
//! and keeps the player's playlist in step with it.
//!
//! **Responsibilities:**
//! - Lane mutation (context replacement, enqueue, removal, clear), all under one lock
//! - Full reconciliation for changes that move what is playing
//! - Single-slot insert/remove for changes that do not
//! - Consuming played manual entries on player-driven transitions
//!
//! Player slots are addressed through the [`PlaylistMirror`]. After a
//! transition re-anchors the merge point, the effective order may list
//! entries in a different order than the player's playlist, so effective
//! indices are never used as player indices directly.

use super::effective::{build_effective, locate_current, select_target, TargetHints};
use super::mirror::PlaylistMirror;
use super::persistence::PersistenceWorker;
use crate::catalog::CatalogLookup;
use crate::db::ManualQueueStore;
use crate::error::Result;
use crate::player::{PlayerEvent, PlayerHandle};
use chrono::Utc;
use lsq_common::events::{EventBus, QueueChangeTrigger, QueueEvent, TransitionReason};
use lsq_common::{CatalogId, ManualQueueEntry, PlayableRef, QueueItem, QueueState};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lane state guarded by the queue lock
#[derive(Default)]
struct QueueInner {
    manual: Vec<QueueItem>,
    context: Vec<QueueItem>,
    effective: Vec<QueueItem>,
    anchor: Option<CatalogId>,
    current_index: usize,
    current_catalog_id: Option<CatalogId>,
    is_playing: bool,
    mirror: PlaylistMirror,

    /// Persisted entries, including ones that did not resolve at restore
    entries: Vec<ManualQueueEntry>,
    next_entry_id: i64,
}

impl QueueInner {
    fn current_instance(&self) -> Option<Uuid> {
        self.effective.get(self.current_index).map(|item| item.instance_id)
    }

    /// Recompute the effective order, keeping the current entry by identity
    fn rebuild(&mut self) {
        let instance = self.current_instance();
        self.effective = build_effective(&self.manual, &self.context, self.anchor);
        self.current_index = locate_current(&self.effective, instance, self.current_catalog_id);
    }

    fn forget_entry(&mut self, entry_id: i64) {
        self.entries.retain(|entry| entry.id != entry_id);
    }

    fn snapshot(&self) -> QueueState {
        QueueState {
            manual: self.manual.clone(),
            context: self.context.clone(),
            effective: self.effective.clone(),
            current_effective_index: self.current_index,
            current_catalog_id: self.current_catalog_id,
            is_playing: self.is_playing,
        }
    }
}

/// Parameters of a full reconciliation
#[derive(Debug, Default)]
struct ApplyRequest {
    index_override: Option<usize>,
    anchor_override: Option<CatalogId>,
    position_ms: Option<u64>,
    autoplay: bool,
}

/// Playback queue orchestrator
///
/// Public operations never fail: lookup misses, store errors and an
/// unavailable player are logged and degrade to "no change".
pub struct QueueManager {
    inner: Mutex<QueueInner>,
    player: PlayerHandle,
    catalog: Arc<dyn CatalogLookup>,
    store: Arc<dyn ManualQueueStore>,
    persistence: PersistenceWorker,
    event_bus: EventBus,
    state_tx: watch::Sender<QueueState>,
}

impl QueueManager {
    /// Create a manager with empty lanes
    ///
    /// Starts the persistence worker, so this must run inside a tokio
    /// runtime. Call [`restore`](Self::restore) before enqueuing so entry ids
    /// and order keys continue from the persisted ones.
    pub fn new(
        player: PlayerHandle,
        catalog: Arc<dyn CatalogLookup>,
        store: Arc<dyn ManualQueueStore>,
        event_bus: EventBus,
    ) -> Self {
        let (persistence, _task) = PersistenceWorker::spawn(Arc::clone(&store));
        let (state_tx, _) = watch::channel(QueueState::default());

        Self {
            inner: Mutex::new(QueueInner {
                next_entry_id: 1,
                ..Default::default()
            }),
            player,
            catalog,
            store,
            persistence,
            event_bus,
            state_tx,
        }
    }

    /// Reload the persisted manual lane and push it to the player
    ///
    /// Entries whose catalog id no longer resolves are skipped but stay on
    /// disk. Returns the number of entries placed in the manual lane.
    pub async fn restore(&self) -> Result<usize> {
        let mut entries = self.store.load_all().await?;
        entries.sort_by(|a, b| a.order_index.total_cmp(&b.order_index).then(a.id.cmp(&b.id)));

        let mut inner = self.inner.lock().await;

        let mut manual = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.resolve(entry.catalog_id, Some(entry.id)).await {
                Some(item) => manual.push(item),
                None => info!(
                    "Manual entry {} (catalog {}) has no playable source, skipped",
                    entry.id, entry.catalog_id
                ),
            }
        }

        let restored = manual.len();
        inner.next_entry_id = entries.iter().map(|e| e.id).max().map_or(1, |max| max + 1);
        inner.entries = entries;
        inner.manual = manual;
        inner.rebuild();

        self.apply(&mut inner, ApplyRequest::default()).await;
        self.publish(&inner, Some(QueueChangeTrigger::Restored));

        info!("Restored {} manual queue entries", restored);
        Ok(restored)
    }

    /// Replace the context lane
    ///
    /// Merges around `anchor` (or the previous anchor) and fully reconciles.
    /// Playback starts only when an anchor or start position is given.
    pub async fn set_context_queue(
        &self,
        catalog_ids: &[CatalogId],
        anchor: Option<CatalogId>,
        start_position_ms: Option<u64>,
    ) {
        let autoplay = anchor.is_some() || start_position_ms.is_some();
        self.replace_context(catalog_ids, anchor, start_position_ms, autoplay)
            .await;
    }

    /// Use the siblings of `catalog_id` in its parent collection as context
    ///
    /// Any lookup failure falls back to a single-item context.
    pub async fn set_context_from_liveset(
        &self,
        catalog_id: CatalogId,
        start_position_ms: Option<u64>,
        autoplay: bool,
    ) {
        let siblings = self.siblings_of(catalog_id).await;
        self.replace_context(&siblings, Some(catalog_id), start_position_ms, autoplay)
            .await;
    }

    /// Append a manual entry and insert it into the player
    ///
    /// Returns the new entry's instance id, or None when the catalog id has
    /// no playable source.
    pub async fn enqueue_next(&self, catalog_id: CatalogId) -> Option<Uuid> {
        let mut inner = self.inner.lock().await;

        let entry_id = inner.next_entry_id;
        let Some(item) = self.resolve(catalog_id, Some(entry_id)).await else {
            info!("Catalog {} has no playable source, not enqueued", catalog_id);
            return None;
        };
        inner.next_entry_id += 1;

        let entry = ManualQueueEntry {
            id: entry_id,
            catalog_id,
            order_index: ManualQueueEntry::next_order_index(&inner.entries),
            added_at: Utc::now(),
        };
        debug!(
            "Enqueue catalog {} as entry {} (order_index {})",
            catalog_id, entry.id, entry.order_index
        );
        self.persistence.upsert(entry.clone());
        inner.entries.push(entry);

        let instance_id = item.instance_id;
        inner.manual.push(item.clone());
        inner.rebuild();

        // Slot right after the player slot of the effective predecessor
        let position = inner
            .effective
            .iter()
            .position(|e| e.instance_id == instance_id)
            .unwrap_or(inner.effective.len());
        let slot = match position.checked_sub(1) {
            Some(prev) => inner
                .effective
                .get(prev)
                .and_then(|p| inner.mirror.position_of(p.instance_id))
                .map_or(inner.mirror.len(), |s| s + 1),
            None => 0,
        };

        let playable = item.playable.clone();
        if self.player.run(move |p| p.insert_at(slot, playable)).await.is_some() {
            inner.mirror.insert(slot, &item);
        } else {
            warn!("Player unavailable, entry {} not inserted", entry_id);
        }

        self.publish(&inner, Some(QueueChangeTrigger::UserEnqueue));
        Some(instance_id)
    }

    /// Remove an entry from whichever lane holds it (manual first)
    ///
    /// Removing the loaded entry moves playback to the entry that followed
    /// it. Removing anything else patches one player slot and leaves
    /// playback alone. Returns false when no lane holds `instance_id`.
    pub async fn remove_by_instance_id(&self, instance_id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;

        let effective_index = inner.effective.iter().position(|e| e.instance_id == instance_id);
        // Entry playback moves to if the removed one is loaded: the one after
        // it, or the new last entry
        let successor = effective_index
            .and_then(|i| {
                inner
                    .effective
                    .get(i + 1)
                    .or_else(|| i.checked_sub(1).and_then(|prev| inner.effective.get(prev)))
            })
            .map(|e| e.instance_id);

        if let Some(pos) = inner.manual.iter().position(|e| e.instance_id == instance_id) {
            let removed = inner.manual.remove(pos);
            if let Some(entry_id) = removed.manual_entry_id {
                inner.forget_entry(entry_id);
                self.persistence.delete(entry_id);
            }
        } else if let Some(pos) = inner.context.iter().position(|e| e.instance_id == instance_id) {
            let anchor_pos = inner
                .context
                .iter()
                .position(|e| Some(e.catalog_id) == inner.anchor);
            inner.context.remove(pos);
            if anchor_pos == Some(pos) {
                // Keep the manual lane spliced where the removed anchor was
                inner.anchor = pos
                    .checked_sub(1)
                    .and_then(|prev| inner.context.get(prev))
                    .map(|e| e.catalog_id);
            }
        } else {
            debug!("No queue entry with instance {}", instance_id);
            return false;
        }

        let slot = inner.mirror.position_of(instance_id);
        let is_loaded = match self.player.run(|p| p.current_index()).await {
            Some(loaded) => loaded.is_some() && loaded == slot,
            None => inner.current_instance() == Some(instance_id),
        };

        if is_loaded {
            info!("Removing the loaded entry {}, advancing", instance_id);
            inner.rebuild();
            let index = successor
                .and_then(|id| inner.effective.iter().position(|e| e.instance_id == id))
                .or(effective_index)
                .unwrap_or(inner.current_index);
            self.apply(
                &mut inner,
                ApplyRequest {
                    index_override: Some(index),
                    position_ms: Some(0),
                    autoplay: true,
                    ..Default::default()
                },
            )
            .await;
        } else {
            inner.rebuild();
            if let Some(slot) = inner.mirror.remove(instance_id) {
                self.player.run(move |p| p.remove_at(slot)).await;
            }
        }

        self.publish(&inner, Some(QueueChangeTrigger::UserDequeue));
        true
    }

    /// Remove the entry at `index` of the current effective order
    pub async fn remove_at_effective(&self, index: usize) -> bool {
        let instance_id = self
            .state_tx
            .borrow()
            .effective
            .get(index)
            .map(|item| item.instance_id);

        match instance_id {
            Some(instance_id) => self.remove_by_instance_id(instance_id).await,
            None => {
                debug!("No effective entry at index {}", index);
                false
            }
        }
    }

    /// Empty the manual lane and its store, then fully reconcile
    pub async fn clear_manual(&self) {
        let mut inner = self.inner.lock().await;

        inner.manual.clear();
        inner.entries.clear();
        self.persistence.clear();
        inner.rebuild();

        self.apply(&mut inner, ApplyRequest::default()).await;
        self.publish(&inner, Some(QueueChangeTrigger::ManualCleared));
        info!("Manual queue cleared");
    }

    /// Jump to an effective entry at position 0 and play
    ///
    /// The current index follows once the player reports the transition.
    pub async fn skip_to_effective(&self, index: usize) {
        let inner = self.inner.lock().await;

        let Some(slot) = inner
            .effective
            .get(index)
            .and_then(|item| inner.mirror.position_of(item.instance_id))
        else {
            debug!("Skip target {} is not in the player playlist", index);
            return;
        };

        self.player
            .run(move |p| {
                p.seek_to(slot, 0);
                p.play();
            })
            .await;
    }

    /// Player's native "next" (wraps under repeat-all)
    pub async fn skip_to_next(&self) {
        self.player.run(|p| p.seek_to_next()).await;
    }

    /// Current published snapshot
    pub fn state(&self) -> QueueState {
        self.state_tx.borrow().clone()
    }

    /// Watch the published snapshot
    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.state_tx.subscribe()
    }

    /// Wait for queued store writes to land
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Feed player notifications into the manager from a background task
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.player.subscribe();
        let manager = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => manager.on_player_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Queue event loop lagged by {} player events, resyncing", skipped);
                        manager.sync_with_player(false).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Queue event loop stopped");
        })
    }

    /// React to one player notification
    pub async fn on_player_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::ItemTransition { reason, .. } => {
                debug!("Player item transition ({})", reason);
                // A playlist replacement is our own doing, nothing was played out
                self.sync_with_player(reason != TransitionReason::PlaylistChanged)
                    .await;
            }
            PlayerEvent::IsPlayingChanged(playing) => {
                let mut inner = self.inner.lock().await;
                if inner.is_playing != playing {
                    inner.is_playing = playing;
                    self.publish(&inner, None);
                }
            }
            PlayerEvent::PlaybackStateChanged(_) | PlayerEvent::PositionDiscontinuity { .. } => {}
        }
    }

    /// Re-derive the current entry from what the player has loaded
    ///
    /// With `consume`, a manual entry that was current and is no longer
    /// loaded is treated as played and dropped everywhere.
    async fn sync_with_player(&self, consume: bool) {
        let mut inner = self.inner.lock().await;

        // Read at processing time; the event's index may be stale
        let Some(Some(index)) = self.player.run(|p| p.current_index()).await else {
            return;
        };
        let Some(loaded) = inner.mirror.get(index) else {
            debug!("Player slot {} is not mirrored, ignoring transition", index);
            return;
        };

        let previous = inner.effective.get(inner.current_index).cloned();
        if consume {
            if let Some(previous) =
                previous.filter(|p| p.is_manual() && p.instance_id != loaded.instance_id)
            {
                self.consume(&mut inner, &previous).await;
            }
        }

        inner.anchor = Some(loaded.catalog_id);
        inner.effective = build_effective(&inner.manual, &inner.context, inner.anchor);
        inner.current_index =
            locate_current(&inner.effective, Some(loaded.instance_id), Some(loaded.catalog_id));
        inner.current_catalog_id = Some(loaded.catalog_id);

        self.publish(&inner, Some(QueueChangeTrigger::PlayerTransition));
    }

    /// Drop a played manual entry from the lane, the store and the player
    async fn consume(&self, inner: &mut QueueInner, item: &QueueItem) {
        info!("Manual entry {:?} played, consuming", item.manual_entry_id);

        inner.manual.retain(|e| e.instance_id != item.instance_id);
        if let Some(entry_id) = item.manual_entry_id {
            inner.forget_entry(entry_id);
            self.persistence.delete(entry_id);
        }

        if let Some(slot) = inner.mirror.remove(item.instance_id) {
            self.player.run(move |p| p.remove_at(slot)).await;
        }
    }

    async fn replace_context(
        &self,
        catalog_ids: &[CatalogId],
        anchor: Option<CatalogId>,
        start_position_ms: Option<u64>,
        autoplay: bool,
    ) {
        let mut inner = self.inner.lock().await;

        let mut context = Vec::with_capacity(catalog_ids.len());
        for &catalog_id in catalog_ids {
            if let Some(item) = self.resolve(catalog_id, None).await {
                context.push(item);
            }
        }
        info!(
            "Context replaced: {} of {} items playable, anchor {:?}",
            context.len(),
            catalog_ids.len(),
            anchor
        );

        inner.context = context;
        if anchor.is_some() {
            inner.anchor = anchor;
        }
        inner.rebuild();

        self.apply(
            &mut inner,
            ApplyRequest {
                anchor_override: anchor,
                position_ms: start_position_ms,
                autoplay,
                ..Default::default()
            },
        )
        .await;
        self.publish(&inner, Some(QueueChangeTrigger::ContextReplaced));
    }

    async fn siblings_of(&self, catalog_id: CatalogId) -> Vec<CatalogId> {
        let parent = match self.catalog.find(catalog_id).await {
            Ok(Some(item)) => item.parent_id,
            Ok(None) => None,
            Err(e) => {
                warn!("Lookup of catalog {} failed: {}", catalog_id, e);
                None
            }
        };
        let Some(parent) = parent else {
            return vec![catalog_id];
        };

        match self.catalog.children(parent).await {
            Ok(children) if children.contains(&catalog_id) => children,
            Ok(_) => vec![catalog_id],
            Err(e) => {
                warn!("Children of collection {} unavailable: {}", parent, e);
                vec![catalog_id]
            }
        }
    }

    /// Resolve a catalog id into a fresh queue entry; misses yield None
    async fn resolve(&self, catalog_id: CatalogId, manual_entry_id: Option<i64>) -> Option<QueueItem> {
        match self.catalog.find(catalog_id).await {
            Ok(Some(item)) => {
                let playable = item.playable_ref();
                if playable.is_none() {
                    debug!("Catalog {} has no stream URL", catalog_id);
                }
                playable.map(|p| QueueItem::new(catalog_id, p, manual_entry_id))
            }
            Ok(None) => {
                debug!("Catalog {} not found", catalog_id);
                None
            }
            Err(e) => {
                warn!("Lookup of catalog {} failed: {}", catalog_id, e);
                None
            }
        }
    }

    /// Push the whole effective order to the player and place the cursor
    async fn apply(&self, inner: &mut QueueInner, request: ApplyRequest) {
        let Some((prev_index, prev_position)) = self
            .player
            .run(|p| (p.current_index(), p.current_position_ms()))
            .await
        else {
            warn!("Player unavailable, playlist not applied");
            return;
        };
        let prev_slot = prev_index.and_then(|i| inner.mirror.get(i));

        let playlist: Vec<PlayableRef> = inner.effective.iter().map(|e| e.playable.clone()).collect();
        let Some(index_after) = self
            .player
            .run(move |p| {
                p.set_playlist(playlist, false);
                p.set_repeat_all(true);
                p.current_index()
            })
            .await
        else {
            return;
        };
        inner.mirror.rebuild(&inner.effective);

        if inner.effective.is_empty() {
            inner.current_index = 0;
            inner.current_catalog_id = None;
            return;
        }

        let (target, source) = select_target(
            &inner.effective,
            &TargetHints {
                index_override: request.index_override,
                anchor_override: request.anchor_override,
                previous_instance: prev_slot.map(|s| s.instance_id),
                previous_catalog: prev_slot.map(|s| s.catalog_id).or(inner.current_catalog_id),
            },
        );

        let explicit = request.index_override.is_some() || request.position_ms.is_some();
        let seek = explicit || index_after != Some(target);
        let position = request.position_ms.unwrap_or(if source.keeps_previous() {
            prev_position.unwrap_or(0)
        } else {
            0
        });
        debug!(
            "Apply: {} items, target {} ({:?}), seek {}, autoplay {}",
            inner.effective.len(),
            target,
            source,
            seek,
            request.autoplay
        );

        let autoplay = request.autoplay;
        self.player
            .run(move |p| {
                if seek {
                    p.seek_to(target, position);
                }
                p.prepare();
                if autoplay {
                    p.play();
                }
            })
            .await;

        inner.current_index = target;
        inner.current_catalog_id = Some(inner.effective[target].catalog_id);
    }

    fn publish(&self, inner: &QueueInner, trigger: Option<QueueChangeTrigger>) {
        self.state_tx.send_replace(inner.snapshot());

        if let Some(trigger) = trigger {
            self.event_bus.emit_lossy(QueueEvent::QueueChanged {
                trigger,
                effective: inner.effective.iter().map(|e| e.instance_id).collect(),
                current_index: inner.current_index,
                timestamp: Utc::now(),
            });
        }
    }
}

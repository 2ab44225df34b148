//! Sub-track tracker
//!
//! Follows the item loaded in the player, keeps a [`TrackSectionIndex`] for
//! it and reports which sub-track is playing.
//!
//! **Responsibilities:**
//! - Load the tracklist of each newly loaded item, discarding stale fetches
//! - Sample the position while observers are bound and the player plays
//! - Retitle the player's displayed metadata to the active sub-track
//! - Seek to the previous/next sub-track on request

use super::sections::{SectionId, TrackSectionIndex};
use crate::catalog::CatalogLookup;
use crate::listeners::{ListenerRegistry, LivesetObserver, ObserverId};
use crate::player::{PlayerEvent, PlayerHandle};
use chrono::Utc;
use lsq_common::events::{EventBus, QueueEvent};
use lsq_common::{CatalogId, PlayableItem, PlayableRef, SubTrack};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Default)]
struct TrackerState {
    /// Bumped on every item change; fetches carry it to detect staleness
    generation: u64,
    tracked_id: Option<CatalogId>,
    liveset: Option<PlayableItem>,
    index: Option<TrackSectionIndex>,
    current: Option<SectionId>,
    prev_next: (bool, bool),
}

impl TrackerState {
    fn current_label(&self) -> Option<SubTrack> {
        let (index, current) = (self.index.as_ref()?, self.current?);
        index.get(current).label.clone()
    }

    /// Start offset of the section before/after the current one
    fn adjacent_start(&self, forward: bool) -> Option<i64> {
        let (index, current) = (self.index.as_ref()?, self.current?);
        let section = index.get(current);
        let adjacent = if forward { section.next } else { section.prev }?;
        Some(index.get(adjacent).start_at_ms)
    }
}

#[derive(Default)]
struct TrackerTasks {
    listener: Option<JoinHandle<()>>,
    sampler: Option<JoinHandle<()>>,
}

/// Outcome of resolving a new section, applied outside the state lock
struct SectionChange {
    liveset_id: CatalogId,
    track: Option<SubTrack>,
    display: (Option<String>, Option<String>),
    retitle: bool,
    prev_next: Option<(bool, bool)>,
}

/// Tracks the active sub-track of the loaded liveset
pub struct SubTrackTracker {
    player: PlayerHandle,
    catalog: Arc<dyn CatalogLookup>,
    event_bus: EventBus,
    observers: ListenerRegistry,
    state: Mutex<TrackerState>,
    tasks: Mutex<TrackerTasks>,
    progress_interval: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SubTrackTracker {
    pub fn new(
        player: PlayerHandle,
        catalog: Arc<dyn CatalogLookup>,
        event_bus: EventBus,
        progress_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            player,
            catalog,
            event_bus,
            observers: ListenerRegistry::new(),
            state: Mutex::new(TrackerState::default()),
            tasks: Mutex::new(TrackerTasks::default()),
            progress_interval,
        })
    }

    /// Bind an observer
    ///
    /// The first bind starts following the player. Later binds get the
    /// current liveset, sub-track and prev/next availability replayed.
    pub fn bind(self: &Arc<Self>, observer: Arc<dyn LivesetObserver>) -> ObserverId {
        // Held across register so a concurrent last unbind sees the listener
        let mut tasks = lock(&self.tasks);
        let (id, count) = self.observers.register(observer);
        debug!("Observer bound ({} total)", count);
        let replay = self.replay_state();

        if count == 1 {
            let rx = self.player.subscribe();
            let tracker = Arc::clone(self);
            tasks.listener = Some(tokio::spawn(async move { tracker.run_listener(rx).await }));
        }
        drop(tasks);

        if let Some((liveset, track, (has_prev, has_next))) = replay {
            self.observers.notify_one(id, |o| {
                o.on_liveset_changed(Some(&liveset));
                o.on_sub_track_changed(track.as_ref());
                o.on_prev_next_availability_changed(has_prev, has_next);
            });
        }
        id
    }

    /// Unbind an observer; the last unbind stops listener and sampler
    pub fn unbind(&self, id: ObserverId) {
        match self.observers.unregister(id) {
            Some(0) => {
                let mut tasks = lock(&self.tasks);
                if let Some(listener) = tasks.listener.take() {
                    listener.abort();
                }
                if let Some(sampler) = tasks.sampler.take() {
                    sampler.abort();
                }
                debug!("Last observer unbound, tracking stopped");
            }
            Some(remaining) => debug!("Observer unbound ({} remaining)", remaining),
            None => debug!("Unbind of unknown observer {:?}", id),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Liveset whose tracklist is installed
    pub fn current_liveset(&self) -> Option<PlayableItem> {
        lock(&self.state).liveset.clone()
    }

    /// Label of the active section (None in the leading untitled section)
    pub fn current_sub_track(&self) -> Option<SubTrack> {
        lock(&self.state).current_label()
    }

    /// `(has_prev, has_next)`; `(false, false)` without sub-track data
    pub fn prev_next(&self) -> (bool, bool) {
        lock(&self.state).prev_next
    }

    /// Seek to the start of the previous section
    pub async fn to_previous_track(&self) {
        let start = lock(&self.state).adjacent_start(false);
        self.seek_within_item(start).await;
    }

    /// Seek to the start of the next section
    pub async fn to_next_track(&self) {
        let start = lock(&self.state).adjacent_start(true);
        self.seek_within_item(start).await;
    }

    async fn seek_within_item(&self, start_at_ms: Option<i64>) {
        let Some(start_at_ms) = start_at_ms else {
            debug!("No adjacent section to seek to");
            return;
        };
        let position_ms = start_at_ms.max(0) as u64;

        // The discontinuity notification re-resolves the section
        self.player
            .run(move |p| {
                if let Some(index) = p.current_index() {
                    p.seek_to(index, position_ms);
                }
            })
            .await;
    }

    async fn run_listener(self: Arc<Self>, mut rx: broadcast::Receiver<PlayerEvent>) {
        self.sync_with_player().await;

        loop {
            match rx.recv().await {
                Ok(PlayerEvent::ItemTransition { item, .. }) => match item {
                    Some(item) => self.load_item(&item),
                    None => self.clear(),
                },
                Ok(PlayerEvent::IsPlayingChanged(playing)) => self.set_sampling(playing),
                Ok(PlayerEvent::PositionDiscontinuity { position_ms }) => {
                    self.resolve_at(None, position_ms as i64).await;
                }
                Ok(PlayerEvent::PlaybackStateChanged(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Tracker lagged by {} player events, resyncing", skipped);
                    self.sync_with_player().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    async fn sync_with_player(self: &Arc<Self>) {
        let Some(snapshot) = self.player.snapshot().await else {
            return;
        };
        if let Some(item) = &snapshot.item {
            self.load_item(item);
        }
        self.set_sampling(snapshot.is_playing);
    }

    /// Start tracking a newly loaded item
    ///
    /// Unparseable or unchanged identities are ignored.
    fn load_item(self: &Arc<Self>, playable: &PlayableRef) {
        let Some(catalog_id) = playable.catalog_id() else {
            debug!("Loaded media {} has no catalog identity", playable.media_id);
            return;
        };

        let generation = {
            let mut state = lock(&self.state);
            if state.tracked_id == Some(catalog_id) {
                return;
            }
            let generation = state.generation + 1;
            *state = TrackerState {
                generation,
                tracked_id: Some(catalog_id),
                ..Default::default()
            };
            generation
        };

        let tracker = Arc::clone(self);
        tokio::spawn(async move { tracker.fetch_and_install(catalog_id, generation).await });
    }

    fn clear(&self) {
        let had_liveset = {
            let mut state = lock(&self.state);
            let had_liveset = state.liveset.is_some();
            *state = TrackerState {
                generation: state.generation + 1,
                ..Default::default()
            };
            had_liveset
        };

        if had_liveset {
            self.observers.notify(|o| o.on_liveset_changed(None));
            self.event_bus.emit_lossy(QueueEvent::LivesetChanged {
                catalog_id: None,
                title: None,
                timestamp: Utc::now(),
            });
        }
    }

    async fn fetch_and_install(self: Arc<Self>, catalog_id: CatalogId, generation: u64) {
        let item = match self.catalog.find(catalog_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                debug!("Liveset {} not in catalog, no sub-track data", catalog_id);
                return;
            }
            Err(e) => {
                warn!("Tracklist fetch for {} failed: {}", catalog_id, e);
                return;
            }
        };
        let index = TrackSectionIndex::build(&item.tracks);

        let prev_next = {
            let mut state = lock(&self.state);
            if state.generation != generation {
                debug!("Discarding stale tracklist for {}", catalog_id);
                return;
            }
            let head = index.head();
            let prev_next = (false, index.get(head).next.is_some());
            state.liveset = Some(item.clone());
            state.index = Some(index);
            state.current = Some(head);
            state.prev_next = prev_next;
            prev_next
        };
        info!(
            "Tracking liveset {} ({} sub-tracks)",
            catalog_id,
            item.tracks.len()
        );

        self.observers.notify(|o| {
            o.on_liveset_changed(Some(&item));
            o.on_sub_track_changed(None);
            o.on_prev_next_availability_changed(prev_next.0, prev_next.1);
        });
        self.event_bus.emit_lossy(QueueEvent::LivesetChanged {
            catalog_id: Some(catalog_id),
            title: item.title.clone(),
            timestamp: Utc::now(),
        });
        self.event_bus.emit_lossy(QueueEvent::PrevNextAvailabilityChanged {
            has_prev: prev_next.0,
            has_next: prev_next.1,
        });

        // Loaded mid-item (restore, seek into a set): catch up right away
        if let Some(Some(position_ms)) = self.player.run(|p| p.current_position_ms()).await {
            self.resolve_at(Some(catalog_id), position_ms as i64).await;
        }
    }

    /// Sampler runs while playing and at least one observer is bound
    fn set_sampling(self: &Arc<Self>, playing: bool) {
        let mut tasks = lock(&self.tasks);
        if playing && !self.observers.is_empty() {
            if tasks.sampler.is_none() {
                let tracker = Arc::clone(self);
                tasks.sampler = Some(tokio::spawn(async move { tracker.run_sampler().await }));
                debug!("Position sampler started");
            }
        } else if let Some(sampler) = tasks.sampler.take() {
            sampler.abort();
            debug!("Position sampler stopped");
        }
    }

    async fn run_sampler(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sample().await;
        }
    }

    async fn sample(&self) {
        let Some(snapshot) = self.player.snapshot().await else {
            return;
        };

        self.observers
            .notify(|o| o.on_position_progress(snapshot.position_ms, snapshot.duration_ms));
        self.event_bus.emit_lossy(QueueEvent::PlaybackProgress {
            position_ms: snapshot.position_ms,
            duration_ms: snapshot.duration_ms,
            timestamp: Utc::now(),
        });

        if let Some(position_ms) = snapshot.position_ms {
            let loaded = snapshot.item.as_ref().and_then(PlayableRef::catalog_id);
            if let Some(loaded) = loaded {
                self.resolve_at(Some(loaded), position_ms as i64).await;
            }
        }
    }

    /// Re-resolve the section at `position_ms` and report a change
    ///
    /// With `expected`, nothing happens unless that liveset is installed.
    async fn resolve_at(&self, expected: Option<CatalogId>, position_ms: i64) {
        let Some(change) = self.resolve_locked(expected, position_ms) else {
            return;
        };
        debug!(
            "Liveset {} now at {:?}",
            change.liveset_id,
            change.track.as_ref().map(|t| t.title.as_str())
        );

        self.observers
            .notify(|o| o.on_sub_track_changed(change.track.as_ref()));
        self.event_bus.emit_lossy(QueueEvent::SubTrackChanged {
            liveset_id: change.liveset_id,
            track: change.track.clone(),
            position_ms: position_ms.max(0) as u64,
            timestamp: Utc::now(),
        });

        if change.retitle {
            let (title, artist) = change.display;
            self.player
                .run(move |p| p.set_display_metadata(title, artist))
                .await;
        }

        if let Some((has_prev, has_next)) = change.prev_next {
            self.observers
                .notify(|o| o.on_prev_next_availability_changed(has_prev, has_next));
            self.event_bus
                .emit_lossy(QueueEvent::PrevNextAvailabilityChanged { has_prev, has_next });
        }
    }

    fn resolve_locked(&self, expected: Option<CatalogId>, position_ms: i64) -> Option<SectionChange> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let liveset = state.liveset.as_ref()?;
        if expected.is_some_and(|id| id != liveset.catalog_id) {
            return None;
        }
        let liveset_id = liveset.catalog_id;
        let parent_display = (liveset.title.clone(), liveset.artist.clone());

        let (index, current) = (state.index.as_ref()?, state.current?);
        let found = index.find_playing_section(current, position_ms);
        if found == current {
            return None;
        }

        let old_label_id = index.get(current).label.as_ref().and_then(|l| l.id);
        let section = index.get(found);
        let track = section.label.clone();
        let prev_next = (section.prev.is_some(), section.next.is_some());

        // Same underlying track under a new section: display already right
        let same_label = track
            .as_ref()
            .and_then(|t| t.id)
            .is_some_and(|id| Some(id) == old_label_id);

        let display = match &track {
            Some(t) => (Some(t.title.clone()), t.artist.clone()),
            None => parent_display,
        };

        state.current = Some(found);
        let prev_next_changed = state.prev_next != prev_next;
        state.prev_next = prev_next;

        Some(SectionChange {
            liveset_id,
            track,
            display,
            retitle: !same_label,
            prev_next: prev_next_changed.then_some(prev_next),
        })
    }

    /// What a newly bound observer is told: liveset, sub-track, prev/next
    fn replay_state(&self) -> Option<(PlayableItem, Option<SubTrack>, (bool, bool))> {
        let state = lock(&self.state);
        let liveset = state.liveset.clone()?;
        Some((liveset, state.current_label(), state.prev_next))
    }
}

//! Simulated player
//!
//! A complete in-process [`Player`]: real playlist semantics, repeat-all
//! wrap, a manually driven position clock, display metadata and an
//! operation log. Clones share state, so one clone can be moved into a
//! [`PlayerHandle`](super::PlayerHandle) while another drives the clock or
//! inspects what the queue did.

use super::{Player, PlayerEvent, PlayerEventSink};
use lsq_common::events::{PlaybackState, TransitionReason};
use lsq_common::PlayableRef;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Mutating call recorded by the simulated player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerOp {
    SetPlaylist { media_ids: Vec<String>, reset_position: bool },
    InsertAt { index: usize, media_id: String },
    RemoveAt { index: usize },
    SeekTo { index: usize, position_ms: u64 },
    SeekToNext,
    Play,
    Pause,
    Prepare,
    SetRepeatAll(bool),
    SetDisplayMetadata { title: Option<String>, artist: Option<String> },
}

#[derive(Default)]
struct SimState {
    playlist: Vec<PlayableRef>,
    index: Option<usize>,
    position_ms: u64,
    play_when_ready: bool,
    prepared: bool,
    repeat_all: bool,
    display: Option<(Option<String>, Option<String>)>,
    ops: Vec<PlayerOp>,
    sink: Option<PlayerEventSink>,
}

impl SimState {
    fn emit(&self, event: PlayerEvent) {
        trace!("Simulated player event: {:?}", event);
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    fn is_playing(&self) -> bool {
        self.play_when_ready && self.prepared && self.index.is_some()
    }

    fn current_item(&self) -> Option<PlayableRef> {
        self.index.and_then(|i| self.playlist.get(i).cloned())
    }

    /// Displayed metadata belongs to the loaded item and resets with it
    fn loaded_item_changed(&mut self, reason: TransitionReason) {
        self.display = None;
        self.emit(PlayerEvent::ItemTransition {
            index: self.index,
            item: self.current_item(),
            reason,
        });
    }

    /// Run a mutation and report any change of the effective playing flag
    fn tracking_playing(&mut self, f: impl FnOnce(&mut SimState)) {
        let before = self.is_playing();
        f(self);
        let after = self.is_playing();
        if before != after {
            self.emit(PlayerEvent::IsPlayingChanged(after));
        }
    }

    /// Move past the current item as if it played to the end.
    ///
    /// Returns false when playback ended (no next slot, no repeat).
    fn complete_current(&mut self) -> bool {
        let Some(current) = self.index else {
            return false;
        };

        let next = current + 1;
        if next < self.playlist.len() {
            self.index = Some(next);
            self.position_ms = 0;
            self.loaded_item_changed(TransitionReason::Auto);
            true
        } else if self.repeat_all {
            self.index = Some(0);
            self.position_ms = 0;
            let reason = if current == 0 {
                TransitionReason::Repeat
            } else {
                TransitionReason::Auto
            };
            self.loaded_item_changed(reason);
            true
        } else {
            self.tracking_playing(|s| s.play_when_ready = false);
            self.emit(PlayerEvent::PlaybackStateChanged(PlaybackState::Ended));
            false
        }
    }
}

/// In-process player with shared state
#[derive(Clone, Default)]
pub struct SimulatedPlayer {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not hide the player state from the rest
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Advance the position clock by `elapsed_ms` of playback.
    ///
    /// Items with a known duration complete (and auto-advance) when the clock
    /// passes their end. Does nothing while not playing.
    pub fn advance_clock(&self, elapsed_ms: u64) {
        let mut state = self.lock();
        if !state.is_playing() {
            return;
        }

        state.position_ms += elapsed_ms;
        loop {
            let Some(duration) = state.current_item().and_then(|item| item.duration_ms) else {
                break;
            };
            if state.position_ms < duration {
                break;
            }
            let overflow = state.position_ms - duration;
            if !state.complete_current() {
                state.position_ms = duration;
                break;
            }
            state.position_ms = overflow;
        }
    }

    /// Complete the current item immediately
    pub fn finish_current(&self) {
        self.lock().complete_current();
    }

    /// Media ids of the playlist, in slot order
    pub fn playlist_media_ids(&self) -> Vec<String> {
        self.lock().playlist.iter().map(|m| m.media_id.clone()).collect()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lock().index
    }

    pub fn position_ms(&self) -> u64 {
        self.lock().position_ms
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing()
    }

    pub fn repeat_all(&self) -> bool {
        self.lock().repeat_all
    }

    /// Last title/artist pushed through `set_display_metadata`
    pub fn display_metadata(&self) -> Option<(Option<String>, Option<String>)> {
        self.lock().display.clone()
    }

    /// Operations recorded since creation or the last `clear_ops`
    pub fn ops(&self) -> Vec<PlayerOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }
}

impl Player for SimulatedPlayer {
    fn attach(&mut self, sink: PlayerEventSink) {
        self.lock().sink = Some(sink);
    }

    fn set_playlist(&mut self, items: Vec<PlayableRef>, reset_position: bool) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::SetPlaylist {
            media_ids: items.iter().map(|m| m.media_id.clone()).collect(),
            reset_position,
        });

        let before = state.current_item();
        state.tracking_playing(|s| {
            s.playlist = items;
            if s.playlist.is_empty() {
                s.index = None;
                s.position_ms = 0;
            } else if reset_position || s.index.is_none() {
                s.index = Some(0);
                s.position_ms = 0;
            } else {
                let last = s.playlist.len() - 1;
                s.index = s.index.map(|i| i.min(last));
            }
        });

        if state.current_item() != before {
            state.loaded_item_changed(TransitionReason::PlaylistChanged);
        }
        if state.playlist.is_empty() {
            state.emit(PlayerEvent::PlaybackStateChanged(PlaybackState::Idle));
        }
    }

    fn insert_at(&mut self, index: usize, item: PlayableRef) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::InsertAt {
            index,
            media_id: item.media_id.clone(),
        });

        let index = index.min(state.playlist.len());
        state.playlist.insert(index, item);
        match state.index {
            Some(current) if index <= current => state.index = Some(current + 1),
            Some(_) => {}
            None => {
                state.tracking_playing(|s| {
                    s.index = Some(0);
                    s.position_ms = 0;
                });
                state.loaded_item_changed(TransitionReason::PlaylistChanged);
            }
        }
    }

    fn remove_at(&mut self, index: usize) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::RemoveAt { index });
        if index >= state.playlist.len() {
            return;
        }

        state.playlist.remove(index);
        let Some(current) = state.index else {
            return;
        };

        if index < current {
            state.index = Some(current - 1);
        } else if index == current {
            state.tracking_playing(|s| {
                if s.playlist.is_empty() {
                    s.index = None;
                } else {
                    s.index = Some(current.min(s.playlist.len() - 1));
                }
                s.position_ms = 0;
            });
            state.loaded_item_changed(TransitionReason::PlaylistChanged);
        }
    }

    fn seek_to(&mut self, index: usize, position_ms: u64) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::SeekTo { index, position_ms });
        if index >= state.playlist.len() {
            return;
        }

        let previous = state.index;
        state.tracking_playing(|s| {
            s.index = Some(index);
            s.position_ms = position_ms;
        });
        if previous != Some(index) {
            state.loaded_item_changed(TransitionReason::Seek);
        }
        state.emit(PlayerEvent::PositionDiscontinuity { position_ms });
    }

    fn seek_to_next(&mut self) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::SeekToNext);
        let Some(current) = state.index else {
            return;
        };

        let next = if current + 1 < state.playlist.len() {
            current + 1
        } else if state.repeat_all {
            0
        } else {
            return;
        };

        state.index = Some(next);
        state.position_ms = 0;
        let reason = if next == current {
            TransitionReason::Repeat
        } else {
            TransitionReason::Seek
        };
        state.loaded_item_changed(reason);
        state.emit(PlayerEvent::PositionDiscontinuity { position_ms: 0 });
    }

    fn play(&mut self) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::Play);
        state.tracking_playing(|s| s.play_when_ready = true);
    }

    fn pause(&mut self) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::Pause);
        state.tracking_playing(|s| s.play_when_ready = false);
    }

    fn prepare(&mut self) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::Prepare);
        if state.prepared {
            return;
        }
        state.tracking_playing(|s| s.prepared = true);
        if !state.playlist.is_empty() {
            state.emit(PlayerEvent::PlaybackStateChanged(PlaybackState::Ready));
        }
    }

    fn set_repeat_all(&mut self, enabled: bool) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::SetRepeatAll(enabled));
        state.repeat_all = enabled;
    }

    fn set_display_metadata(&mut self, title: Option<String>, artist: Option<String>) {
        let mut state = self.lock();
        state.ops.push(PlayerOp::SetDisplayMetadata {
            title: title.clone(),
            artist: artist.clone(),
        });
        state.display = Some((title, artist));
    }

    fn current_index(&self) -> Option<usize> {
        self.lock().index
    }

    fn current_position_ms(&self) -> Option<u64> {
        let state = self.lock();
        state.index.map(|_| state.position_ms)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.lock().current_item().and_then(|item| item.duration_ms)
    }

    fn current_item(&self) -> Option<PlayableRef> {
        self.lock().current_item()
    }

    fn media_count(&self) -> usize {
        self.lock().playlist.len()
    }

    fn is_playing(&self) -> bool {
        self.lock().is_playing()
    }
}

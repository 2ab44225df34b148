//! External player interface
//!
//! The player is a single shared mutable resource owned by whatever plays the
//! audio. It may only be touched from its designated execution context, so
//! the queue never holds a `Player` directly: it holds a [`PlayerHandle`],
//! which moves the player onto a dedicated thread and runs every access there.
//!
//! **Responsibilities:**
//! - `Player` trait: the push-based playlist consumer the queue drives
//! - `PlayerEvent`: the listener notifications the player delivers
//! - `PlayerHandle`: context hop + event fan-out
//! - `SimulatedPlayer`: in-process implementation for the session runner and tests

mod handle;
mod simulated;

pub use handle::{PlayerHandle, PlayerSnapshot};
pub use simulated::{PlayerOp, SimulatedPlayer};

use lsq_common::events::{PlaybackState, TransitionReason};
use lsq_common::PlayableRef;
use tokio::sync::broadcast;

/// Listener notifications delivered by the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A different playlist slot (or a different item in the same slot) is loaded
    ItemTransition {
        index: Option<usize>,
        item: Option<PlayableRef>,
        reason: TransitionReason,
    },

    /// Effective playing flag changed (play intent and readiness combined)
    IsPlayingChanged(bool),

    PlaybackStateChanged(PlaybackState),

    /// Position jumped (seek, restart) rather than advancing continuously
    PositionDiscontinuity { position_ms: u64 },
}

/// Event sender handed to a player on attach
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    tx: broadcast::Sender<PlayerEvent>,
}

impl PlayerEventSink {
    pub(crate) fn new(tx: broadcast::Sender<PlayerEvent>) -> Self {
        Self { tx }
    }

    /// Deliver to every current listener; no listeners is fine
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}

/// Push-based playlist consumer
///
/// All methods run on the player thread owned by [`PlayerHandle`]; they must
/// not block for long. Indices that are out of range are ignored.
pub trait Player: Send + 'static {
    /// Install the listener sink; called once before any other method
    fn attach(&mut self, sink: PlayerEventSink);

    /// Replace the playlist. With `reset_position == false` the current slot
    /// index and position are kept (clamped to the new length).
    fn set_playlist(&mut self, items: Vec<PlayableRef>, reset_position: bool);

    fn insert_at(&mut self, index: usize, item: PlayableRef);

    fn remove_at(&mut self, index: usize);

    fn seek_to(&mut self, index: usize, position_ms: u64);

    /// Native "next": wraps to the first slot under repeat-all
    fn seek_to_next(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    fn prepare(&mut self);

    fn set_repeat_all(&mut self, enabled: bool);

    /// Replace the displayed title/artist of the loaded item
    fn set_display_metadata(&mut self, title: Option<String>, artist: Option<String>);

    fn current_index(&self) -> Option<usize>;

    fn current_position_ms(&self) -> Option<u64>;

    fn duration_ms(&self) -> Option<u64>;

    fn current_item(&self) -> Option<PlayableRef>;

    fn media_count(&self) -> usize;

    fn is_playing(&self) -> bool;
}

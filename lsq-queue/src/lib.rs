//! # LSQ Queue Library (lsq-queue)
//!
//! Playback queue orchestration for a streaming audio player.
//!
//! **Purpose:** Merge a persisted manual lane with a contextual lane into one
//! effective play order, keep an externally owned player's playlist in step
//! with it, and resolve the active sub-track inside continuously streamed
//! livesets.
//!
//! **Architecture:** The player lives on its own thread behind
//! [`player::PlayerHandle`]; [`queue::QueueManager`] and
//! [`liveset::SubTrackTracker`] drive it and react to its notifications.

pub mod catalog;
pub mod db;
pub mod error;
pub mod listeners;
pub mod liveset;
pub mod player;
pub mod queue;

pub use error::{Error, Result};
pub use listeners::{LivesetObserver, ObserverId};
pub use liveset::SubTrackTracker;
pub use player::{PlayerHandle, SimulatedPlayer};
pub use queue::QueueManager;

//! Playback-related type definitions
//!
//! Supporting types for the external player's listener notifications.

use serde::{Deserialize, Serialize};

/// Player readiness, independent of play/pause intent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PlaybackState {
    /// No playlist or not prepared
    Idle,
    Buffering,
    Ready,
    /// Reached the end of the playlist without repeat
    Ended,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Buffering => write!(f, "Buffering"),
            PlaybackState::Ready => write!(f, "Ready"),
            PlaybackState::Ended => write!(f, "Ended"),
        }
    }
}

/// Why the player's loaded item changed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum TransitionReason {
    /// Previous item played to its end
    Auto,
    /// Same item restarted under repeat
    Repeat,
    /// Explicit seek to another item (including "next")
    Seek,
    /// The playlist was replaced or edited under the current slot
    PlaylistChanged,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionReason::Auto => write!(f, "Auto"),
            TransitionReason::Repeat => write!(f, "Repeat"),
            TransitionReason::Seek => write!(f, "Seek"),
            TransitionReason::PlaylistChanged => write!(f, "PlaylistChanged"),
        }
    }
}

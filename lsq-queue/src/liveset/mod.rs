//! Liveset sub-track resolution
//!
//! A liveset is one continuous media item (a DJ set, a radio show) with an
//! embedded, timestamped tracklist.

pub mod sections;
mod tracker;

pub use sections::{SectionId, TrackSection, TrackSectionIndex};
pub use tracker::SubTrackTracker;

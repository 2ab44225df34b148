//! Queue orchestration
//!
//! **Responsibilities:**
//! - Merge the manual and context lanes into the effective order
//! - Keep the player's playlist reconciled with that order
//! - Persist the manual lane in the background

pub mod effective;
mod manager;
mod mirror;
mod persistence;

pub use manager::QueueManager;
pub use mirror::{MirrorSlot, PlaylistMirror};
pub use persistence::PersistenceWorker;

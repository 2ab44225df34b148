//! # LSQ Common Library
//!
//! Shared code for the liveset queue workspace:
//! - Queue and catalog data models
//! - Event types (QueueEvent enum) and the EventBus
//! - Configuration loading
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use models::{CatalogId, ManualQueueEntry, PlayableItem, PlayableRef, QueueItem, QueueState, SubTrack};

//! Database access layer
//!
//! Provides the persisted manual queue store.

pub mod manual_queue;

pub use manual_queue::{ManualQueueStore, SqliteManualQueueStore};

//! Liveset observers
//!
//! Fan-out of tracker notifications to every bound observer. The registry
//! only tracks membership; starting and stopping the work that produces the
//! notifications is up to the owner, keyed off the bound count.

use lsq_common::{PlayableItem, SubTrack};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives sub-track tracking notifications
///
/// Called from tracker tasks; implementations must return quickly.
pub trait LivesetObserver: Send + Sync {
    /// A new liveset was loaded (None: tracking cleared)
    fn on_liveset_changed(&self, _item: Option<&PlayableItem>) {}

    /// Active sub-track changed (None: before the first labelled track)
    fn on_sub_track_changed(&self, _track: Option<&SubTrack>) {}

    fn on_prev_next_availability_changed(&self, _has_prev: bool, _has_next: bool) {}

    fn on_position_progress(&self, _position_ms: Option<u64>, _duration_ms: Option<u64>) {}
}

/// Handle returned by a bind, used to unbind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    observers: Mutex<Vec<(ObserverId, Arc<dyn LivesetObserver>)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ObserverId, Arc<dyn LivesetObserver>)>> {
        self.observers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an observer; returns its id and the bound count afterwards
    pub fn register(&self, observer: Arc<dyn LivesetObserver>) -> (ObserverId, usize) {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut observers = self.lock();
        observers.push((id, observer));
        (id, observers.len())
    }

    /// Remove an observer; returns the remaining count, or None if unknown
    pub fn unregister(&self, id: ObserverId) -> Option<usize> {
        let mut observers = self.lock();
        let index = observers.iter().position(|(bound, _)| *bound == id)?;
        observers.remove(index);
        Some(observers.len())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver to every bound observer
    ///
    /// Observers are called outside the registry lock, so a callback may
    /// bind or unbind.
    pub fn notify(&self, f: impl Fn(&dyn LivesetObserver)) {
        let observers: Vec<Arc<dyn LivesetObserver>> =
            self.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in observers {
            f(observer.as_ref());
        }
    }

    /// Deliver to one observer only (replay on bind)
    pub fn notify_one(&self, id: ObserverId, f: impl FnOnce(&dyn LivesetObserver)) {
        let observer = self
            .lock()
            .iter()
            .find(|(bound, _)| *bound == id)
            .map(|(_, o)| Arc::clone(o));
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }
}

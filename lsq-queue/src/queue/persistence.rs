//! Background manual queue persistence
//!
//! Store writes are queued to a single detached task and applied in order.
//! Callers never wait on them while holding the queue lock: durability is
//! best-effort and the in-memory lanes stay authoritative. Failures are
//! logged and dropped.

use crate::db::ManualQueueStore;
use lsq_common::ManualQueueEntry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum PersistOp {
    Upsert(ManualQueueEntry),
    Delete(i64),
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Ordered write-behind queue in front of a [`ManualQueueStore`]
#[derive(Clone)]
pub struct PersistenceWorker {
    tx: mpsc::UnboundedSender<PersistOp>,
}

impl PersistenceWorker {
    /// Start the worker task; must be called inside a tokio runtime
    ///
    /// The task ends when every clone of the worker has been dropped.
    pub fn spawn(store: Arc<dyn ManualQueueStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    PersistOp::Upsert(entry) => {
                        if let Err(e) = store.upsert(&entry).await {
                            warn!("Failed to persist manual entry {}: {}", entry.id, e);
                        }
                    }
                    PersistOp::Delete(id) => {
                        if let Err(e) = store.delete_by_id(id).await {
                            warn!("Failed to delete manual entry {}: {}", id, e);
                        }
                    }
                    PersistOp::Clear => {
                        if let Err(e) = store.clear().await {
                            warn!("Failed to clear manual queue store: {}", e);
                        }
                    }
                    PersistOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Persistence worker stopped");
        });

        (Self { tx }, task)
    }

    pub fn upsert(&self, entry: ManualQueueEntry) {
        self.dispatch(PersistOp::Upsert(entry));
    }

    pub fn delete(&self, id: i64) {
        self.dispatch(PersistOp::Delete(id));
    }

    pub fn clear(&self) {
        self.dispatch(PersistOp::Clear);
    }

    /// Wait until every previously queued write has been applied
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.dispatch(PersistOp::Flush(tx));
        let _ = rx.await;
    }

    fn dispatch(&self, op: PersistOp) {
        if self.tx.send(op).is_err() {
            warn!("Persistence worker is gone, dropping write");
        }
    }
}

//! Player execution context
//!
//! The player lives on one dedicated OS thread. Every read or write is a job
//! sent to that thread; callers await the job's result. Background tasks
//! therefore never observe or mutate player state directly.

use super::{Player, PlayerEvent, PlayerEventSink};
use crate::error::{Error, Result};
use lsq_common::PlayableRef;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

type PlayerJob = Box<dyn FnOnce(&mut dyn Player) + Send>;

/// Point-in-time view of the player, read in a single job
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub index: Option<usize>,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub item: Option<PlayableRef>,
    pub media_count: usize,
    pub is_playing: bool,
}

/// Cloneable capability to drive the player on its own thread
#[derive(Clone)]
pub struct PlayerHandle {
    jobs: mpsc::UnboundedSender<PlayerJob>,
    events: broadcast::Sender<PlayerEvent>,
}

impl PlayerHandle {
    /// Move `player` onto a dedicated thread
    ///
    /// The thread exits once every handle clone has been dropped.
    pub fn spawn<P: Player>(mut player: P, event_capacity: usize) -> Result<(Self, std::thread::JoinHandle<()>)> {
        let (events, _) = broadcast::channel(event_capacity);
        let (jobs, mut rx) = mpsc::unbounded_channel::<PlayerJob>();

        player.attach(PlayerEventSink::new(events.clone()));

        let thread = std::thread::Builder::new()
            .name("player".to_string())
            .spawn(move || {
                debug!("Player thread started");
                while let Some(job) = rx.blocking_recv() {
                    job(&mut player);
                }
                info!("Player thread exiting");
            })
            .map_err(Error::Io)?;

        Ok((Self { jobs, events }, thread))
    }

    /// Run `f` on the player thread and await its result
    ///
    /// Returns None when the player thread is gone; callers treat that as a
    /// no-op rather than an error.
    pub async fn run<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn Player) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: PlayerJob = Box::new(move |player| {
            let _ = tx.send(f(player));
        });

        if self.jobs.send(job).is_err() {
            debug!("Player job dropped: player thread is gone");
            return None;
        }
        rx.await.ok()
    }

    /// Read index, position, duration and loaded item in one hop
    pub async fn snapshot(&self) -> Option<PlayerSnapshot> {
        self.run(|p| PlayerSnapshot {
            index: p.current_index(),
            position_ms: p.current_position_ms(),
            duration_ms: p.duration_ms(),
            item: p.current_item(),
            media_count: p.media_count(),
            is_playing: p.is_playing(),
        })
        .await
    }

    /// Listen to player notifications from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn is_available(&self) -> bool {
        !self.jobs.is_closed()
    }
}

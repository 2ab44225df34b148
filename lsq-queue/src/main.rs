//! Liveset queue session runner (lsq-queue) - Main entry point
//!
//! Runs a headless playback session against the simulated player: restores
//! the persisted manual queue, starts a liveset with its collection as
//! context, enqueues extra items and logs sub-track changes while the
//! simulated clock advances.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lsq_common::config::{resolve_db_path, QueueConfig};
use lsq_common::db::init_database;
use lsq_common::events::EventBus;
use lsq_common::{CatalogId, PlayableItem, SubTrack};
use lsq_queue::catalog::{CatalogLookup, InMemoryCatalog};
use lsq_queue::db::SqliteManualQueueStore;
use lsq_queue::{LivesetObserver, PlayerHandle, QueueManager, SimulatedPlayer, SubTrackTracker};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Simulated clock resolution
const TICK: Duration = Duration::from_millis(100);

/// Command-line arguments for lsq-queue
#[derive(Parser, Debug)]
#[command(name = "lsq-queue")]
#[command(about = "Headless liveset queue session runner")]
#[command(version)]
struct Args {
    /// Configuration file (overrides LSQ_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Manual queue database (overrides LSQ_DB_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON catalog file (array of playable items)
    #[arg(long)]
    catalog: PathBuf,

    /// Liveset to start; its collection becomes the context lane
    #[arg(long)]
    liveset: Option<CatalogId>,

    /// Catalog ids to queue manually after the liveset
    #[arg(long, num_args = 1..)]
    enqueue: Vec<CatalogId>,

    /// Session length in seconds of wall-clock time
    #[arg(long, default_value = "60")]
    run_secs: u64,

    /// Simulated playback speed multiplier
    #[arg(long, default_value = "1")]
    speed: u32,
}

/// Observer that writes tracker notifications to the log
struct LoggingObserver;

impl LivesetObserver for LoggingObserver {
    fn on_liveset_changed(&self, item: Option<&PlayableItem>) {
        match item {
            Some(item) => info!(
                "Now tracking liveset {} \"{}\" ({} sub-tracks)",
                item.catalog_id,
                item.title.as_deref().unwrap_or("untitled"),
                item.tracks.len()
            ),
            None => info!("Liveset tracking cleared"),
        }
    }

    fn on_sub_track_changed(&self, track: Option<&SubTrack>) {
        match track {
            Some(track) => info!(
                "Sub-track: {} - {}",
                track.artist.as_deref().unwrap_or("unknown artist"),
                track.title
            ),
            None => info!("Sub-track: (intro)"),
        }
    }

    fn on_prev_next_availability_changed(&self, has_prev: bool, has_next: bool) {
        info!("Sub-track navigation: prev={} next={}", has_prev, has_next);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lsq_queue=debug,lsq_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = QueueConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let db_path = resolve_db_path(args.db_path.as_deref(), &config);
    info!("Manual queue database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    let store = Arc::new(SqliteManualQueueStore::new(pool));

    let catalog: Arc<dyn CatalogLookup> = Arc::new(
        InMemoryCatalog::from_json_file(&args.catalog).context("Failed to load catalog")?,
    );

    let player = SimulatedPlayer::new();
    let (handle, _player_thread) = PlayerHandle::spawn(player.clone(), config.player_event_capacity)
        .context("Failed to start player thread")?;
    let event_bus = EventBus::new(config.event_bus_capacity);

    let manager = Arc::new(QueueManager::new(
        handle.clone(),
        Arc::clone(&catalog),
        store,
        event_bus.clone(),
    ));
    let event_loop = manager.start();

    let restored = manager
        .restore()
        .await
        .context("Failed to restore manual queue")?;
    info!("Session started with {} restored manual entries", restored);

    let tracker = SubTrackTracker::new(handle.clone(), catalog, event_bus, config.progress_interval());
    let observer = tracker.bind(Arc::new(LoggingObserver));

    if let Some(liveset) = args.liveset {
        manager.set_context_from_liveset(liveset, None, true).await;
    }
    for &catalog_id in &args.enqueue {
        if manager.enqueue_next(catalog_id).await.is_none() {
            warn!("Catalog {} could not be queued", catalog_id);
        }
    }

    let step_ms = TICK.as_millis() as u64 * u64::from(args.speed.max(1));
    let mut ticker = tokio::time::interval(TICK);
    let deadline = tokio::time::sleep(Duration::from_secs(args.run_secs));
    tokio::pin!(deadline);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let clock = player.clone();
                if handle.run(move |_| clock.advance_clock(step_ms)).await.is_none() {
                    warn!("Player thread stopped");
                    break;
                }
            }
            _ = &mut deadline => {
                info!("Session time elapsed");
                break;
            }
            _ = &mut shutdown => break,
        }
    }

    tracker.unbind(observer);
    event_loop.abort();
    manager.flush().await;

    let state = manager.state();
    info!(
        "Session finished: {} effective entries ({} manual), current index {}",
        state.effective.len(),
        state.manual.len(),
        state.current_effective_index
    );
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

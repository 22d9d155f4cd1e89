// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `aniqueue serve` command implementation.
//!
//! Opens the SQLite store, connects the AniDB handlers, starts one worker per
//! channel and runs until SIGINT/SIGTERM. Commands left from a previous run
//! are picked up as soon as the workers start. A MyList sync is enqueued on
//! a fixed schedule when `schedule.mylist_sync_hours` is non-zero.

use std::sync::Arc;
use std::time::Duration;

use aniqueue_anidb::AniDbHandlers;
use aniqueue_bus::{BusEvent, EventBus, QueueEvent};
use aniqueue_commands::{builtin_registry, DigestHasher, ReqwestImageFetcher, SyncMyList};
use aniqueue_config::AniqueueConfig;
use aniqueue_core::{AniqueueError, CommandStore, LibraryStore};
use aniqueue_queue::{
    recording, CommandContext, CommandQueues, CommandSettings, EnqueueOutcome, ProcessorSettings,
};
use aniqueue_storage::SqliteStorage;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// Everything a running daemon owns.
pub struct Services {
    pub storage: Arc<SqliteStorage>,
    pub bus: EventBus,
    pub queues: Arc<CommandQueues>,
    pub ctx: Arc<CommandContext>,
}

impl Services {
    /// Wires storage, AniDB handlers, queues and the command context.
    /// Workers are not started.
    pub async fn build(config: &AniqueueConfig) -> Result<Self, AniqueueError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;
        info!(path = %config.storage.database_path, "command store opened");

        let bus = EventBus::new(aniqueue_bus::DEFAULT_CAPACITY);
        let anidb = AniDbHandlers::connect(&config.anidb, bus.clone()).await?;
        if anidb.udp.credentials().is_none() {
            warn!("no AniDB credentials configured, MyList commands will be skipped");
        }

        let queues = Arc::new(CommandQueues::new(
            storage.clone() as Arc<dyn CommandStore>,
            builtin_registry(),
            bus.clone(),
            anidb.ban_controls(),
            ProcessorSettings::from(&config.queue),
        ));

        let images = ReqwestImageFetcher::new(config.anidb.request_timeout())?;
        let ctx = Arc::new(CommandContext {
            queues: queues.clone(),
            anidb,
            library: storage.clone() as Arc<dyn LibraryStore>,
            hasher: Arc::new(DigestHasher),
            images: Arc::new(images),
            settings: CommandSettings::from_config(config),
        });

        Ok(Self {
            storage,
            bus,
            queues,
            ctx,
        })
    }

    pub fn start(&self) {
        self.queues.start(self.ctx.clone());
    }

    /// Stops the workers, logs out of AniDB and closes the store.
    pub async fn shutdown(&self) -> Result<(), AniqueueError> {
        self.queues.shutdown().await;
        self.ctx.anidb.shutdown().await;
        self.storage.close().await
    }
}

/// Runs the `aniqueue serve` command.
pub async fn run_serve(config: AniqueueConfig) -> Result<(), AniqueueError> {
    info!("starting aniqueue serve");
    recording::register_metrics();

    let services = Services::build(&config).await?;
    let cancel = shutdown::install_signal_handler();

    spawn_event_logger(services.bus.subscribe(), cancel.clone());
    shutdown::install_ban_reset_handler(services.queues.clone(), cancel.clone());
    services.start();

    match config.schedule.mylist_sync_period() {
        Some(period) => {
            info!(hours = config.schedule.mylist_sync_hours, "MyList sync scheduled");
            spawn_mylist_schedule(services.queues.clone(), period, cancel.clone());
        }
        None => debug!("MyList sync schedule disabled"),
    }

    for status in services.queues.status().await {
        info!(
            channel = %status.channel,
            pending = status.queue_count,
            "queue ready"
        );
    }

    cancel.cancelled().await;
    info!("shutting down");
    services.shutdown().await?;
    info!("aniqueue stopped");
    Ok(())
}

/// Enqueues a MyList sync every `period`, first one after a full period.
fn spawn_mylist_schedule(queues: Arc<CommandQueues>, period: Duration, cancel: CancellationToken) {
    let now = tokio::time::Instant::now();
    let Some(first) = now.checked_add(period) else {
        warn!(?period, "MyList sync period out of range, schedule disabled");
        return;
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match queues.enqueue(&SyncMyList::new()).await {
                        Ok(EnqueueOutcome::Enqueued(id)) => debug!(id, "scheduled MyList sync enqueued"),
                        Ok(EnqueueOutcome::Duplicate) => debug!("MyList sync already pending"),
                        Err(e) => error!(error = %e, "failed to enqueue scheduled MyList sync"),
                    }
                }
            }
        }
    });
}

/// Mirrors bus events into the log.
fn spawn_event_logger(mut events: broadcast::Receiver<BusEvent>, cancel: CancellationToken) {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => received,
            };
            match received {
                Ok(event) => log_event(&event.event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &QueueEvent) {
    match event {
        QueueEvent::DepthChanged { channel, count } => {
            debug!(%channel, count, "queue depth changed");
        }
        QueueEvent::StateChanged {
            channel,
            state,
            description,
        } => {
            debug!(%channel, %state, %description, "processor state changed");
        }
        QueueEvent::PauseChanged {
            channel, paused, ..
        } => {
            info!(%channel, paused, "channel pause changed");
        }
        QueueEvent::BanChanged {
            kind,
            banned: true,
            expires_at,
        } => {
            warn!(%kind, expires_at = ?expires_at, "AniDB ban detected");
        }
        QueueEvent::BanChanged {
            kind,
            banned: false,
            ..
        } => {
            info!(%kind, "AniDB ban lifted");
        }
    }
}

/// Initializes the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aniqueue={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end queue testing.
//!
//! `QueueHarness` assembles the full scheduler with scripted AniDB
//! transports, an in-memory library and either an in-memory or a temp
//! SQLite command store. Rate limiters run with zero spacing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aniqueue_anidb::rate_limiter::RateLimitSettings;
use aniqueue_anidb::{
    AniDbHandlers, BanTracker, Credentials, HttpConnectionHandler, RateLimiter,
    UdpConnectionHandler,
};
use aniqueue_bus::EventBus;
use aniqueue_commands::{builtin_registry, DigestHasher};
use aniqueue_config::model::StorageConfig;
use aniqueue_core::{
    AniqueueError, BanKind, Channel, CommandStore, CommandType, ProcessorState,
};
use aniqueue_queue::{
    Command, CommandContext, CommandQueues, CommandSettings, EnqueueOutcome, ProcessorSettings,
    QueueProcessor,
};
use aniqueue_storage::SqliteStorage;
use tempfile::TempDir;

use crate::memory::{MemoryCommandStore, MemoryLibrary};
use crate::probe::ProbeLog;
use crate::scripted::{ScriptedHttpTransport, ScriptedUdpTransport, StaticImageFetcher};

/// Base URL handed to image downloads.
pub const IMAGE_BASE_URL: &str = "https://img.test/pics";

/// A throwaway account.
pub fn test_credentials() -> Credentials {
    Credentials {
        username: "tester".to_string(),
        password: "hunter2".to_string(),
        client_name: "aniqueue".to_string(),
        client_version: 1,
    }
}

/// Builder for [`QueueHarness`].
pub struct QueueHarnessBuilder {
    sqlite_path: Option<PathBuf>,
    credentials: Option<Credentials>,
    settings: ProcessorSettings,
    probe_types: Vec<CommandType>,
    file_access_budget: Duration,
    settle_time: Duration,
}

impl QueueHarnessBuilder {
    fn new() -> Self {
        Self {
            sqlite_path: None,
            credentials: Some(test_credentials()),
            settings: ProcessorSettings {
                pause_poll: Duration::from_millis(50),
                pause_timeout: Duration::from_secs(3600),
                requeue_on_ban: true,
            },
            probe_types: Vec::new(),
            file_access_budget: Duration::from_secs(5),
            settle_time: Duration::ZERO,
        }
    }

    /// Persist commands in a SQLite file instead of memory.
    pub fn with_sqlite(mut self, path: impl AsRef<Path>) -> Self {
        self.sqlite_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.credentials = None;
        self
    }

    pub fn with_processor_settings(mut self, settings: ProcessorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Route `command_type` to [`ProbeCommand`](crate::ProbeCommand) instead of its built-in.
    pub fn with_probe(mut self, command_type: CommandType) -> Self {
        self.probe_types.push(command_type);
        self
    }

    pub fn with_hashing_times(mut self, budget: Duration, settle: Duration) -> Self {
        self.file_access_budget = budget;
        self.settle_time = settle;
        self
    }

    /// Assembles the stack. Workers are not started.
    pub async fn build(self) -> Result<QueueHarness, AniqueueError> {
        let dir = TempDir::new().map_err(|e| AniqueueError::io("create temp dir", e))?;
        let bus = EventBus::new(256);

        let (store, memory_store, sqlite) = match self.sqlite_path {
            Some(path) => {
                let storage = Arc::new(SqliteStorage::new(StorageConfig {
                    database_path: path.to_string_lossy().into_owned(),
                    wal_mode: true,
                }));
                storage.initialize().await?;
                (storage.clone() as Arc<dyn CommandStore>, None, Some(storage))
            }
            None => {
                let memory = Arc::new(MemoryCommandStore::new());
                (memory.clone() as Arc<dyn CommandStore>, Some(memory), None)
            }
        };

        let http_transport = Arc::new(ScriptedHttpTransport::new());
        let udp_transport = Arc::new(ScriptedUdpTransport::new());
        let unlimited = || RateLimitSettings::fixed(Duration::ZERO);
        let anidb = AniDbHandlers::new(
            HttpConnectionHandler::new(
                http_transport.clone(),
                RateLimiter::new("http", unlimited()),
                BanTracker::new(BanKind::Http, 24.0, Some(bus.clone())),
            ),
            UdpConnectionHandler::new(
                udp_transport.clone(),
                RateLimiter::new("udp", unlimited()),
                BanTracker::new(BanKind::Udp, 0.5, Some(bus.clone())),
                self.credentials,
            ),
        );

        let probes = ProbeLog::new();
        let mut registry = builtin_registry();
        for command_type in self.probe_types {
            probes.register(&mut registry, command_type);
        }

        let queues = Arc::new(CommandQueues::new(
            store.clone(),
            registry,
            bus.clone(),
            anidb.ban_controls(),
            self.settings,
        ));

        let library = Arc::new(MemoryLibrary::new());
        let images = Arc::new(StaticImageFetcher::default());
        let ctx = Arc::new(CommandContext {
            queues: queues.clone(),
            anidb,
            library: library.clone(),
            hasher: Arc::new(DigestHasher),
            images: images.clone(),
            settings: CommandSettings {
                image_directory: dir.path().join("images"),
                image_base_url: IMAGE_BASE_URL.to_string(),
                file_access_budget: self.file_access_budget,
                settle_time: self.settle_time,
            },
        });

        Ok(QueueHarness {
            queues,
            ctx,
            store,
            memory_store,
            sqlite,
            library,
            http: http_transport,
            udp: udp_transport,
            images,
            probes,
            bus,
            dir,
        })
    }
}

/// A complete scheduler wired to scripted collaborators.
pub struct QueueHarness {
    pub queues: Arc<CommandQueues>,
    pub ctx: Arc<CommandContext>,
    pub store: Arc<dyn CommandStore>,
    /// Set unless the harness was built with SQLite.
    pub memory_store: Option<Arc<MemoryCommandStore>>,
    pub sqlite: Option<Arc<SqliteStorage>>,
    pub library: Arc<MemoryLibrary>,
    pub http: Arc<ScriptedHttpTransport>,
    pub udp: Arc<ScriptedUdpTransport>,
    pub images: Arc<StaticImageFetcher>,
    pub probes: ProbeLog,
    pub bus: EventBus,
    dir: TempDir,
}

impl QueueHarness {
    pub fn builder() -> QueueHarnessBuilder {
        QueueHarnessBuilder::new()
    }

    /// Default harness over an in-memory store.
    pub async fn new() -> Result<Self, AniqueueError> {
        Self::builder().build().await
    }

    /// Scratch directory removed when the harness drops.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn processor(&self, channel: Channel) -> &Arc<QueueProcessor> {
        self.queues.processor(channel)
    }

    pub fn start(&self) {
        self.queues.start(self.ctx.clone());
    }

    pub async fn enqueue(&self, command: &dyn Command) -> Result<EnqueueOutcome, AniqueueError> {
        self.queues.enqueue(command).await
    }

    /// Pending records on `channel`, claimed ones included.
    pub async fn pending(&self, channel: Channel) -> u64 {
        self.store.count_for(channel).await.unwrap_or(u64::MAX)
    }

    /// Polls until every channel is empty and no command is running.
    /// Returns `false` on timeout.
    pub async fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut drained = true;
            for channel in Channel::ALL {
                let running = self.processor(channel).state() == ProcessorState::Running;
                if running || self.pending(channel).await > 0 {
                    drained = false;
                    break;
                }
            }
            if drained {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Polls `condition` until it holds. Returns `false` on timeout.
    pub async fn wait_until<F>(&self, timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        while !condition() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }

    /// Stops the workers and closes SQLite, if used.
    pub async fn shutdown(&self) {
        self.queues.shutdown().await;
        if let Some(sqlite) = &self.sqlite {
            let _ = sqlite.close().await;
        }
    }
}

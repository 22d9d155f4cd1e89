// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `aniqueue enqueue` and `aniqueue clear`.
//!
//! Both attach to the command store directly and leave claims alone. No
//! workers are started here; a running daemon picks new rows up on its next
//! drain pass.

use std::path::PathBuf;
use std::sync::Arc;

use aniqueue_bus::EventBus;
use aniqueue_commands::{
    builtin_registry, GetAnimeHttp, HashFile, ProcessFile, SyncMyList, UpdateWatched,
};
use aniqueue_config::AniqueueConfig;
use aniqueue_core::{AniqueueError, Channel, CommandStore};
use aniqueue_queue::{Command, CommandQueues, EnqueueOutcome, ProcessorSettings};
use aniqueue_storage::SqliteStorage;
use tracing::info;

/// A command requested from the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueRequest {
    Hash(PathBuf),
    Process(PathBuf),
    Anime(u64),
    SyncMyList,
    Watched { sha256: String, watched: bool },
}

impl EnqueueRequest {
    fn into_command(self) -> Box<dyn Command> {
        match self {
            Self::Hash(path) => Box::new(HashFile::new(absolute(path))),
            Self::Process(path) => Box::new(ProcessFile::new(absolute(path))),
            Self::Anime(anime_id) => Box::new(GetAnimeHttp::new(anime_id)),
            Self::SyncMyList => Box::new(SyncMyList::new()),
            Self::Watched { sha256, watched } => Box::new(UpdateWatched::new(sha256, watched)),
        }
    }
}

/// Library paths are stored as given, so relative ones are resolved first.
fn absolute(path: PathBuf) -> String {
    std::path::absolute(&path)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Store plus idle processors, enough to enqueue and clear.
struct OfflineQueues {
    storage: Arc<SqliteStorage>,
    queues: CommandQueues,
}

impl OfflineQueues {
    async fn open(config: &AniqueueConfig) -> Result<Self, AniqueueError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.attach().await?;
        let queues = CommandQueues::new(
            storage.clone() as Arc<dyn CommandStore>,
            builtin_registry(),
            EventBus::new(aniqueue_bus::DEFAULT_CAPACITY),
            Vec::new(),
            ProcessorSettings::from(&config.queue),
        );
        Ok(Self { storage, queues })
    }

    async fn close(self) -> Result<(), AniqueueError> {
        self.storage.close().await
    }
}

pub async fn enqueue(
    config: &AniqueueConfig,
    request: EnqueueRequest,
) -> Result<EnqueueOutcome, AniqueueError> {
    let offline = OfflineQueues::open(config).await?;
    let command = request.into_command();
    let outcome = offline.queues.enqueue(command.as_ref()).await;
    offline.close().await?;
    outcome
}

/// Run the `aniqueue enqueue` command.
pub async fn run_enqueue(
    config: &AniqueueConfig,
    request: EnqueueRequest,
) -> Result<(), AniqueueError> {
    match enqueue(config, request).await? {
        EnqueueOutcome::Enqueued(id) => {
            info!(id, "command enqueued");
            println!("enqueued (id {id})");
        }
        EnqueueOutcome::Duplicate => println!("already queued, nothing added"),
    }
    Ok(())
}

/// Run the `aniqueue clear <channel>` command.
pub async fn run_clear(config: &AniqueueConfig, channel: Channel) -> Result<(), AniqueueError> {
    let offline = OfflineQueues::open(config).await?;
    let removed = offline.queues.clear(channel).await;
    offline.close().await?;
    println!("removed {} command(s) from {channel}", removed?);
    Ok(())
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Everything a command may touch while it executes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aniqueue_anidb::AniDbHandlers;
use aniqueue_config::model::AniqueueConfig;
use aniqueue_core::{AniqueueError, FileHasher, ImageFetcher, LibraryStore};
use tokio_util::sync::CancellationToken;

use crate::command::Command;
use crate::queues::{CommandQueues, EnqueueOutcome};

/// Command-facing settings derived from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSettings {
    pub image_directory: PathBuf,
    pub image_base_url: String,
    /// How long a hash command waits for its file to become readable.
    pub file_access_budget: Duration,
    /// How long a file's size must stay unchanged before it is hashed.
    pub settle_time: Duration,
}

impl CommandSettings {
    pub fn from_config(config: &AniqueueConfig) -> Self {
        Self {
            image_directory: PathBuf::from(&config.images.directory),
            image_base_url: config.images.anidb_image_base_url.clone(),
            file_access_budget: Duration::from_secs(config.hashing.file_access_budget_secs),
            settle_time: Duration::from_secs(config.hashing.settle_secs),
        }
    }
}

/// Shared services handed to [`Command::execute`].
///
/// Built once at startup; processors hold it for their whole life.
pub struct CommandContext {
    pub queues: Arc<CommandQueues>,
    pub anidb: AniDbHandlers,
    pub library: Arc<dyn LibraryStore>,
    pub hasher: Arc<dyn FileHasher>,
    pub images: Arc<dyn ImageFetcher>,
    pub settings: CommandSettings,
}

impl CommandContext {
    /// Enqueues a follow-up command.
    pub async fn enqueue(&self, command: &dyn Command) -> Result<EnqueueOutcome, AniqueueError> {
        self.queues.enqueue(command).await
    }

    /// Cancelled on shutdown. Long waits inside commands should observe it.
    pub fn cancel_token(&self) -> &CancellationToken {
        self.queues.cancel_token()
    }
}

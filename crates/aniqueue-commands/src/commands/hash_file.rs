// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hashes a local file and hands it on for AniDB lookup.

use std::path::Path;
use std::time::Duration;

use aniqueue_core::{AniqueueError, CommandType};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::process_file::ProcessFile;
use super::{expected_failures_handled, file_name};

/// Interval between readability checks while waiting for a file.
const ACCESS_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashFile {
    pub path: String,
    /// Re-hash even when the index already has an entry of the same size.
    #[serde(default)]
    pub force: bool,
}

impl HashFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            force: false,
        }
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        let path = Path::new(&self.path);
        let size = wait_until_settled(
            path,
            ctx.settings.file_access_budget,
            ctx.settings.settle_time,
            ctx.cancel_token(),
        )
        .await?;

        let cached = ctx.library.file_hash(&self.path).await?;
        match cached {
            Some(existing) if !self.force && existing.size == size => {
                debug!(path = %self.path, "hash already recorded");
            }
            _ => {
                let hash = ctx.hasher.hash_file(path).await?;
                ctx.library.record_file_hash(&hash).await?;
                info!(path = %self.path, sha256 = %hash.sha256, "file hashed");
            }
        }

        ctx.enqueue(&ProcessFile::new(self.path.clone())).await?;
        Ok(())
    }
}

/// Waits until `path` opens for reading and its size holds still for `settle`.
///
/// Returns the settled size. Gives up with a command error once `budget` is spent.
async fn wait_until_settled(
    path: &Path,
    budget: Duration,
    settle: Duration,
    cancel: &CancellationToken,
) -> Result<u64, AniqueueError> {
    let deadline = Instant::now() + budget;
    loop {
        if let Some(size) = readable_size(path).await {
            pause(settle, cancel).await?;
            if readable_size(path).await == Some(size) {
                return Ok(size);
            }
            debug!(path = %path.display(), "file still growing");
        }

        if Instant::now() >= deadline {
            return Err(AniqueueError::Command {
                message: format!(
                    "{} not accessible within {}s",
                    path.display(),
                    budget.as_secs()
                ),
            });
        }
        pause(ACCESS_POLL, cancel).await?;
    }
}

async fn readable_size(path: &Path) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    tokio::fs::File::open(path).await.ok()?;
    Some(metadata.len())
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), AniqueueError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(AniqueueError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[async_trait]
impl Command for HashFile {
    fn command_type(&self) -> CommandType {
        CommandType::HashFile
    }

    fn key(&self) -> String {
        format!("HashFile_{}", self.path)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        format!("Hashing file: {}", file_name(&self.path))
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

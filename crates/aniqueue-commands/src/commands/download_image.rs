// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downloads an image into the local image directory.

use std::path::{Path, PathBuf};

use aniqueue_core::{AniqueueError, CommandType};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use super::expected_failures_handled;

/// What an image belongs to. Also the sub-directory it is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageEntity {
    AnimeCover,
    Character,
    Creator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadImage {
    pub entity: ImageEntity,
    pub entity_id: u64,
    pub url: String,
    /// Download even if the file exists.
    #[serde(default)]
    pub force: bool,
}

impl DownloadImage {
    pub fn new(entity: ImageEntity, entity_id: u64, url: impl Into<String>) -> Self {
        Self {
            entity,
            entity_id,
            url: url.into(),
            force: false,
        }
    }

    /// Where the image is written under `image_directory`.
    pub fn destination(&self, image_directory: &Path) -> PathBuf {
        let name = self
            .url
            .rsplit('/')
            .next()
            .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.jpg", self.entity_id));
        image_directory.join(self.entity.to_string()).join(name)
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        let destination = self.destination(&ctx.settings.image_directory);
        if !self.force && tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            debug!(path = %destination.display(), "image already present");
            return Ok(());
        }

        let bytes = ctx.images.fetch(&self.url).await?;
        if bytes.is_empty() {
            return Err(AniqueueError::Command {
                message: format!("empty image from {}", self.url),
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AniqueueError::io(format!("cannot create {}", parent.display()), e))?;
        }
        // Write aside and rename so a crash never leaves a truncated image in place.
        let partial = destination.with_extension("part");
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| AniqueueError::io(format!("cannot write {}", partial.display()), e))?;
        tokio::fs::rename(&partial, &destination)
            .await
            .map_err(|e| AniqueueError::io(format!("cannot move {}", partial.display()), e))?;

        info!(path = %destination.display(), bytes = bytes.len(), "image downloaded");
        Ok(())
    }
}

#[async_trait]
impl Command for DownloadImage {
    fn command_type(&self) -> CommandType {
        CommandType::DownloadImage
    }

    fn key(&self) -> String {
        format!("DownloadImage_{}_{}", self.entity, self.entity_id)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        format!("Downloading image: {}", self.url)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

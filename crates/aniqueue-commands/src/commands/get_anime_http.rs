// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetches full anime metadata from the HTTP API.

use aniqueue_core::{AniqueueError, CommandType};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::download_image::{DownloadImage, ImageEntity};
use super::expected_failures_handled;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAnimeHttp {
    pub anime_id: u64,
    /// Fetch even if the XML is already cached.
    #[serde(default)]
    pub force: bool,
}

impl GetAnimeHttp {
    pub fn new(anime_id: u64) -> Self {
        Self {
            anime_id,
            force: false,
        }
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        if !self.force && ctx.library.anime_xml(self.anime_id).await?.is_some() {
            debug!(anime_id = self.anime_id, "anime already cached");
            return Ok(());
        }

        let body = ctx
            .anidb
            .http
            .get(&format!("request=anime&aid={}", self.anime_id))
            .await?;

        if let Some(error) = element_text(&body, "error") {
            return Err(AniqueueError::Command {
                message: format!("AniDB refused anime {}: {error}", self.anime_id),
            });
        }

        ctx.library.store_anime_xml(self.anime_id, &body).await?;
        info!(anime_id = self.anime_id, bytes = body.len(), "anime metadata cached");

        if let Some(picture) = element_text(&body, "picture") {
            let url = format!(
                "{}/{}",
                ctx.settings.image_base_url.trim_end_matches('/'),
                picture
            );
            ctx.enqueue(&DownloadImage::new(ImageEntity::AnimeCover, self.anime_id, url))
                .await?;
        }
        Ok(())
    }
}

/// Text of the first `<name>` element, without parsing the document.
fn element_text<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let mut search = 0;
    while let Some(found) = xml[search..].find(&open) {
        let tag_start = search + found;
        let after_name = tag_start + open.len();
        // Skip `<pictures>` when looking for `<picture>`.
        match xml[after_name..].chars().next() {
            Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r') => {}
            _ => {
                search = after_name;
                continue;
            }
        }
        let content_start = after_name + xml[after_name..].find('>')? + 1;
        let content_end = content_start + xml[content_start..].find(&close)?;
        let text = xml[content_start..content_end].trim();
        return (!text.is_empty()).then_some(text);
    }
    None
}

#[async_trait]
impl Command for GetAnimeHttp {
    fn command_type(&self) -> CommandType {
        CommandType::GetAnimeHttp
    }

    fn key(&self) -> String {
        format!("GetAnimeHttp_{}", self.anime_id)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        format!("Getting anime info from HTTP API: {}", self.anime_id)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

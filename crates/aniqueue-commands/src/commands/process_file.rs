// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifies a hashed file on AniDB and schedules what follows from that.

use aniqueue_core::{AniqueueError, CommandType, FileHash, FileLink};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::add_file_to_mylist::AddFileToMyList;
use super::get_anime_http::GetAnimeHttp;
use super::hash_file::HashFile;
use super::{expected_failures_handled, file_name};

/// `fmask` selecting anime id, episode id and group id after the file id.
const FILE_FMASK: &str = "7000000000";
const FILE_FOUND: u16 = 220;
const NO_SUCH_FILE: u16 = 320;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFile {
    pub path: String,
}

impl ProcessFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        let Some(hash) = ctx.library.file_hash(&self.path).await? else {
            debug!(path = %self.path, "file not hashed yet");
            ctx.enqueue(&HashFile::new(self.path.clone())).await?;
            return Ok(());
        };

        let link = match ctx.library.file_link(&hash.sha256).await? {
            Some(link) => link,
            None => match lookup(ctx, &hash).await? {
                Some(link) => {
                    ctx.library.record_file_link(&link).await?;
                    info!(
                        path = %self.path,
                        file_id = link.file_id,
                        anime_id = link.anime_id,
                        "file identified"
                    );
                    link
                }
                None => return Ok(()),
            },
        };

        if ctx.library.anime_xml(link.anime_id).await?.is_none() {
            ctx.enqueue(&GetAnimeHttp::new(link.anime_id)).await?;
        }

        let listed = ctx
            .library
            .mylist_state(&hash.sha256)
            .await?
            .is_some_and(|state| state.mylist_id.is_some());
        if !listed {
            ctx.enqueue(&AddFileToMyList::new(hash.sha256.clone())).await?;
        }
        Ok(())
    }
}

/// Asks AniDB for the file by size and ED2K digest.
async fn lookup(ctx: &CommandContext, hash: &FileHash) -> Result<Option<FileLink>, AniqueueError> {
    let Some(ed2k) = &hash.ed2k else {
        info!(path = %hash.path, "no ED2K digest, AniDB lookup skipped");
        return Ok(None);
    };

    let response = ctx
        .anidb
        .udp
        .send_authenticated(&format!(
            "FILE size={}&ed2k={}&fmask={FILE_FMASK}&amask=00000000",
            hash.size, ed2k
        ))
        .await?;

    match response.code {
        FILE_FOUND => {
            let fields = response.fields();
            let parse = |i: usize| fields.get(i).and_then(|f| f.parse::<u64>().ok());
            match (parse(0), parse(1), parse(2)) {
                (Some(file_id), Some(anime_id), Some(episode_id)) => Ok(Some(FileLink {
                    sha256: hash.sha256.clone(),
                    file_id,
                    anime_id,
                    episode_id,
                })),
                _ => Err(AniqueueError::Command {
                    message: format!("unexpected FILE reply: {:?}", response.lines),
                }),
            }
        }
        NO_SUCH_FILE => {
            info!(path = %hash.path, "file unknown to AniDB");
            Ok(None)
        }
        code => {
            warn!(path = %hash.path, code, message = %response.message, "FILE lookup refused");
            Ok(None)
        }
    }
}

#[async_trait]
impl Command for ProcessFile {
    fn command_type(&self) -> CommandType {
        CommandType::ProcessFile
    }

    fn key(&self) -> String {
        format!("ProcessFile_{}", self.path)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        format!("Processing file: {}", file_name(&self.path))
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

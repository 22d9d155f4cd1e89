// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sets the watched flag of a file's MyList entry.
//!
//! Never de-duplicated: a user toggling watched on and off must see the
//! toggles applied in order.

use aniqueue_core::{AniqueueError, CommandType};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::add_file_to_mylist::AddFileToMyList;
use super::expected_failures_handled;

const MYLIST_ENTRY_EDITED: u16 = 311;
const NO_SUCH_MYLIST_ENTRY: u16 = 411;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWatched {
    pub sha256: String,
    pub watched: bool,
}

impl UpdateWatched {
    pub fn new(sha256: impl Into<String>, watched: bool) -> Self {
        Self {
            sha256: sha256.into(),
            watched,
        }
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        let Some(link) = ctx.library.file_link(&self.sha256).await? else {
            return Err(AniqueueError::Command {
                message: format!("file {} has not been identified", self.sha256),
            });
        };

        let response = ctx
            .anidb
            .udp
            .send_authenticated(&format!(
                "MYLISTADD fid={}&edit=1&viewed={}",
                link.file_id,
                u8::from(self.watched)
            ))
            .await?;

        match response.code {
            MYLIST_ENTRY_EDITED => {
                ctx.library.set_watched(&self.sha256, self.watched).await?;
                info!(file_id = link.file_id, watched = self.watched, "watched state updated");
            }
            NO_SUCH_MYLIST_ENTRY => {
                warn!(file_id = link.file_id, "file not in MyList, adding it first");
                ctx.enqueue(&AddFileToMyList::new(self.sha256.clone())).await?;
            }
            code => {
                warn!(file_id = link.file_id, code, message = %response.message, "MYLISTADD edit refused");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Command for UpdateWatched {
    fn command_type(&self) -> CommandType {
        CommandType::UpdateWatched
    }

    fn key(&self) -> String {
        format!("UpdateWatched_{}", self.sha256)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        let state = if self.watched { "watched" } else { "unwatched" };
        format!("Marking {} as {state}", self.sha256)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

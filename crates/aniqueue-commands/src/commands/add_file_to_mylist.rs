// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adds an identified file to the account's MyList.

use aniqueue_core::{AniqueueError, CommandType};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::expected_failures_handled;

const MYLIST_ENTRY_ADDED: u16 = 210;
const FILE_ALREADY_IN_MYLIST: u16 = 310;
const NO_SUCH_FILE: u16 = 320;

/// MyList storage state "internal storage (HDD)".
const STATE_ON_HDD: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFileToMyList {
    /// SHA-256 of the file, as recorded in the hash index.
    pub sha256: String,
}

impl AddFileToMyList {
    pub fn new(sha256: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
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
                "MYLISTADD fid={}&state={STATE_ON_HDD}",
                link.file_id
            ))
            .await?;

        match response.code {
            MYLIST_ENTRY_ADDED | FILE_ALREADY_IN_MYLIST => {
                let mylist_id = response
                    .fields()
                    .first()
                    .and_then(|lid| lid.parse::<u64>().ok());
                ctx.library.mark_in_mylist(&self.sha256, mylist_id).await?;
                info!(file_id = link.file_id, ?mylist_id, "file in MyList");
            }
            NO_SUCH_FILE => {
                warn!(file_id = link.file_id, "AniDB does not know this file");
            }
            code => {
                warn!(file_id = link.file_id, code, message = %response.message, "MYLISTADD refused");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Command for AddFileToMyList {
    fn command_type(&self) -> CommandType {
        CommandType::AddFileToMyList
    }

    fn key(&self) -> String {
        format!("AddFileToMyList_{}", self.sha256)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        format!("Adding file to MyList: {}", self.sha256)
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

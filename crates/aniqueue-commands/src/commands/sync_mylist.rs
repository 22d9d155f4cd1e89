// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pulls the account's MyList summary from the HTTP API.

use aniqueue_core::{AniqueueError, CommandType};
use aniqueue_queue::{Command, CommandContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::expected_failures_handled;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMyList {}

impl SyncMyList {
    pub fn new() -> Self {
        Self {}
    }

    async fn run(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        let Some(credentials) = ctx.anidb.udp.credentials() else {
            return Err(AniqueueError::Auth {
                message: "MyList sync needs AniDB credentials".to_string(),
            });
        };

        let body = ctx
            .anidb
            .http
            .get(&format!(
                "request=mylistsummary&user={}&pass={}",
                credentials.username, credentials.password
            ))
            .await?;
        if body.contains("<error") {
            return Err(AniqueueError::Command {
                message: "AniDB refused the MyList request".to_string(),
            });
        }

        ctx.library.store_mylist_xml(&body).await?;
        info!(bytes = body.len(), "MyList synced");
        Ok(())
    }
}

#[async_trait]
impl Command for SyncMyList {
    fn command_type(&self) -> CommandType {
        CommandType::SyncMyList
    }

    fn key(&self) -> String {
        "SyncMyList".to_string()
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        "Syncing MyList".to_string()
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        expected_failures_handled(&self.key(), self.run(ctx).await)
    }
}

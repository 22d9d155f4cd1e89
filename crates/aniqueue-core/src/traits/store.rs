// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable persistence of pending commands.

use async_trait::async_trait;

use crate::error::AniqueueError;
use crate::types::{Channel, CommandRecord, NewCommand};

/// Durable store of pending commands shared by every channel and producer.
///
/// Implementations must tolerate concurrent `save`, `next_for` and `delete`
/// calls from different tasks.
#[async_trait]
pub trait CommandStore: Send + Sync + 'static {
    /// Persists a command and returns its id.
    async fn save(&self, command: &NewCommand) -> Result<i64, AniqueueError>;

    /// Persists a command unless one with the same key is pending.
    ///
    /// Returns `None` when an existing record made this a duplicate. Backends
    /// that can do the check and insert atomically should override this.
    async fn save_unique(&self, command: &NewCommand) -> Result<Option<i64>, AniqueueError> {
        if self.get_by_key(&command.key).await?.is_some() {
            return Ok(None);
        }
        self.save(command).await.map(Some)
    }

    /// Returns the oldest pending record with this key, claimed or not.
    async fn get_by_key(&self, key: &str) -> Result<Option<CommandRecord>, AniqueueError>;

    /// Claims and returns the next record for `channel`.
    ///
    /// Ordered by priority ascending, then enqueue time ascending. A record
    /// returned here is not handed out again until it is deleted or the store
    /// is reopened.
    async fn next_for(&self, channel: Channel) -> Result<Option<CommandRecord>, AniqueueError>;

    /// Number of pending records for `channel`, including a claimed one.
    async fn count_for(&self, channel: Channel) -> Result<u64, AniqueueError>;

    /// Deletes a record. Deleting an unknown id is not an error.
    async fn delete(&self, id: i64) -> Result<(), AniqueueError>;

    /// Deletes every pending record for `channel` and returns how many went.
    async fn clear(&self, channel: Channel) -> Result<u64, AniqueueError>;
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The unit of work executed by a queue processor.

use async_trait::async_trait;

use aniqueue_core::{AniqueueError, Channel, CommandType, NewCommand};

use crate::context::CommandContext;

/// A typed, serializable piece of work bound to one channel.
///
/// Implementations are rebuilt from their payload by the
/// [`CommandRegistry`](crate::factory::CommandRegistry), so `to_payload` must
/// capture everything `execute` needs after a restart.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    fn command_type(&self) -> CommandType;

    /// Identity used for de-duplication. Must be a pure function of the fields.
    fn key(&self) -> String;

    /// Serialized state, normally JSON.
    fn to_payload(&self) -> Result<String, AniqueueError>;

    /// Short human-readable description for status displays.
    fn describe(&self) -> String;

    /// Performs the work.
    ///
    /// Expected failures (missing file, remote errors, bad data) should be
    /// logged and swallowed. [`AniqueueError::Banned`] must be returned as-is
    /// so the processor can pause the channel.
    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError>;

    fn priority(&self) -> i32 {
        self.command_type().default_priority()
    }

    fn channel(&self) -> Channel {
        self.command_type().channel()
    }

    /// Whether a ban that interrupts this command puts it back on the queue.
    fn requeue_on_ban(&self) -> bool {
        true
    }

    /// The record persisted for this command.
    fn to_new_command(&self) -> Result<NewCommand, AniqueueError> {
        let ty = self.command_type();
        Ok(NewCommand {
            key: self.key(),
            command_type: ty.tag(),
            channel: ty.channel(),
            priority: self.priority(),
            payload: self.to_payload()?,
        })
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rebuilds commands from stored records.
//!
//! A registration table from type tag to constructor, filled once at startup.
//! Resolution never panics: a tag nobody registered and a payload that does
//! not decode are reported as outcomes the processor can log and skip.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aniqueue_core::{AniqueueError, CommandRecord, CommandType};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::command::Command;

/// Builds a command from its payload.
pub type Constructor =
    Arc<dyn Fn(&str) -> Result<Box<dyn Command>, AniqueueError> + Send + Sync>;

/// Outcome of [`CommandRegistry::resolve`].
pub enum Resolved {
    Command(Box<dyn Command>),
    /// The tag is not a known type, or no constructor is registered for it.
    UnknownType(i32),
    /// The constructor rejected the payload.
    Malformed {
        command_type: CommandType,
        reason: String,
    },
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Command(cmd) => f.debug_tuple("Command").field(&cmd.key()).finish(),
            Resolved::UnknownType(tag) => f.debug_tuple("UnknownType").field(tag).finish(),
            Resolved::Malformed {
                command_type,
                reason,
            } => f
                .debug_struct("Malformed")
                .field("command_type", command_type)
                .field("reason", reason)
                .finish(),
        }
    }
}

#[derive(Default, Clone)]
pub struct CommandRegistry {
    constructors: HashMap<CommandType, Constructor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `constructor` for `command_type`, replacing any previous entry.
    pub fn register<F>(&mut self, command_type: CommandType, constructor: F)
    where
        F: Fn(&str) -> Result<Box<dyn Command>, AniqueueError> + Send + Sync + 'static,
    {
        debug!(%command_type, "command type registered");
        self.constructors.insert(command_type, Arc::new(constructor));
    }

    /// Registers a command whose payload is its own JSON serialization.
    pub fn register_json<C>(&mut self, command_type: CommandType)
    where
        C: Command + DeserializeOwned,
    {
        self.register(command_type, |payload| {
            let command: C = serde_json::from_str(payload)?;
            Ok(Box::new(command))
        });
    }

    pub fn is_registered(&self, command_type: CommandType) -> bool {
        self.constructors.contains_key(&command_type)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    pub fn resolve(&self, record: &CommandRecord) -> Resolved {
        let Some(command_type) = record.typed() else {
            return Resolved::UnknownType(record.command_type);
        };
        let Some(constructor) = self.constructors.get(&command_type) else {
            return Resolved::UnknownType(record.command_type);
        };
        match constructor(&record.payload) {
            Ok(command) => Resolved::Command(command),
            Err(e) => Resolved::Malformed {
                command_type,
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandContext;
    use aniqueue_core::Channel;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Noop {
        target: String,
    }

    #[async_trait]
    impl Command for Noop {
        fn command_type(&self) -> CommandType {
            CommandType::SyncMyList
        }
        fn key(&self) -> String {
            format!("Noop_{}", self.target)
        }
        fn to_payload(&self) -> Result<String, AniqueueError> {
            Ok(serde_json::to_string(self)?)
        }
        fn describe(&self) -> String {
            "noop".into()
        }
        async fn execute(&self, _ctx: &CommandContext) -> Result<(), AniqueueError> {
            Ok(())
        }
    }

    fn record(tag: i32, payload: &str) -> CommandRecord {
        CommandRecord {
            id: 1,
            key: "k".into(),
            command_type: tag,
            channel: Channel::General,
            priority: 7,
            payload: payload.into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register_json::<Noop>(CommandType::SyncMyList);
        registry
    }

    #[test]
    fn resolves_registered_type() {
        let resolved = registry().resolve(&record(5, r#"{"target":"x"}"#));
        match resolved {
            Resolved::Command(cmd) => assert_eq!(cmd.key(), "Noop_x"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_a_signal_not_a_panic() {
        assert!(matches!(
            registry().resolve(&record(4242, "{}")),
            Resolved::UnknownType(4242)
        ));
        // Known tag without a constructor.
        assert!(matches!(
            registry().resolve(&record(CommandType::HashFile.tag(), "{}")),
            Resolved::UnknownType(2)
        ));
    }

    #[test]
    fn bad_payload_is_malformed() {
        match registry().resolve(&record(5, "not json")) {
            Resolved::Malformed { command_type, .. } => {
                assert_eq!(command_type, CommandType::SyncMyList)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn new_command_uses_type_defaults() {
        let cmd = Noop {
            target: "a".into(),
        };
        let new = cmd.to_new_command().unwrap();
        assert_eq!(new.channel, Channel::General);
        assert_eq!(new.priority, 7);
        assert_eq!(new.key, "Noop_a");
        assert_eq!(new.payload, r#"{"target":"a"}"#);
    }
}

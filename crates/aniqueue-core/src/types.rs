// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the aniqueue workspace.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the three independent work queues.
///
/// Every [`CommandType`] belongs to exactly one channel. Each channel has its
/// own worker and never waits on another channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    /// Metadata lookups and MyList maintenance against AniDB.
    General,
    /// Local file hashing.
    Hasher,
    /// Image downloads.
    Images,
}

impl Channel {
    /// All channels in a stable order.
    pub const ALL: [Channel; 3] = [Channel::General, Channel::Hasher, Channel::Images];

    /// The value stored in the `channel` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::General => "general",
            Channel::Hasher => "hasher",
            Channel::Images => "images",
        }
    }
}

/// Which AniDB transport a ban applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
pub enum BanKind {
    Http,
    Udp,
}

/// Closed set of command types known to this build.
///
/// The numeric tag is what gets persisted. Tags are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[repr(i32)]
pub enum CommandType {
    ProcessFile = 1,
    HashFile = 2,
    DownloadImage = 3,
    GetAnimeHttp = 4,
    SyncMyList = 5,
    AddFileToMyList = 6,
    UpdateWatched = 7,
}

impl CommandType {
    /// The persisted numeric tag.
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Look up a type by its persisted tag. Unknown tags return `None`.
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(CommandType::ProcessFile),
            2 => Some(CommandType::HashFile),
            3 => Some(CommandType::DownloadImage),
            4 => Some(CommandType::GetAnimeHttp),
            5 => Some(CommandType::SyncMyList),
            6 => Some(CommandType::AddFileToMyList),
            7 => Some(CommandType::UpdateWatched),
            _ => None,
        }
    }

    /// The channel that executes commands of this type.
    pub fn channel(self) -> Channel {
        match self {
            CommandType::HashFile => Channel::Hasher,
            CommandType::DownloadImage => Channel::Images,
            CommandType::ProcessFile
            | CommandType::GetAnimeHttp
            | CommandType::SyncMyList
            | CommandType::AddFileToMyList
            | CommandType::UpdateWatched => Channel::General,
        }
    }

    /// Fixed scheduling priority. Lower runs first.
    pub fn default_priority(self) -> i32 {
        match self {
            CommandType::GetAnimeHttp | CommandType::DownloadImage => 2,
            CommandType::ProcessFile => 3,
            CommandType::HashFile => 4,
            CommandType::AddFileToMyList | CommandType::UpdateWatched => 6,
            CommandType::SyncMyList => 7,
        }
    }

    /// Watched-status toggles must replay in order, so they skip key de-duplication.
    pub fn allows_duplicates(self) -> bool {
        matches!(self, CommandType::UpdateWatched)
    }
}

/// A command about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommand {
    pub key: String,
    pub command_type: i32,
    pub channel: Channel,
    pub priority: i32,
    pub payload: String,
}

impl NewCommand {
    /// Build a record for `command_type`, deriving channel and priority from the type.
    pub fn new(command_type: CommandType, key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            command_type: command_type.tag(),
            channel: command_type.channel(),
            priority: command_type.default_priority(),
            payload: payload.into(),
        }
    }
}

/// A persisted command as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: i64,
    pub key: String,
    pub command_type: i32,
    pub channel: Channel,
    pub priority: i32,
    pub payload: String,
    /// ISO 8601 enqueue time with millisecond precision.
    pub updated_at: String,
}

impl CommandRecord {
    /// The typed command type, or `None` for tags this build does not know.
    pub fn typed(&self) -> Option<CommandType> {
        CommandType::from_tag(self.command_type)
    }
}

/// Lifecycle of a queue processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    /// No work in progress; waiting for a notification.
    Idle,
    /// Draining the channel.
    Running,
    /// Not pulling new work.
    Paused,
    /// Shut down. Terminal.
    Stopped,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorState::Idle => write!(f, "idle"),
            ProcessorState::Running => write!(f, "running"),
            ProcessorState::Paused => write!(f, "paused"),
            ProcessorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// An entry in the shared file hash index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub path: String,
    pub size: u64,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
    /// Hex ED2K digest, when the hasher in use computes one. AniDB lookups need it.
    pub ed2k: Option<String>,
}

/// The AniDB identity of a hashed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLink {
    pub sha256: String,
    pub file_id: u64,
    pub anime_id: u64,
    pub episode_id: u64,
}

/// Local view of a file's MyList entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyListState {
    pub mylist_id: Option<u64>,
    pub watched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn every_type_round_trips_through_its_tag() {
        for ty in CommandType::iter() {
            assert_eq!(CommandType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(CommandType::from_tag(0), None);
        assert_eq!(CommandType::from_tag(999), None);
    }

    #[test]
    fn only_watched_status_allows_duplicates() {
        let dupes: Vec<_> = CommandType::iter().filter(|t| t.allows_duplicates()).collect();
        assert_eq!(dupes, vec![CommandType::UpdateWatched]);
    }

    #[test]
    fn channel_routing() {
        assert_eq!(CommandType::HashFile.channel(), Channel::Hasher);
        assert_eq!(CommandType::DownloadImage.channel(), Channel::Images);
        assert_eq!(CommandType::GetAnimeHttp.channel(), Channel::General);
        assert_eq!(CommandType::UpdateWatched.channel(), Channel::General);
    }

    #[test]
    fn known_priorities() {
        assert_eq!(CommandType::HashFile.default_priority(), 4);
        assert_eq!(CommandType::DownloadImage.default_priority(), 2);
        assert!(
            CommandType::GetAnimeHttp.default_priority()
                < CommandType::SyncMyList.default_priority()
        );
    }

    #[test]
    fn new_command_derives_channel_and_priority() {
        let cmd = NewCommand::new(CommandType::HashFile, "HashFile_/a.mkv", "{}");
        assert_eq!(cmd.channel, Channel::Hasher);
        assert_eq!(cmd.priority, 4);
        assert_eq!(cmd.command_type, 2);
    }

    #[test]
    fn channel_string_forms_agree() {
        for channel in Channel::ALL {
            assert_eq!(channel.to_string(), channel.as_str());
            assert_eq!(Channel::from_str(channel.as_str()).unwrap(), channel);
        }
    }

    #[test]
    fn ban_kind_displays_uppercase() {
        assert_eq!(BanKind::Http.to_string(), "HTTP");
        assert_eq!(BanKind::Udp.to_string(), "UDP");
    }

    #[test]
    fn record_with_unknown_tag_is_untyped() {
        let rec = CommandRecord {
            id: 1,
            key: "x".into(),
            command_type: 4242,
            channel: Channel::General,
            priority: 5,
            payload: "{}".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert!(rec.typed().is_none());
    }

    proptest::proptest! {
        #[test]
        fn from_tag_never_panics(tag in proptest::prelude::any::<i32>()) {
            let _ = CommandType::from_tag(tag);
        }
    }
}

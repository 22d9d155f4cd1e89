// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the aniqueue command scheduler.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::BanKind;

/// The primary error type used across all aniqueue traits and core operations.
#[derive(Debug, Error)]
pub enum AniqueueError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The AniDB transport is banned. No outbound call was made.
    #[error("AniDB {kind} ban in effect{}", format_expiry(.expires_at))]
    Banned {
        kind: BanKind,
        expires_at: Option<DateTime<Utc>>,
    },

    /// Transport-level failures (socket errors, HTTP status, timeouts inside the client).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote service answered with a status that is not usable.
    #[error("AniDB returned {code}: {message}")]
    Remote { code: u16, message: String },

    /// Command payload could not be serialized or deserialized.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// A command failed in a way it chose to surface to the processor.
    #[error("command error: {message}")]
    Command { message: String },

    /// Credentials are missing or were rejected.
    #[error("authentication error: {message}")]
    Auth { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_expiry(expires_at: &Option<DateTime<Utc>>) -> String {
    match expires_at {
        Some(at) => format!(" (suggested expiry {})", at.format("%Y-%m-%d %H:%M UTC")),
        None => String::new(),
    }
}

impl AniqueueError {
    /// Returns `true` for the distinguished ban error.
    pub fn is_banned(&self) -> bool {
        matches!(self, AniqueueError::Banned { .. })
    }

    /// Wraps any I/O error raised by a command or transport.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        AniqueueError::Transport {
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn banned_message_includes_expiry_when_known() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let err = AniqueueError::Banned {
            kind: BanKind::Http,
            expires_at: Some(at),
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP"), "got: {msg}");
        assert!(msg.contains("2026-03-01"), "got: {msg}");
        assert!(err.is_banned());
    }

    #[test]
    fn banned_message_without_expiry() {
        let err = AniqueueError::Banned {
            kind: BanKind::Udp,
            expires_at: None,
        };
        assert_eq!(err.to_string(), "AniDB UDP ban in effect");
    }

    #[test]
    fn serde_errors_convert() {
        let err: AniqueueError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AniqueueError::Serialization { .. }));
        assert!(!err.is_banned());
    }
}

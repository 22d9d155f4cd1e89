// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads carried on the bus.

use aniqueue_core::{BanKind, Channel, ProcessorState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope with identity and publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: Uuid,
    pub published_at: DateTime<Utc>,
    pub event: QueueEvent,
}

impl BusEvent {
    pub fn new(event: QueueEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            published_at: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Pending record count for a channel changed.
    DepthChanged { channel: Channel, count: u64 },

    /// A processor changed state or started a new command.
    StateChanged {
        channel: Channel,
        state: ProcessorState,
        description: String,
    },

    /// A channel was paused or resumed.
    PauseChanged {
        channel: Channel,
        paused: bool,
        paused_at: Option<DateTime<Utc>>,
    },

    /// A connection handler was banned or had its ban lifted.
    BanChanged {
        kind: BanKind,
        banned: bool,
        expires_at: Option<DateTime<Utc>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = QueueEvent::BanChanged {
            kind: BanKind::Http,
            banned: true,
            expires_at: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ban_changed\""), "got: {json}");
        assert!(json.contains("\"kind\":\"http\""), "got: {json}");
    }
}

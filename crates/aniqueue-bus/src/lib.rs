// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget notification bus.
//!
//! Queue processors and connection handlers publish here; UIs, loggers and
//! metrics consumers subscribe. Publishing never blocks and never fails when
//! nobody is listening. Slow subscribers lose the oldest events.

pub mod events;

use tokio::sync::broadcast;
use tracing::trace;

pub use events::{BusEvent, QueueEvent};

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Cloneable handle to a broadcast channel of [`BusEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, event: QueueEvent) {
        let envelope = BusEvent::new(event);
        // An error only means nobody is subscribed.
        if self.sender.send(envelope).is_err() {
            trace!("event dropped, no subscribers");
        }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

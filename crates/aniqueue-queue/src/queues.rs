// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The three channel processors behind one enqueue entry point.

use std::sync::Arc;

use aniqueue_bus::EventBus;
use aniqueue_core::{AniqueueError, BanControl, Channel, CommandStore, CommandType, NewCommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::Command;
use crate::context::CommandContext;
use crate::factory::CommandRegistry;
use crate::processor::{ProcessorSettings, ProcessorStatus, QueueProcessor};

/// Result of an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Persisted under this id.
    Enqueued(i64),
    /// A command with the same key was already pending; nothing was stored.
    Duplicate,
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, EnqueueOutcome::Enqueued(_))
    }
}

/// Owns the command store and one [`QueueProcessor`] per channel.
pub struct CommandQueues {
    store: Arc<dyn CommandStore>,
    bus: EventBus,
    bans: Vec<Arc<dyn BanControl>>,
    cancel: CancellationToken,
    general: Arc<QueueProcessor>,
    hasher: Arc<QueueProcessor>,
    images: Arc<QueueProcessor>,
}

impl CommandQueues {
    pub fn new(
        store: Arc<dyn CommandStore>,
        registry: CommandRegistry,
        bus: EventBus,
        bans: Vec<Arc<dyn BanControl>>,
        settings: ProcessorSettings,
    ) -> Self {
        let cancel = CancellationToken::new();
        let registry = Arc::new(registry);
        let processor = |channel| {
            Arc::new(QueueProcessor::new(
                channel,
                store.clone(),
                registry.clone(),
                bus.clone(),
                bans.clone(),
                settings,
                cancel.child_token(),
            ))
        };
        let general = processor(Channel::General);
        let hasher = processor(Channel::Hasher);
        let images = processor(Channel::Images);

        Self {
            store,
            bus,
            bans,
            cancel,
            general,
            hasher,
            images,
        }
    }

    pub fn processor(&self, channel: Channel) -> &Arc<QueueProcessor> {
        match channel {
            Channel::General => &self.general,
            Channel::Hasher => &self.hasher,
            Channel::Images => &self.images,
        }
    }

    pub fn store(&self) -> &Arc<dyn CommandStore> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Starts every channel's worker. Pending work from a previous run is
    /// picked up immediately.
    pub fn start(&self, ctx: Arc<CommandContext>) {
        for channel in Channel::ALL {
            if self.processor(channel).start(ctx.clone()) {
                debug!(%channel, "queue processor spawned");
            }
        }
    }

    /// Persists `command` unless a command with its key is pending, then
    /// wakes the owning channel.
    pub async fn enqueue(&self, command: &dyn Command) -> Result<EnqueueOutcome, AniqueueError> {
        let new = command.to_new_command()?;
        self.enqueue_record(new).await
    }

    /// Enqueues an already serialized command.
    ///
    /// Watched-status updates skip de-duplication so that toggles replay in
    /// the order they were issued.
    pub async fn enqueue_record(&self, new: NewCommand) -> Result<EnqueueOutcome, AniqueueError> {
        let allows_duplicates = CommandType::from_tag(new.command_type)
            .is_some_and(CommandType::allows_duplicates);

        let outcome = if allows_duplicates {
            EnqueueOutcome::Enqueued(self.store.save(&new).await?)
        } else {
            match self.store.save_unique(&new).await? {
                Some(id) => EnqueueOutcome::Enqueued(id),
                None => EnqueueOutcome::Duplicate,
            }
        };

        match outcome {
            EnqueueOutcome::Enqueued(id) => {
                debug!(channel = %new.channel, key = %new.key, id, "command enqueued");
                let processor = self.processor(new.channel);
                processor.refresh_depth().await;
                processor.notify_new_work();
            }
            EnqueueOutcome::Duplicate => {
                debug!(channel = %new.channel, key = %new.key, "command already queued, skipped");
            }
        }
        Ok(outcome)
    }

    pub fn pause(&self, channel: Channel) {
        self.processor(channel).set_paused(true);
    }

    pub fn resume(&self, channel: Channel) {
        self.processor(channel).set_paused(false);
    }

    pub fn pause_all(&self) {
        for channel in Channel::ALL {
            self.pause(channel);
        }
    }

    pub fn resume_all(&self) {
        for channel in Channel::ALL {
            self.resume(channel);
        }
    }

    /// Deletes every pending command of `channel`.
    ///
    /// A command already executing finishes normally.
    pub async fn clear(&self, channel: Channel) -> Result<u64, AniqueueError> {
        let removed = self.store.clear(channel).await?;
        info!(%channel, removed, "queue cleared");
        self.processor(channel).refresh_depth().await;
        Ok(removed)
    }

    /// Lifts every AniDB ban and resumes all channels.
    pub fn clear_bans(&self) {
        for ban in &self.bans {
            ban.clear_ban();
        }
        self.resume_all();
    }

    /// Current status of every channel, with fresh pending counts.
    pub async fn status(&self) -> Vec<ProcessorStatus> {
        let mut statuses = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            let processor = self.processor(channel);
            processor.refresh_depth().await;
            statuses.push(processor.status());
        }
        statuses
    }

    /// Stops all workers, letting each finish the command it is running.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for channel in Channel::ALL {
            self.processor(channel).stop().await;
        }
        info!("all queue processors stopped");
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One worker per channel.
//!
//! The worker drains its channel one command at a time, then waits for a
//! notification. While paused it sleeps in poll intervals and lifts the pause
//! (and any AniDB ban) itself once the pause has lasted long enough.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use aniqueue_bus::{EventBus, QueueEvent};
use aniqueue_config::model::QueueConfig;
use aniqueue_core::{AniqueueError, BanControl, Channel, CommandRecord, CommandStore, ProcessorState};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::context::CommandContext;
use crate::factory::{CommandRegistry, Resolved};
use crate::recording;

/// Timing and ban policy shared by all processors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorSettings {
    /// Sleep between pause checks.
    pub pause_poll: Duration,
    /// A pause this old is lifted automatically.
    pub pause_timeout: Duration,
    /// Put a command interrupted by a ban back on the queue.
    pub requeue_on_ban: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for ProcessorSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            pause_poll: config.pause_poll(),
            pause_timeout: config.pause_timeout(),
            requeue_on_ban: config.requeue_on_ban,
        }
    }
}

/// Snapshot of a processor for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorStatus {
    pub channel: Channel,
    pub state: ProcessorState,
    pub paused: bool,
    pub pause_started_at: Option<DateTime<Utc>>,
    pub queue_count: u64,
    pub description: String,
    /// A worker is draining or paused. An idle, parked worker does not count.
    pub worker_running: bool,
}

struct Inner {
    state: ProcessorState,
    description: String,
    /// Monotonic start for the timeout, wall-clock start for display.
    paused_since: Option<(Instant, DateTime<Utc>)>,
    queue_count: u64,
}

pub struct QueueProcessor {
    channel: Channel,
    store: Arc<dyn CommandStore>,
    registry: Arc<CommandRegistry>,
    bus: EventBus,
    bans: Vec<Arc<dyn BanControl>>,
    settings: ProcessorSettings,
    inner: Mutex<Inner>,
    wake: Notify,
    resume: Notify,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueProcessor {
    pub fn new(
        channel: Channel,
        store: Arc<dyn CommandStore>,
        registry: Arc<CommandRegistry>,
        bus: EventBus,
        bans: Vec<Arc<dyn BanControl>>,
        settings: ProcessorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channel,
            store,
            registry,
            bus,
            bans,
            settings,
            inner: Mutex::new(Inner {
                state: ProcessorState::Idle,
                description: "Idle".to_string(),
                paused_since: None,
                queue_count: 0,
            }),
            wake: Notify::new(),
            resume: Notify::new(),
            cancel,
            worker: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawns the worker. Returns `false` if it was already started or the
    /// processor has been stopped.
    pub fn start(self: &Arc<Self>, ctx: Arc<CommandContext>) -> bool {
        let mut slot = self.worker_slot();
        if slot.is_some() || self.cancel.is_cancelled() {
            return false;
        }
        *slot = Some(tokio::spawn(Arc::clone(self).run(ctx)));
        true
    }

    /// Wakes an idle worker. Cheap and safe to call from anywhere.
    pub fn notify_new_work(&self) {
        self.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.inner().paused_since.is_some()
    }

    pub fn state(&self) -> ProcessorState {
        self.inner().state
    }

    /// The worker task exists and has not ended, whatever its state.
    pub fn is_task_alive(&self) -> bool {
        self.worker_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn status(&self) -> ProcessorStatus {
        let task_alive = self.is_task_alive();
        let inner = self.inner();
        let worker_running =
            task_alive && matches!(inner.state, ProcessorState::Running | ProcessorState::Paused);
        ProcessorStatus {
            channel: self.channel,
            state: inner.state,
            paused: inner.paused_since.is_some(),
            pause_started_at: inner.paused_since.map(|(_, at)| at),
            queue_count: inner.queue_count,
            description: inner.description.clone(),
            worker_running,
        }
    }

    /// Pauses or resumes the channel.
    ///
    /// Pausing an already paused channel keeps the original start time, so
    /// the automatic resume is not pushed back.
    pub fn set_paused(&self, paused: bool) {
        let paused_at = {
            let mut inner = self.inner();
            match (paused, inner.paused_since) {
                (true, Some(_)) | (false, None) => return,
                (true, None) => {
                    let now = Utc::now();
                    inner.paused_since = Some((Instant::now(), now));
                    Some(now)
                }
                (false, Some(_)) => {
                    inner.paused_since = None;
                    None
                }
            }
        };

        self.bus.publish(QueueEvent::PauseChanged {
            channel: self.channel,
            paused,
            paused_at,
        });
        if paused {
            info!(channel = %self.channel, "queue paused");
            self.set_state(ProcessorState::Paused, "Paused");
        } else {
            info!(channel = %self.channel, "queue resumed");
            if self.state() == ProcessorState::Paused {
                self.set_state(ProcessorState::Idle, "Idle");
            }
            // Only a worker sleeping in `pause_tick` listens; nothing is stored.
            self.resume.notify_waiters();
            self.wake.notify_one();
        }
    }

    /// Clears the bans this processor is wired to and resumes it.
    pub fn clear_bans_and_resume(&self) {
        for ban in &self.bans {
            ban.clear_ban();
        }
        self.set_paused(false);
    }

    /// Re-reads the pending count, caches it and publishes it.
    pub async fn refresh_depth(&self) -> u64 {
        match self.store.count_for(self.channel).await {
            Ok(count) => {
                let changed = {
                    let mut inner = self.inner();
                    let changed = inner.queue_count != count;
                    inner.queue_count = count;
                    changed
                };
                recording::set_queue_depth(self.channel, count);
                if changed {
                    self.bus.publish(QueueEvent::DepthChanged {
                        channel: self.channel,
                        count,
                    });
                }
                count
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "failed to count pending commands");
                self.inner().queue_count
            }
        }
    }

    /// Cancels the worker and waits for it to finish its current command.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.worker_slot().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(channel = %self.channel, error = %e, "queue worker ended abnormally");
            }
        }
        self.set_state(ProcessorState::Stopped, "Stopped");
    }

    fn set_state(&self, state: ProcessorState, description: &str) {
        {
            let mut inner = self.inner();
            if inner.state == ProcessorState::Stopped
                || (inner.state == state && inner.description == description)
            {
                return;
            }
            inner.state = state;
            inner.description = description.to_string();
        }
        debug!(channel = %self.channel, %state, description, "queue state changed");
        self.bus.publish(QueueEvent::StateChanged {
            channel: self.channel,
            state,
            description: description.to_string(),
        });
    }

    async fn run(self: Arc<Self>, ctx: Arc<CommandContext>) {
        info!(channel = %self.channel, "queue worker started");
        self.refresh_depth().await;

        while !self.cancel.is_cancelled() {
            if self.is_paused() {
                self.pause_tick().await;
                continue;
            }

            self.drain(&ctx).await;
            if self.cancel.is_cancelled() || self.is_paused() {
                continue;
            }

            self.set_state(ProcessorState::Idle, "Idle");
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = self.wake.notified() => {}
            }
        }

        self.set_state(ProcessorState::Stopped, "Stopped");
        info!(channel = %self.channel, "queue worker stopped");
    }

    /// One sleep while paused, or the automatic resume once the pause is old enough.
    async fn pause_tick(&self) {
        let resumed = self.resume.notified();
        tokio::pin!(resumed);
        resumed.as_mut().enable();

        let Some(since) = self.inner().paused_since.map(|(at, _)| at) else {
            return;
        };
        if since.elapsed() >= self.settings.pause_timeout {
            info!(
                channel = %self.channel,
                paused_for_secs = since.elapsed().as_secs(),
                "pause timed out, clearing AniDB bans and resuming"
            );
            self.clear_bans_and_resume();
            return;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = resumed => {}
            _ = tokio::time::sleep(self.settings.pause_poll) => {}
        }
    }

    /// Runs commands until the channel is empty, paused or cancelled.
    ///
    /// A record that cannot be resolved stays claimed and is passed over.
    async fn drain(&self, ctx: &CommandContext) {
        loop {
            if self.cancel.is_cancelled() || self.is_paused() {
                return;
            }

            let record = match self.store.next_for(self.channel).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.refresh_depth().await;
                    return;
                }
                Err(e) => {
                    error!(channel = %self.channel, error = %e, "failed to fetch next command");
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.settings.pause_poll) => {}
                    }
                    continue;
                }
            };

            // Claimed but not started; the claim is released on the next open.
            if self.cancel.is_cancelled() {
                return;
            }

            let Some(command) = self.resolve(&record) else {
                continue;
            };
            self.execute(record, command, ctx).await;
            self.refresh_depth().await;
        }
    }

    fn resolve(&self, record: &CommandRecord) -> Option<Box<dyn Command>> {
        match self.registry.resolve(record) {
            Resolved::Command(command) => Some(command),
            Resolved::UnknownType(tag) => {
                warn!(
                    channel = %self.channel,
                    key = %record.key,
                    command_type = tag,
                    "unknown command type, record left in store"
                );
                recording::record_skipped(self.channel);
                None
            }
            Resolved::Malformed {
                command_type,
                reason,
            } => {
                warn!(
                    channel = %self.channel,
                    key = %record.key,
                    %command_type,
                    reason,
                    "could not restore command, record left in store"
                );
                recording::record_skipped(self.channel);
                None
            }
        }
    }

    async fn execute(&self, record: CommandRecord, command: Box<dyn Command>, ctx: &CommandContext) {
        let key = record.key.as_str();
        let command_type = command.command_type();
        self.set_state(ProcessorState::Running, &command.describe());

        let outcome = AssertUnwindSafe(command.execute(ctx)).catch_unwind().await;
        let mut banned = false;
        match outcome {
            Ok(Ok(())) => {
                debug!(channel = %self.channel, key, "command finished");
                recording::record_executed(self.channel);
            }
            Ok(Err(AniqueueError::Banned { kind, expires_at })) => {
                warn!(
                    channel = %self.channel,
                    key,
                    %kind,
                    expires_at = ?expires_at,
                    "command interrupted by AniDB ban"
                );
                banned = true;
            }
            Ok(Err(AniqueueError::Cancelled)) => {
                // Left claimed; the record is released and retried on the next start.
                info!(channel = %self.channel, key, "command interrupted by shutdown");
                return;
            }
            Ok(Err(e)) => {
                error!(channel = %self.channel, key, %command_type, error = %e, "command failed");
                recording::record_failed(self.channel);
            }
            Err(panic) => {
                error!(
                    channel = %self.channel,
                    key,
                    %command_type,
                    panic = %panic_message(panic.as_ref()),
                    "command panicked"
                );
                recording::record_failed(self.channel);
            }
        }

        if banned {
            self.set_paused(true);
        }
        if let Err(e) = self.store.delete(record.id).await {
            error!(channel = %self.channel, key, error = %e, "failed to delete finished command");
        }
        if banned && self.settings.requeue_on_ban && command.requeue_on_ban() {
            self.requeue(command.as_ref()).await;
        }
    }

    async fn requeue(&self, command: &dyn Command) {
        let result = match command.to_new_command() {
            Ok(new) if command.command_type().allows_duplicates() => {
                self.store.save(&new).await.map(Some)
            }
            Ok(new) => self.store.save_unique(&new).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => info!(channel = %self.channel, key = %command.key(), "command re-queued after ban"),
            Err(e) => error!(
                channel = %self.channel,
                key = %command.key(),
                error = %e,
                "failed to re-queue command after ban"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

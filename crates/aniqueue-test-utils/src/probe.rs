// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A configurable command for exercising processors.
//!
//! A [`ProbeCommand`] borrows a real [`CommandType`] for routing, so a test
//! registers it in place of that type's built-in with [`ProbeLog::register`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aniqueue_core::{AniqueueError, BanKind, CommandType};
use aniqueue_queue::{Command, CommandContext, CommandRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a probe does when executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeBehavior {
    Succeed,
    /// Returns a command error.
    Fail,
    Panic,
    /// Bans the given transport on every run.
    Ban(BanKind),
    /// Bans the given transport on the first run only.
    BanOnce(BanKind),
    /// Sleeps, observing shutdown.
    Sleep { millis: u64 },
    /// Issues a request through the HTTP handler.
    CallHttp(String),
}

/// Shared record of probe executions.
#[derive(Debug, Clone, Default)]
pub struct ProbeLog {
    inner: Arc<ProbeLogInner>,
}

#[derive(Debug, Default)]
struct ProbeLogInner {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ProbeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a probe constructor for `command_type` that reports here.
    pub fn register(&self, registry: &mut CommandRegistry, command_type: CommandType) {
        let log = self.clone();
        registry.register(command_type, move |payload| {
            let mut probe: ProbeCommand = serde_json::from_str(payload)?;
            probe.log = Some(log.clone());
            Ok(Box::new(probe))
        });
    }

    /// Probe names in the order they started.
    pub fn started(&self) -> Vec<String> {
        self.inner
            .started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Probe names in the order they returned normally.
    pub fn finished(&self) -> Vec<String> {
        self.inner
            .finished
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Highest number of probes observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn times_started(&self, name: &str) -> usize {
        self.started().iter().filter(|n| *n == name).count()
    }

    fn enter(&self, name: &str) {
        self.inner
            .started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn finish(&self, name: &str) {
        self.inner
            .finished
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());
    }
}

/// Decrements the in-flight count even when the probe panics.
struct InFlight<'a>(&'a ProbeLog);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeCommand {
    pub name: String,
    pub command_type: CommandType,
    #[serde(default)]
    pub priority: Option<i32>,
    pub behavior: ProbeBehavior,
    #[serde(skip)]
    log: Option<ProbeLog>,
}

impl ProbeCommand {
    pub fn new(name: impl Into<String>, command_type: CommandType, behavior: ProbeBehavior) -> Self {
        Self {
            name: name.into(),
            command_type,
            priority: None,
            behavior,
            log: None,
        }
    }

    pub fn succeed(name: impl Into<String>, command_type: CommandType) -> Self {
        Self::new(name, command_type, ProbeBehavior::Succeed)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    async fn behave(&self, ctx: &CommandContext, first_run: bool) -> Result<(), AniqueueError> {
        match &self.behavior {
            ProbeBehavior::Succeed => Ok(()),
            ProbeBehavior::Fail => Err(AniqueueError::Command {
                message: format!("probe {} failed", self.name),
            }),
            ProbeBehavior::Panic => panic!("probe {} panicked", self.name),
            ProbeBehavior::Ban(kind) => Err(ban(ctx, *kind)),
            ProbeBehavior::BanOnce(kind) if first_run => Err(ban(ctx, *kind)),
            ProbeBehavior::BanOnce(_) => Ok(()),
            ProbeBehavior::Sleep { millis } => {
                tokio::select! {
                    _ = ctx.cancel_token().cancelled() => Err(AniqueueError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(*millis)) => Ok(()),
                }
            }
            ProbeBehavior::CallHttp(query) => ctx.anidb.http.get(query).await.map(|_| ()),
        }
    }
}

fn ban(ctx: &CommandContext, kind: BanKind) -> AniqueueError {
    let tracker = match kind {
        BanKind::Http => ctx.anidb.http.ban(),
        BanKind::Udp => ctx.anidb.udp.ban(),
    };
    tracker.set_banned();
    tracker.banned_error()
}

#[async_trait]
impl Command for ProbeCommand {
    fn command_type(&self) -> CommandType {
        self.command_type
    }

    fn key(&self) -> String {
        format!("Probe_{}", self.name)
    }

    fn to_payload(&self) -> Result<String, AniqueueError> {
        Ok(serde_json::to_string(self)?)
    }

    fn describe(&self) -> String {
        format!("Probe {}", self.name)
    }

    fn priority(&self) -> i32 {
        self.priority
            .unwrap_or_else(|| self.command_type.default_priority())
    }

    async fn execute(&self, ctx: &CommandContext) -> Result<(), AniqueueError> {
        let first_run = self
            .log
            .as_ref()
            .is_none_or(|log| log.times_started(&self.name) == 0);
        let _guard = self.log.as_ref().map(|log| {
            log.enter(&self.name);
            InFlight(log)
        });
        let result = self.behave(ctx, first_run).await;
        if let (Some(log), Ok(())) = (&self.log, &result) {
            log.finish(&self.name);
        }
        result
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimum spacing between outbound calls on one handler.
//!
//! Calls are serialized: a caller holds the limiter for the duration of its
//! call, so the spacing is measured from the end of one call to the start of
//! the next. Callers are delayed, never dropped, and served in arrival order
//! (tokio's mutex is fair).

use std::future::Future;
use std::time::Duration;

use aniqueue_config::model::RateLimitConfig;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Spacing policy for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Spacing while the handler has been busy for less than `short_period`.
    pub short_delay: Duration,
    /// Spacing once the busy stretch exceeds `short_period`.
    pub long_delay: Duration,
    pub short_period: Duration,
    /// Idle time after which a busy stretch is considered over.
    pub reset_period: Duration,
}

impl RateLimitSettings {
    /// A single fixed spacing.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            short_delay: delay,
            long_delay: delay,
            short_period: Duration::MAX,
            reset_period: Duration::MAX,
        }
    }
}

impl From<&RateLimitConfig> for RateLimitSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            short_delay: Duration::from_millis(config.short_delay_ms),
            long_delay: Duration::from_millis(config.long_delay_ms),
            short_period: Duration::from_secs(config.short_period_secs),
            reset_period: Duration::from_secs(config.reset_period_secs),
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_call_finished: Option<Instant>,
    busy_since: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    settings: RateLimitSettings,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(name: &'static str, settings: RateLimitSettings) -> Self {
        Self {
            name,
            settings,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn from_config(name: &'static str, config: &RateLimitConfig) -> Self {
        Self::new(name, RateLimitSettings::from(config))
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Waits for this handler's slot, then runs `action` while holding it.
    pub async fn ensure_rate<F, Fut, T>(&self, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(last) = state.last_call_finished
            && now.saturating_duration_since(last) >= self.settings.reset_period
        {
            state.busy_since = None;
        }
        let busy_since = *state.busy_since.get_or_insert(now);

        let delay = if now.saturating_duration_since(busy_since) < self.settings.short_period {
            self.settings.short_delay
        } else {
            self.settings.long_delay
        };

        if let Some(last) = state.last_call_finished {
            let ready_at = last + delay;
            if ready_at > now {
                debug!(
                    limiter = self.name,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "rate limiting outbound call"
                );
                sleep_until(ready_at).await;
            }
        }

        let output = action().await;
        state.last_call_finished = Some(Instant::now());
        output
    }
}

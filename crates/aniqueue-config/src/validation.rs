// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde attributes cannot express:
//! non-empty paths, positive intervals, and consistent credentials.

use crate::diagnostic::ConfigError;
use crate::model::{hours_to_duration, AniqueueConfig, RateLimitConfig, ScheduleConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_config(config: &AniqueueConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.images.directory.trim().is_empty() {
        fail("images.directory must not be empty".to_string());
    }

    if config.queue.pause_poll_secs < 1 {
        fail("queue.pause_poll_secs must be at least 1".to_string());
    }

    let pause_timeout = config.queue.pause_timeout_hours;
    if !(pause_timeout > 0.0) || hours_to_duration(pause_timeout).is_none() {
        fail(format!(
            "queue.pause_timeout_hours must be a positive, finite number of hours, got {pause_timeout}"
        ));
    }

    for (name, hours) in [
        ("anidb.http_ban_reset_hours", config.anidb.http_ban_reset_hours),
        ("anidb.udp_ban_reset_hours", config.anidb.udp_ban_reset_hours),
    ] {
        if !(hours >= 0.0) || hours_to_duration(hours).is_none() {
            fail(format!("{name} must be a non-negative, finite number of hours, got {hours}"));
        }
    }

    if config.schedule.mylist_sync_hours > ScheduleConfig::MAX_MYLIST_SYNC_HOURS {
        fail(format!(
            "schedule.mylist_sync_hours must be at most {}, got {}",
            ScheduleConfig::MAX_MYLIST_SYNC_HOURS,
            config.schedule.mylist_sync_hours
        ));
    }

    for (name, rate) in [
        ("anidb.http_rate", &config.anidb.http_rate),
        ("anidb.udp_rate", &config.anidb.udp_rate),
    ] {
        for message in rate_errors(name, rate) {
            fail(message);
        }
    }

    if config.anidb.username.is_some() != config.anidb.password.is_some() {
        fail("anidb.username and anidb.password must be set together".to_string());
    }

    if config.anidb.udp_host.trim().is_empty() {
        fail("anidb.udp_host must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn rate_errors(name: &str, rate: &RateLimitConfig) -> Vec<String> {
    let mut out = Vec::new();
    if rate.short_delay_ms == 0 {
        out.push(format!("{name}.short_delay_ms must be positive"));
    }
    if rate.long_delay_ms < rate.short_delay_ms {
        out.push(format!(
            "{name}.long_delay_ms ({}) must not be below short_delay_ms ({})",
            rate.long_delay_ms, rate.short_delay_ms
        ));
    }
    out
}

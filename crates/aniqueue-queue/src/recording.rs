// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder can collect these metrics.
//! Without an installed recorder every call is a no-op.

use aniqueue_core::Channel;
use metrics::{describe_counter, describe_gauge};

/// Register all aniqueue metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!("aniqueue_queue_depth", "Pending commands per channel");
    describe_counter!("aniqueue_commands_executed_total", "Commands executed");
    describe_counter!(
        "aniqueue_commands_failed_total",
        "Commands whose execution returned an error or panicked"
    );
    describe_counter!(
        "aniqueue_commands_skipped_total",
        "Stored commands that could not be resolved"
    );
    describe_counter!("aniqueue_anidb_bans_total", "AniDB bans detected");
    describe_counter!("aniqueue_anidb_requests_total", "Requests sent to AniDB");
}

pub fn set_queue_depth(channel: Channel, depth: u64) {
    metrics::gauge!("aniqueue_queue_depth", "channel" => channel.as_str()).set(depth as f64);
}

pub fn record_executed(channel: Channel) {
    metrics::counter!("aniqueue_commands_executed_total", "channel" => channel.as_str())
        .increment(1);
}

pub fn record_failed(channel: Channel) {
    metrics::counter!("aniqueue_commands_failed_total", "channel" => channel.as_str())
        .increment(1);
}

pub fn record_skipped(channel: Channel) {
    metrics::counter!("aniqueue_commands_skipped_total", "channel" => channel.as_str())
        .increment(1);
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `aniqueue status` command implementation.
//!
//! Reads pending counts straight from the command store, so it works whether
//! or not the daemon is running. Pause and ban state live in the daemon and
//! are not shown here.

use std::io::IsTerminal;

use aniqueue_config::AniqueueConfig;
use aniqueue_core::{AniqueueError, Channel, CommandStore};
use aniqueue_storage::SqliteStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Pending commands of one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelPending {
    pub channel: Channel,
    pub pending: u64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub checked_at: DateTime<Utc>,
    pub channels: Vec<ChannelPending>,
    pub total_pending: u64,
}

impl StatusResponse {
    fn new(database_path: &str, channels: Vec<ChannelPending>) -> Self {
        let total_pending = channels.iter().map(|c| c.pending).sum();
        Self {
            database_path: database_path.to_string(),
            checked_at: Utc::now(),
            channels,
            total_pending,
        }
    }
}

async fn collect(config: &AniqueueConfig) -> Result<StatusResponse, AniqueueError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.attach().await?;

    let mut channels = Vec::with_capacity(Channel::ALL.len());
    for channel in Channel::ALL {
        match storage.count_for(channel).await {
            Ok(pending) => channels.push(ChannelPending { channel, pending }),
            Err(e) => {
                let _ = storage.close().await;
                return Err(e);
            }
        }
    }
    storage.close().await?;

    Ok(StatusResponse::new(&config.storage.database_path, channels))
}

/// Run the `aniqueue status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &AniqueueConfig,
    json: bool,
    plain: bool,
) -> Result<(), AniqueueError> {
    let status = collect(config).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  aniqueue status");
    println!("  {}", "-".repeat(35));
    println!("    Store:    {}", status.database_path);

    for entry in &status.channels {
        let label = format!("{}:", capitalize(entry.channel.as_str()));
        if use_color {
            use colored::Colorize;
            let count = if entry.pending == 0 {
                entry.pending.to_string().green()
            } else {
                entry.pending.to_string().yellow()
            };
            println!("    {label:<10}{count} pending");
        } else {
            println!("    {label:<10}{} pending", entry.pending);
        }
    }

    println!("  {}", "-".repeat(35));
    println!("    Total:    {}", status.total_pending);
    println!();
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aniqueue - AniDB command queue daemon.
//!
//! `serve` runs the three channel processors until SIGINT/SIGTERM. The other
//! subcommands work directly on the command store and may be used while the
//! daemon is running.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod offline;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use aniqueue_config::AniqueueConfig;
use aniqueue_core::Channel;
use clap::{ArgAction, Parser, Subcommand};

/// Aniqueue - AniDB command queue daemon.
#[derive(Parser, Debug)]
#[command(name = "aniqueue", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the queue processors until interrupted.
    Serve,
    /// Show pending commands per channel.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Add a command to its queue.
    Enqueue {
        #[command(subcommand)]
        target: EnqueueTarget,
    },
    /// Delete every pending command of a channel.
    Clear {
        /// general, hasher or images.
        channel: Channel,
    },
}

#[derive(Subcommand, Debug)]
enum EnqueueTarget {
    /// Hash a file and record it in the library.
    Hash { path: PathBuf },
    /// Hash (if needed), identify and add a file to MyList.
    Process { path: PathBuf },
    /// Fetch anime metadata over the HTTP API.
    Anime { anime_id: u64 },
    /// Download the MyList summary.
    SyncMylist,
    /// Set the watched flag of a hashed file.
    Watched {
        sha256: String,
        #[arg(action = ArgAction::Set)]
        watched: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> AniqueueConfig {
    let loaded = match path {
        Some(path) => aniqueue_config::load_and_validate_path(path),
        None => aniqueue_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            aniqueue_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    serve::init_tracing(&config.server.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Enqueue { target }) => offline::run_enqueue(&config, target.into()).await,
        Some(Commands::Clear { channel }) => offline::run_clear(&config, channel).await,
        None => {
            println!("aniqueue: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

impl From<EnqueueTarget> for offline::EnqueueRequest {
    fn from(target: EnqueueTarget) -> Self {
        match target {
            EnqueueTarget::Hash { path } => Self::Hash(path),
            EnqueueTarget::Process { path } => Self::Process(path),
            EnqueueTarget::Anime { anime_id } => Self::Anime(anime_id),
            EnqueueTarget::SyncMylist => Self::SyncMyList,
            EnqueueTarget::Watched { sha256, watched } => Self::Watched { sha256, watched },
        }
    }
}

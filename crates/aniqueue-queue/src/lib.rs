// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command queues for the aniqueue scheduler.
//!
//! Three channels (General, Hasher, Images) each get a [`QueueProcessor`]
//! that executes stored commands one at a time in priority order. Producers
//! go through [`CommandQueues::enqueue`], which de-duplicates by key and
//! wakes the owning channel.

pub mod command;
pub mod context;
pub mod factory;
pub mod processor;
pub mod queues;
pub mod recording;

pub use command::Command;
pub use context::{CommandContext, CommandSettings};
pub use factory::{CommandRegistry, Constructor, Resolved};
pub use processor::{ProcessorSettings, ProcessorStatus, QueueProcessor};
pub use queues::{CommandQueues, EnqueueOutcome};

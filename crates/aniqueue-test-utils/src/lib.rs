// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for aniqueue integration tests.
//!
//! Provides in-memory backends, scripted AniDB transports and a harness that
//! wires the full scheduler together without touching the network.
//!
//! # Components
//!
//! - [`QueueHarness`] - full scheduler over scripted collaborators
//! - [`MemoryCommandStore`] / [`MemoryLibrary`] - in-memory storage
//! - [`ScriptedHttpTransport`] / [`ScriptedUdpTransport`] - canned AniDB replies
//! - [`ProbeCommand`] - a command whose behavior is chosen by the test

pub mod harness;
pub mod memory;
pub mod probe;
pub mod scripted;

pub use harness::{test_credentials, QueueHarness, QueueHarnessBuilder, IMAGE_BASE_URL};
pub use memory::{MemoryCommandStore, MemoryLibrary};
pub use probe::{ProbeBehavior, ProbeCommand, ProbeLog};
pub use scripted::{ScriptedHttpTransport, ScriptedUdpTransport, StaticImageFetcher};

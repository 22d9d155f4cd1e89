// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the aniqueue command scheduler.
//!
//! This crate provides the error type, the shared command/queue types and
//! the seam traits (command persistence, AniDB transports, library storage)
//! that every other crate in the workspace builds on.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::AniqueueError;
pub use types::{
    BanKind, Channel, CommandRecord, CommandType, FileHash, FileLink, MyListState, NewCommand,
    ProcessorState,
};

pub use traits::{
    BanControl, CommandStore, FileHasher, HttpTransport, ImageFetcher, LibraryStore, UdpTransport,
};

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for aniqueue.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, the durable [`CommandStore`] behind
//! all three queues, and the library tables the built-in commands write to.
//!
//! [`CommandStore`]: aniqueue_core::CommandStore

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;

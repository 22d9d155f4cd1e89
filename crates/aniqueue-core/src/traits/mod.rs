// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits between the scheduler and its backends.
//!
//! All async traits use `#[async_trait]` for dynamic dispatch compatibility,
//! so implementations can be held as `Arc<dyn Trait>`.

pub mod ban;
pub mod library;
pub mod store;
pub mod transport;

pub use ban::BanControl;
pub use library::{FileHasher, ImageFetcher, LibraryStore};
pub use store::CommandStore;
pub use transport::{HttpTransport, UdpTransport};

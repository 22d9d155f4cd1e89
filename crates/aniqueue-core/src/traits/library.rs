// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborators the built-in commands write to.

use std::path::Path;

use async_trait::async_trait;

use crate::error::AniqueueError;
use crate::types::{FileHash, FileLink, MyListState};

/// Local library state: the file hash index, AniDB links and cached metadata.
///
/// The hash index is written by the Hasher channel and read by the General
/// channel, so implementations see concurrent access.
#[async_trait]
pub trait LibraryStore: Send + Sync + 'static {
    async fn record_file_hash(&self, hash: &FileHash) -> Result<(), AniqueueError>;

    async fn file_hash(&self, path: &str) -> Result<Option<FileHash>, AniqueueError>;

    async fn record_file_link(&self, link: &FileLink) -> Result<(), AniqueueError>;

    async fn file_link(&self, sha256: &str) -> Result<Option<FileLink>, AniqueueError>;

    async fn store_anime_xml(&self, anime_id: u64, xml: &str) -> Result<(), AniqueueError>;

    async fn anime_xml(&self, anime_id: u64) -> Result<Option<String>, AniqueueError>;

    async fn store_mylist_xml(&self, xml: &str) -> Result<(), AniqueueError>;

    /// Records that a file is in MyList, with AniDB's list id when known.
    async fn mark_in_mylist(
        &self,
        sha256: &str,
        mylist_id: Option<u64>,
    ) -> Result<(), AniqueueError>;

    async fn set_watched(&self, sha256: &str, watched: bool) -> Result<(), AniqueueError>;

    async fn mylist_state(&self, sha256: &str) -> Result<Option<MyListState>, AniqueueError>;
}

/// Computes the digests recorded in the hash index.
#[async_trait]
pub trait FileHasher: Send + Sync + 'static {
    async fn hash_file(&self, path: &Path) -> Result<FileHash, AniqueueError>;
}

/// Downloads image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AniqueueError>;
}

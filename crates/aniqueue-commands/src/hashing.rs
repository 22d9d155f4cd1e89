// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in file hasher.

use std::path::Path;

use aniqueue_core::{AniqueueError, FileHash, FileHasher};
use async_trait::async_trait;
use md4::Md4;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;

const READ_BUF: usize = 1024 * 1024;

/// Size of one ED2K block.
pub const ED2K_CHUNK: usize = 9_728_000;

/// Incremental ED2K digest.
///
/// Each full block is hashed with MD4. A file of one block (or less) uses that
/// digest as is; longer files hash the concatenated block digests again. A
/// file ending exactly on a block boundary gets no extra empty block.
#[derive(Default)]
pub struct Ed2k {
    block: Md4,
    block_len: usize,
    digests: Vec<u8>,
}

impl Ed2k {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = (ED2K_CHUNK - self.block_len).min(data.len());
            self.block.update(&data[..take]);
            self.block_len += take;
            data = &data[take..];
            if self.block_len == ED2K_CHUNK {
                let digest = std::mem::take(&mut self.block).finalize();
                self.digests.extend_from_slice(&digest);
                self.block_len = 0;
            }
        }
    }

    /// Lowercase hex digest.
    pub fn finalize_hex(mut self) -> String {
        if self.block_len > 0 || self.digests.is_empty() {
            self.digests.extend_from_slice(&self.block.finalize());
        }
        if self.digests.len() == 16 {
            hex::encode(&self.digests)
        } else {
            hex::encode(Md4::digest(&self.digests))
        }
    }
}

/// Streams a file through SHA-256 and ED2K in one pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestHasher;

#[async_trait]
impl FileHasher for DigestHasher {
    async fn hash_file(&self, path: &Path) -> Result<FileHash, AniqueueError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AniqueueError::io(format!("cannot open {}", path.display()), e))?;

        let mut sha256 = Sha256::new();
        let mut ed2k = Ed2k::new();
        let mut buf = vec![0u8; READ_BUF];
        let mut size = 0u64;
        loop {
            let read = file
                .read(&mut buf)
                .await
                .map_err(|e| AniqueueError::io(format!("cannot read {}", path.display()), e))?;
            if read == 0 {
                break;
            }
            sha256.update(&buf[..read]);
            ed2k.update(&buf[..read]);
            size += read as u64;
        }

        let sha256 = hex::encode(sha256.finalize());
        let ed2k = ed2k.finalize_hex();
        debug!(path = %path.display(), size, %ed2k, "file hashed");
        Ok(FileHash {
            path: path.to_string_lossy().into_owned(),
            size,
            sha256,
            ed2k: Some(ed2k),
        })
    }
}

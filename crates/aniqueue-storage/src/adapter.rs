// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the command store and library traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use aniqueue_config::model::StorageConfig;
use aniqueue_core::{
    AniqueueError, Channel, CommandRecord, CommandStore, FileHash, FileLink, LibraryStore,
    MyListState, NewCommand,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened by [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. Nothing is opened until [`initialize`](Self::initialize).
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Opens the database, runs migrations and releases claims left by a crash.
    ///
    /// Only the process that runs the queue workers should call this.
    pub async fn initialize(&self) -> Result<(), AniqueueError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        let released = queries::commands::release_stale_claims(&db).await?;
        if released > 0 {
            info!(count = released, "re-queued commands interrupted by previous shutdown");
        }
        self.set_db(db)
    }

    /// Opens the database without touching claims, for tools that run next
    /// to a live daemon.
    pub async fn attach(&self) -> Result<(), AniqueueError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.set_db(db)
    }

    fn set_db(&self, db: Database) -> Result<(), AniqueueError> {
        self.db.set(db).map_err(|_| AniqueueError::Storage {
            source: "storage already initialized".into(),
        })
    }

    fn db(&self) -> Result<&Database, AniqueueError> {
        self.db.get().ok_or_else(|| AniqueueError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Runs a trivial query to confirm the connection thread is alive.
    pub async fn health_check(&self) -> Result<(), AniqueueError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }

    /// Checkpoints the WAL. The connection thread exits when the last handle drops.
    pub async fn close(&self) -> Result<(), AniqueueError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(crate::database::map_tr_err)?;
            debug!("storage checkpointed");
        }
        Ok(())
    }
}

#[async_trait]
impl CommandStore for SqliteStorage {
    async fn save(&self, command: &NewCommand) -> Result<i64, AniqueueError> {
        queries::commands::insert(self.db()?, command).await
    }

    async fn save_unique(&self, command: &NewCommand) -> Result<Option<i64>, AniqueueError> {
        queries::commands::insert_unique(self.db()?, command).await
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<CommandRecord>, AniqueueError> {
        queries::commands::find_by_key(self.db()?, key).await
    }

    async fn next_for(&self, channel: Channel) -> Result<Option<CommandRecord>, AniqueueError> {
        queries::commands::claim_next(self.db()?, channel).await
    }

    async fn count_for(&self, channel: Channel) -> Result<u64, AniqueueError> {
        queries::commands::count_for_channel(self.db()?, channel).await
    }

    async fn delete(&self, id: i64) -> Result<(), AniqueueError> {
        queries::commands::delete(self.db()?, id).await
    }

    async fn clear(&self, channel: Channel) -> Result<u64, AniqueueError> {
        queries::commands::clear_channel(self.db()?, channel).await
    }
}

#[async_trait]
impl LibraryStore for SqliteStorage {
    async fn record_file_hash(&self, hash: &FileHash) -> Result<(), AniqueueError> {
        queries::library::upsert_file_hash(self.db()?, hash).await
    }

    async fn file_hash(&self, path: &str) -> Result<Option<FileHash>, AniqueueError> {
        queries::library::get_file_hash(self.db()?, path).await
    }

    async fn record_file_link(&self, link: &FileLink) -> Result<(), AniqueueError> {
        queries::library::upsert_file_link(self.db()?, link).await
    }

    async fn file_link(&self, sha256: &str) -> Result<Option<FileLink>, AniqueueError> {
        queries::library::get_file_link(self.db()?, sha256).await
    }

    async fn store_anime_xml(&self, anime_id: u64, xml: &str) -> Result<(), AniqueueError> {
        queries::library::upsert_anime_xml(self.db()?, anime_id, xml).await
    }

    async fn anime_xml(&self, anime_id: u64) -> Result<Option<String>, AniqueueError> {
        queries::library::get_anime_xml(self.db()?, anime_id).await
    }

    async fn store_mylist_xml(&self, xml: &str) -> Result<(), AniqueueError> {
        queries::library::insert_mylist_snapshot(self.db()?, xml).await
    }

    async fn mark_in_mylist(
        &self,
        sha256: &str,
        mylist_id: Option<u64>,
    ) -> Result<(), AniqueueError> {
        queries::library::mark_in_mylist(self.db()?, sha256, mylist_id).await
    }

    async fn set_watched(&self, sha256: &str, watched: bool) -> Result<(), AniqueueError> {
        queries::library::set_watched(self.db()?, sha256, watched).await
    }

    async fn mylist_state(&self, sha256: &str) -> Result<Option<MyListState>, AniqueueError> {
        queries::library::get_mylist_state(self.db()?, sha256).await
    }
}

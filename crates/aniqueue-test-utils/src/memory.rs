// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory command store and library.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use aniqueue_core::{
    AniqueueError, Channel, CommandRecord, CommandStore, FileHash, FileLink, LibraryStore,
    MyListState, NewCommand,
};
use async_trait::async_trait;
use chrono::Utc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct StoreState {
    next_id: i64,
    rows: Vec<StoredRow>,
}

struct StoredRow {
    record: CommandRecord,
    claimed: bool,
}

/// [`CommandStore`] over a vector, with the same claim semantics as SQLite.
#[derive(Default)]
pub struct MemoryCommandStore {
    state: Mutex<StoreState>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pending record in insertion order.
    pub fn records(&self) -> Vec<CommandRecord> {
        lock(&self.state)
            .rows
            .iter()
            .map(|row| row.record.clone())
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.key).collect()
    }

    pub fn is_claimed(&self, id: i64) -> bool {
        lock(&self.state)
            .rows
            .iter()
            .any(|row| row.record.id == id && row.claimed)
    }

    /// Simulates reopening the store after a crash.
    pub fn release_claims(&self) {
        for row in &mut lock(&self.state).rows {
            row.claimed = false;
        }
    }

    fn insert(state: &mut StoreState, command: &NewCommand) -> i64 {
        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(StoredRow {
            record: CommandRecord {
                id,
                key: command.key.clone(),
                command_type: command.command_type,
                channel: command.channel,
                priority: command.priority,
                payload: command.payload.clone(),
                updated_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            },
            claimed: false,
        });
        id
    }
}

#[async_trait]
impl CommandStore for MemoryCommandStore {
    async fn save(&self, command: &NewCommand) -> Result<i64, AniqueueError> {
        Ok(Self::insert(&mut lock(&self.state), command))
    }

    async fn save_unique(&self, command: &NewCommand) -> Result<Option<i64>, AniqueueError> {
        let mut state = lock(&self.state);
        if state.rows.iter().any(|row| row.record.key == command.key) {
            return Ok(None);
        }
        Ok(Some(Self::insert(&mut state, command)))
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<CommandRecord>, AniqueueError> {
        Ok(lock(&self.state)
            .rows
            .iter()
            .find(|row| row.record.key == key)
            .map(|row| row.record.clone()))
    }

    async fn next_for(&self, channel: Channel) -> Result<Option<CommandRecord>, AniqueueError> {
        let mut state = lock(&self.state);
        // Ids grow with insertion, so they stand in for `updated_at` ordering.
        let next = state
            .rows
            .iter_mut()
            .filter(|row| row.record.channel == channel && !row.claimed)
            .min_by_key(|row| (row.record.priority, row.record.id));
        Ok(next.map(|row| {
            row.claimed = true;
            row.record.clone()
        }))
    }

    async fn count_for(&self, channel: Channel) -> Result<u64, AniqueueError> {
        Ok(lock(&self.state)
            .rows
            .iter()
            .filter(|row| row.record.channel == channel)
            .count() as u64)
    }

    async fn delete(&self, id: i64) -> Result<(), AniqueueError> {
        lock(&self.state).rows.retain(|row| row.record.id != id);
        Ok(())
    }

    async fn clear(&self, channel: Channel) -> Result<u64, AniqueueError> {
        let mut state = lock(&self.state);
        let before = state.rows.len();
        state.rows.retain(|row| row.record.channel != channel);
        Ok((before - state.rows.len()) as u64)
    }
}

#[derive(Default)]
struct LibraryState {
    hashes: HashMap<String, FileHash>,
    links: HashMap<String, FileLink>,
    anime: HashMap<u64, String>,
    mylist_snapshots: Vec<String>,
    mylist: HashMap<String, MyListState>,
}

/// [`LibraryStore`] over hash maps.
#[derive(Default)]
pub struct MemoryLibrary {
    state: Mutex<LibraryState>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mylist_snapshots(&self) -> Vec<String> {
        lock(&self.state).mylist_snapshots.clone()
    }

    /// Seeds an identified file.
    pub fn insert_file(&self, hash: FileHash, link: Option<FileLink>) {
        let mut state = lock(&self.state);
        if let Some(link) = link {
            state.links.insert(link.sha256.clone(), link);
        }
        state.hashes.insert(hash.path.clone(), hash);
    }
}

#[async_trait]
impl LibraryStore for MemoryLibrary {
    async fn record_file_hash(&self, hash: &FileHash) -> Result<(), AniqueueError> {
        lock(&self.state)
            .hashes
            .insert(hash.path.clone(), hash.clone());
        Ok(())
    }

    async fn file_hash(&self, path: &str) -> Result<Option<FileHash>, AniqueueError> {
        Ok(lock(&self.state).hashes.get(path).cloned())
    }

    async fn record_file_link(&self, link: &FileLink) -> Result<(), AniqueueError> {
        lock(&self.state)
            .links
            .insert(link.sha256.clone(), link.clone());
        Ok(())
    }

    async fn file_link(&self, sha256: &str) -> Result<Option<FileLink>, AniqueueError> {
        Ok(lock(&self.state).links.get(sha256).cloned())
    }

    async fn store_anime_xml(&self, anime_id: u64, xml: &str) -> Result<(), AniqueueError> {
        lock(&self.state).anime.insert(anime_id, xml.to_string());
        Ok(())
    }

    async fn anime_xml(&self, anime_id: u64) -> Result<Option<String>, AniqueueError> {
        Ok(lock(&self.state).anime.get(&anime_id).cloned())
    }

    async fn store_mylist_xml(&self, xml: &str) -> Result<(), AniqueueError> {
        lock(&self.state).mylist_snapshots.push(xml.to_string());
        Ok(())
    }

    async fn mark_in_mylist(
        &self,
        sha256: &str,
        mylist_id: Option<u64>,
    ) -> Result<(), AniqueueError> {
        let mut state = lock(&self.state);
        let entry = state.mylist.entry(sha256.to_string()).or_default();
        if mylist_id.is_some() {
            entry.mylist_id = mylist_id;
        }
        Ok(())
    }

    async fn set_watched(&self, sha256: &str, watched: bool) -> Result<(), AniqueueError> {
        lock(&self.state)
            .mylist
            .entry(sha256.to_string())
            .or_default()
            .watched = watched;
        Ok(())
    }

    async fn mylist_state(&self, sha256: &str) -> Result<Option<MyListState>, AniqueueError> {
        Ok(lock(&self.state).mylist.get(sha256).cloned())
    }
}

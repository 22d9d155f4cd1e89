// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command request persistence: insert, claim, count, delete.

use std::str::FromStr;

use aniqueue_core::{AniqueueError, Channel, CommandRecord, NewCommand};
use rusqlite::{params, OptionalExtension, Row};

use crate::database::Database;

const SELECT_COLUMNS: &str =
    "SELECT id, command_key, command_type, channel, priority, payload, updated_at
     FROM command_requests";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CommandRecord> {
    let channel: String = row.get(3)?;
    let channel = Channel::from_str(&channel).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(CommandRecord {
        id: row.get(0)?,
        key: row.get(1)?,
        command_type: row.get(2)?,
        channel,
        priority: row.get(4)?,
        payload: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn insert_row(conn: &rusqlite::Connection, command: &NewCommand) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO command_requests (command_key, command_type, channel, priority, payload)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            command.key,
            command.command_type,
            command.channel.as_str(),
            command.priority,
            command.payload
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert a command. Returns the new row id.
pub async fn insert(db: &Database, command: &NewCommand) -> Result<i64, AniqueueError> {
    let command = command.clone();
    db.connection()
        .call(move |conn| insert_row(conn, &command))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a command unless a row with the same key exists.
///
/// Check and insert run in one transaction, so two producers racing on the
/// same key produce one row.
pub async fn insert_unique(
    db: &Database,
    command: &NewCommand,
) -> Result<Option<i64>, AniqueueError> {
    let command = command.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM command_requests WHERE command_key = ?1 LIMIT 1",
                    params![command.key],
                    |row| row.get(0),
                )
                .optional()?;
            let id = match exists {
                Some(_) => None,
                None => Some(insert_row(&tx, &command)?),
            };
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Oldest row with `key`, claimed or not.
pub async fn find_by_key(db: &Database, key: &str) -> Result<Option<CommandRecord>, AniqueueError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE command_key = ?1 ORDER BY id ASC LIMIT 1"),
                params![key],
                row_to_record,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Atomically pick the next unclaimed row for `channel` and mark it claimed.
///
/// Ordering is priority ascending, then `updated_at`, then id for rows that
/// share a millisecond.
pub async fn claim_next(
    db: &Database,
    channel: Channel,
) -> Result<Option<CommandRecord>, AniqueueError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let record = tx
                .query_row(
                    &format!(
                        "{SELECT_COLUMNS}
                         WHERE channel = ?1 AND claimed_at IS NULL
                         ORDER BY priority ASC, updated_at ASC, id ASC
                         LIMIT 1"
                    ),
                    params![channel.as_str()],
                    row_to_record,
                )
                .optional()?;
            if let Some(record) = &record {
                tx.execute(
                    "UPDATE command_requests
                     SET claimed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![record.id],
                )?;
            }
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Rows pending for `channel`, claimed ones included.
pub async fn count_for_channel(db: &Database, channel: Channel) -> Result<u64, AniqueueError> {
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM command_requests WHERE channel = ?1",
                params![channel.as_str()],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(count.max(0) as u64)
}

pub async fn delete(db: &Database, id: i64) -> Result<(), AniqueueError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM command_requests WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every row for `channel`. Returns the number removed.
pub async fn clear_channel(db: &Database, channel: Channel) -> Result<u64, AniqueueError> {
    let removed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM command_requests WHERE channel = ?1",
                params![channel.as_str()],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(removed as u64)
}

/// Release claims left behind by a process that exited mid-command.
///
/// Only valid before any worker starts; returns how many rows were released.
pub async fn release_stale_claims(db: &Database) -> Result<u64, AniqueueError> {
    let released = db
        .connection()
        .call(|conn| {
            conn.execute(
                "UPDATE command_requests SET claimed_at = NULL WHERE claimed_at IS NOT NULL",
                [],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(released as u64)
}

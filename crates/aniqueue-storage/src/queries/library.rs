// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Library tables: hash index, AniDB file links, cached XML, MyList state.

use aniqueue_core::{AniqueueError, FileHash, FileLink, MyListState};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

pub async fn upsert_file_hash(db: &Database, hash: &FileHash) -> Result<(), AniqueueError> {
    let hash = hash.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO file_hashes (path, size, sha256, ed2k) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(path) DO UPDATE SET
                    size = excluded.size,
                    sha256 = excluded.sha256,
                    ed2k = excluded.ed2k,
                    hashed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![hash.path, hash.size as i64, hash.sha256, hash.ed2k],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_file_hash(db: &Database, path: &str) -> Result<Option<FileHash>, AniqueueError> {
    let path = path.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT path, size, sha256, ed2k FROM file_hashes WHERE path = ?1",
                params![path],
                |row| {
                    Ok(FileHash {
                        path: row.get(0)?,
                        size: row.get::<_, i64>(1)?.max(0) as u64,
                        sha256: row.get(2)?,
                        ed2k: row.get(3)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn upsert_file_link(db: &Database, link: &FileLink) -> Result<(), AniqueueError> {
    let link = link.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO anidb_files (sha256, file_id, anime_id, episode_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(sha256) DO UPDATE SET
                    file_id = excluded.file_id,
                    anime_id = excluded.anime_id,
                    episode_id = excluded.episode_id,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    link.sha256,
                    link.file_id as i64,
                    link.anime_id as i64,
                    link.episode_id as i64
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_file_link(db: &Database, sha256: &str) -> Result<Option<FileLink>, AniqueueError> {
    let sha256 = sha256.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT sha256, file_id, anime_id, episode_id FROM anidb_files WHERE sha256 = ?1",
                params![sha256],
                |row| {
                    Ok(FileLink {
                        sha256: row.get(0)?,
                        file_id: row.get::<_, i64>(1)? as u64,
                        anime_id: row.get::<_, i64>(2)? as u64,
                        episode_id: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn upsert_anime_xml(db: &Database, anime_id: u64, xml: &str) -> Result<(), AniqueueError> {
    let xml = xml.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO anidb_anime (anime_id, xml) VALUES (?1, ?2)
                 ON CONFLICT(anime_id) DO UPDATE SET
                    xml = excluded.xml,
                    fetched_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![anime_id as i64, xml],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_anime_xml(db: &Database, anime_id: u64) -> Result<Option<String>, AniqueueError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT xml FROM anidb_anime WHERE anime_id = ?1",
                params![anime_id as i64],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Append a MyList snapshot, keeping only the most recent few.
pub async fn insert_mylist_snapshot(db: &Database, xml: &str) -> Result<(), AniqueueError> {
    let xml = xml.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO anidb_mylist_snapshots (xml) VALUES (?1)",
                params![xml],
            )?;
            tx.execute(
                "DELETE FROM anidb_mylist_snapshots
                 WHERE id NOT IN (SELECT id FROM anidb_mylist_snapshots ORDER BY id DESC LIMIT 3)",
                [],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn mark_in_mylist(
    db: &Database,
    sha256: &str,
    mylist_id: Option<u64>,
) -> Result<(), AniqueueError> {
    let sha256 = sha256.to_string();
    let mylist_id = mylist_id.map(|id| id as i64);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO mylist_state (sha256, mylist_id) VALUES (?1, ?2)
                 ON CONFLICT(sha256) DO UPDATE SET
                    mylist_id = COALESCE(excluded.mylist_id, mylist_state.mylist_id),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![sha256, mylist_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_watched(db: &Database, sha256: &str, watched: bool) -> Result<(), AniqueueError> {
    let sha256 = sha256.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO mylist_state (sha256, watched) VALUES (?1, ?2)
                 ON CONFLICT(sha256) DO UPDATE SET
                    watched = excluded.watched,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![sha256, watched],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_mylist_state(
    db: &Database,
    sha256: &str,
) -> Result<Option<MyListState>, AniqueueError> {
    let sha256 = sha256.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT mylist_id, watched FROM mylist_state WHERE sha256 = ?1",
                params![sha256],
                |row| {
                    Ok(MyListState {
                        mylist_id: row.get::<_, Option<i64>>(0)?.map(|id| id as u64),
                        watched: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("library.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn file_hash_upsert_replaces_previous() {
        let (db, _dir) = setup_db().await;
        let mut hash = FileHash {
            path: "/media/show/ep01.mkv".into(),
            size: 1024,
            sha256: "aa".into(),
            ed2k: None,
        };
        upsert_file_hash(&db, &hash).await.unwrap();

        hash.size = 2048;
        hash.sha256 = "bb".into();
        hash.ed2k = Some("cc".into());
        upsert_file_hash(&db, &hash).await.unwrap();

        let stored = get_file_hash(&db, "/media/show/ep01.mkv").await.unwrap().unwrap();
        assert_eq!(stored, hash);
        assert!(get_file_hash(&db, "/nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mylist_state_keeps_id_when_only_watched_changes() {
        let (db, _dir) = setup_db().await;
        mark_in_mylist(&db, "aa", Some(77)).await.unwrap();
        set_watched(&db, "aa", true).await.unwrap();
        mark_in_mylist(&db, "aa", None).await.unwrap();

        let state = get_mylist_state(&db, "aa").await.unwrap().unwrap();
        assert_eq!(state.mylist_id, Some(77));
        assert!(state.watched);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn anime_xml_and_links_round_trip() {
        let (db, _dir) = setup_db().await;
        upsert_anime_xml(&db, 1, "<anime id=\"1\"/>").await.unwrap();
        upsert_file_link(
            &db,
            &FileLink {
                sha256: "aa".into(),
                file_id: 10,
                anime_id: 1,
                episode_id: 100,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            get_anime_xml(&db, 1).await.unwrap().as_deref(),
            Some("<anime id=\"1\"/>")
        );
        assert_eq!(get_file_link(&db, "aa").await.unwrap().unwrap().episode_id, 100);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mylist_snapshots_are_capped() {
        let (db, _dir) = setup_db().await;
        for i in 0..5 {
            insert_mylist_snapshot(&db, &format!("<mylist n=\"{i}\"/>")).await.unwrap();
        }
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM anidb_mylist_snapshots", [], |row| {
                    row.get(0)
                })
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
        db.close().await.unwrap();
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in command chains running through the real processors.

use std::time::Duration;

use aniqueue_commands::{GetAnimeHttp, HashFile, ProcessFile, SyncMyList, UpdateWatched};
use aniqueue_core::{Channel, FileHash, FileLink, LibraryStore};
use aniqueue_test_utils::{QueueHarness, IMAGE_BASE_URL};
use tracing_test::traced_test;

const WAIT: Duration = Duration::from_secs(10);
const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
const ABC_ED2K: &str = "a448017aaf21d8525fc10ae87aa6729d";

fn identified(path: &str, sha256: &str) -> (FileHash, FileLink) {
    (
        FileHash {
            path: path.to_string(),
            size: 3,
            sha256: sha256.to_string(),
            ed2k: Some("0123456789abcdef0123456789abcdef".to_string()),
        },
        FileLink {
            sha256: sha256.to_string(),
            file_id: 10,
            anime_id: 20,
            episode_id: 30,
        },
    )
}

#[tokio::test]
async fn hashing_a_file_records_it_and_schedules_processing() {
    let h = QueueHarness::new().await.unwrap();
    let path = h.dir().join("episode01.mkv");
    std::fs::write(&path, b"abc").unwrap();
    let path = path.to_string_lossy().into_owned();

    h.udp.push_reply("200 sess LOGIN ACCEPTED");
    h.udp.push_reply("320 NO SUCH FILE");

    h.start();
    h.enqueue(&HashFile::new(path.clone())).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    let hash = h.library.file_hash(&path).await.unwrap().unwrap();
    assert_eq!(hash.sha256, ABC_SHA256);
    assert_eq!(hash.ed2k.as_deref(), Some(ABC_ED2K));
    assert_eq!(hash.size, 3);

    let sent = h.udp.sent();
    assert_eq!(
        sent[1],
        format!("FILE size=3&ed2k={ABC_ED2K}&fmask=7000000000&amask=00000000&s=sess")
    );
    assert!(h.library.file_link(ABC_SHA256).await.unwrap().is_none());
    h.shutdown().await;
}

#[tokio::test]
async fn hashed_file_is_identified_and_added_to_mylist() {
    let h = QueueHarness::new().await.unwrap();
    let path = h.dir().join("episode05.mkv");
    std::fs::write(&path, b"abc").unwrap();
    let path = path.to_string_lossy().into_owned();

    h.udp.push_reply("200 sess LOGIN ACCEPTED");
    h.udp.push_reply("220 FILE\n10|20|30");
    h.udp.push_reply("210 MYLIST ENTRY ADDED\n777");
    h.http
        .push_body("<anime id=\"20\"><title>Show</title><picture>20.jpg</picture></anime>");

    h.start();
    h.enqueue(&HashFile::new(path.clone())).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    let link = h.library.file_link(ABC_SHA256).await.unwrap().unwrap();
    assert_eq!((link.file_id, link.anime_id, link.episode_id), (10, 20, 30));
    assert!(h.library.anime_xml(20).await.unwrap().is_some());
    let state = h.library.mylist_state(ABC_SHA256).await.unwrap().unwrap();
    assert_eq!(state.mylist_id, Some(777));
    assert!(h.udp.sent()[1].contains(&format!("ed2k={ABC_ED2K}")));
    h.shutdown().await;
}

#[tokio::test]
async fn processing_an_unhashed_file_hashes_it_first() {
    let h = QueueHarness::new().await.unwrap();
    let path = h.dir().join("episode02.mkv");
    std::fs::write(&path, b"abc").unwrap();
    let path = path.to_string_lossy().into_owned();

    h.start();
    h.enqueue(&ProcessFile::new(path.clone())).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    assert!(h.library.file_hash(&path).await.unwrap().is_some());
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn hashing_gives_up_on_a_missing_file() {
    let h = QueueHarness::builder()
        .with_hashing_times(Duration::from_secs(3), Duration::ZERO)
        .build()
        .await
        .unwrap();
    let path = h.dir().join("never-arrives.mkv");
    let path = path.to_string_lossy().into_owned();

    let started = tokio::time::Instant::now();
    h.start();
    h.enqueue(&HashFile::new(path.clone())).await.unwrap();
    assert!(h.wait_until_drained(Duration::from_secs(60)).await);

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(h.library.file_hash(&path).await.unwrap().is_none());
    assert_eq!(h.pending(Channel::General).await, 0);
    h.shutdown().await;
}

#[tokio::test]
async fn identified_file_pulls_metadata_cover_and_mylist_entry() {
    let h = QueueHarness::new().await.unwrap();
    let (hash, _) = identified("/media/show/01.mkv", "feed");
    h.library.insert_file(hash, None);

    h.udp.push_reply("200 sess LOGIN ACCEPTED");
    h.udp.push_reply("220 FILE\n10|20|30");
    h.udp.push_reply("210 MYLIST ENTRY ADDED\n777");
    h.http
        .push_body("<anime id=\"20\"><title>Show</title><picture>20.jpg</picture></anime>");

    h.start();
    h.enqueue(&ProcessFile::new("/media/show/01.mkv")).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    let link = h.library.file_link("feed").await.unwrap().unwrap();
    assert_eq!((link.file_id, link.anime_id, link.episode_id), (10, 20, 30));

    let xml = h.library.anime_xml(20).await.unwrap().unwrap();
    assert!(xml.contains("<title>Show</title>"));
    assert_eq!(h.http.requests(), vec!["request=anime&aid=20"]);

    let cover = h.dir().join("images").join("anime_cover").join("20.jpg");
    assert!(cover.exists());
    assert_eq!(h.images.requests(), vec![format!("{IMAGE_BASE_URL}/20.jpg")]);

    let state = h.library.mylist_state("feed").await.unwrap().unwrap();
    assert_eq!(state.mylist_id, Some(777));

    let sent = h.udp.sent();
    assert!(sent[1].starts_with("FILE size=3&ed2k=0123456789abcdef0123456789abcdef"));
    assert_eq!(sent[2], "MYLISTADD fid=10&state=1&s=sess");
    h.shutdown().await;
}

#[tokio::test]
async fn known_file_with_cached_metadata_schedules_nothing_new() {
    let h = QueueHarness::new().await.unwrap();
    let (hash, link) = identified("/media/show/02.mkv", "cafe");
    h.library.insert_file(hash, Some(link));
    h.library.store_anime_xml(20, "<anime id=\"20\"/>").await.unwrap();
    h.library.mark_in_mylist("cafe", Some(5)).await.unwrap();

    h.start();
    h.enqueue(&ProcessFile::new("/media/show/02.mkv")).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    assert!(h.udp.sent().is_empty());
    assert!(h.http.requests().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn http_ban_during_anime_fetch_pauses_and_keeps_the_command() {
    let h = QueueHarness::new().await.unwrap();
    h.http.push_body("<error>Banned</error>");

    h.start();
    h.enqueue(&GetAnimeHttp::new(5)).await.unwrap();
    let general = h.processor(Channel::General).clone();
    let memory = h.memory_store.clone().unwrap();
    assert!(
        h.wait_until(WAIT, || general.is_paused() && memory.keys() == vec!["GetAnimeHttp_5"])
            .await
    );

    assert!(h.ctx.anidb.http.ban().is_banned());
    assert!(h.library.anime_xml(5).await.unwrap().is_none());
    // The image channel keeps running while general is paused.
    assert!(!h.processor(Channel::Images).is_paused());
    h.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn anime_error_reply_is_logged_and_dropped() {
    let h = QueueHarness::new().await.unwrap();
    h.http.push_body("<error code=\"330\">No such anime</error>");

    h.start();
    h.enqueue(&GetAnimeHttp::new(404)).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    assert!(h.library.anime_xml(404).await.unwrap().is_none());
    assert!(!h.processor(Channel::General).is_paused());
    assert!(logs_contain("command did not complete"));
    assert!(logs_contain("No such anime"));
    h.shutdown().await;
}

#[tokio::test]
async fn watched_update_adds_a_missing_entry_first() {
    let h = QueueHarness::new().await.unwrap();
    let (hash, link) = identified("/media/show/03.mkv", "beef");
    h.library.insert_file(hash, Some(link));

    h.udp.push_reply("200 s1 LOGIN ACCEPTED");
    h.udp.push_reply("411 NO SUCH MYLIST ENTRY");
    h.udp.push_reply("210 MYLIST ENTRY ADDED\n88");

    h.start();
    h.enqueue(&UpdateWatched::new("beef", true)).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    let sent = h.udp.sent();
    assert_eq!(sent[1], "MYLISTADD fid=10&edit=1&viewed=1&s=s1");
    assert_eq!(sent[2], "MYLISTADD fid=10&state=1&s=s1");
    let state = h.library.mylist_state("beef").await.unwrap().unwrap();
    assert_eq!(state.mylist_id, Some(88));
    assert!(!state.watched);
    h.shutdown().await;
}

#[tokio::test]
async fn watched_toggles_apply_in_order() {
    let h = QueueHarness::new().await.unwrap();
    let (hash, link) = identified("/media/show/04.mkv", "f00d");
    h.library.insert_file(hash, Some(link));

    h.udp.push_reply("200 s2 LOGIN ACCEPTED");
    h.udp.push_reply("311 MYLIST ENTRY EDITED");
    h.udp.push_reply("311 MYLIST ENTRY EDITED");
    h.udp.push_reply("311 MYLIST ENTRY EDITED");

    for watched in [true, false, true] {
        h.enqueue(&UpdateWatched::new("f00d", watched)).await.unwrap();
    }
    h.start();
    assert!(h.wait_until_drained(WAIT).await);

    let viewed: Vec<String> = h
        .udp
        .sent()
        .into_iter()
        .filter(|s| s.contains("edit=1"))
        .collect();
    assert_eq!(viewed.len(), 3);
    assert!(viewed[0].contains("viewed=1"));
    assert!(viewed[1].contains("viewed=0"));
    assert!(viewed[2].contains("viewed=1"));
    assert!(h.library.mylist_state("f00d").await.unwrap().unwrap().watched);
    h.shutdown().await;
}

#[tokio::test]
async fn mylist_sync_stores_the_snapshot() {
    let h = QueueHarness::new().await.unwrap();
    h.http.push_body("<mylistsummary><anime aid=\"20\"/></mylistsummary>");

    h.start();
    h.enqueue(&SyncMyList::new()).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    assert_eq!(
        h.library.mylist_snapshots(),
        vec!["<mylistsummary><anime aid=\"20\"/></mylistsummary>"]
    );
    assert_eq!(
        h.http.requests(),
        vec!["request=mylistsummary&user=tester&pass=hunter2"]
    );
    h.shutdown().await;
}

#[tokio::test]
async fn mylist_sync_without_credentials_is_skipped() {
    let h = QueueHarness::builder()
        .without_credentials()
        .build()
        .await
        .unwrap();

    h.start();
    h.enqueue(&SyncMyList::new()).await.unwrap();
    assert!(h.wait_until_drained(WAIT).await);

    assert!(h.http.requests().is_empty());
    assert!(h.library.mylist_snapshots().is_empty());
    h.shutdown().await;
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end processor tests.
//!
//! Each test builds an isolated QueueHarness. Probe commands stand in for the
//! built-ins of the command types they borrow.

use std::time::Duration;

use aniqueue_bus::QueueEvent;
use aniqueue_core::{BanKind, Channel, CommandStore, CommandType, NewCommand, ProcessorState};
use aniqueue_queue::{EnqueueOutcome, ProcessorSettings};
use aniqueue_test_utils::{ProbeBehavior, ProbeCommand, QueueHarness};
use tracing_test::traced_test;

const WAIT: Duration = Duration::from_secs(10);

async fn probe_harness() -> QueueHarness {
    QueueHarness::builder()
        .with_probe(CommandType::SyncMyList)
        .with_probe(CommandType::GetAnimeHttp)
        .with_probe(CommandType::HashFile)
        .with_probe(CommandType::DownloadImage)
        .build()
        .await
        .unwrap()
}

fn general(name: &str, behavior: ProbeBehavior) -> ProbeCommand {
    ProbeCommand::new(name, CommandType::SyncMyList, behavior)
}

// ---- Ordering ----

#[tokio::test]
async fn commands_run_by_priority_then_arrival() {
    let h = probe_harness().await;
    h.enqueue(&ProbeCommand::succeed("late", CommandType::SyncMyList).with_priority(7))
        .await
        .unwrap();
    h.enqueue(&ProbeCommand::succeed("first", CommandType::SyncMyList).with_priority(1))
        .await
        .unwrap();
    h.enqueue(&ProbeCommand::succeed("mid-a", CommandType::SyncMyList).with_priority(4))
        .await
        .unwrap();
    h.enqueue(&ProbeCommand::succeed("mid-b", CommandType::SyncMyList).with_priority(4))
        .await
        .unwrap();

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished(), vec!["first", "mid-a", "mid-b", "late"]);
    h.shutdown().await;
}

#[tokio::test]
async fn type_priority_applies_without_override() {
    let h = probe_harness().await;
    // SyncMyList defaults to 7, GetAnimeHttp to 2.
    h.enqueue(&ProbeCommand::succeed("sync", CommandType::SyncMyList))
        .await
        .unwrap();
    h.enqueue(&ProbeCommand::succeed("anime", CommandType::GetAnimeHttp))
        .await
        .unwrap();

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished(), vec!["anime", "sync"]);
    h.shutdown().await;
}

#[tokio::test]
async fn a_channel_runs_one_command_at_a_time() {
    let h = probe_harness().await;
    for name in ["a", "b", "c", "d"] {
        h.enqueue(&general(name, ProbeBehavior::Sleep { millis: 20 }))
            .await
            .unwrap();
    }

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished().len(), 4);
    assert_eq!(h.probes.max_in_flight(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn channels_do_not_wait_on_each_other() {
    let h = probe_harness().await;
    h.start();
    h.enqueue(&general("slow", ProbeBehavior::Sleep { millis: 60_000 }))
        .await
        .unwrap();
    assert!(h.wait_until(WAIT, || h.probes.started() == vec!["slow"]).await);

    h.enqueue(&ProbeCommand::succeed("hash", CommandType::HashFile))
        .await
        .unwrap();
    h.enqueue(&ProbeCommand::succeed("image", CommandType::DownloadImage))
        .await
        .unwrap();
    assert!(h.wait_until(WAIT, || h.probes.finished().len() == 2).await);
    assert_eq!(h.processor(Channel::General).state(), ProcessorState::Running);

    // Shutdown interrupts the sleeper; its record survives for the next start.
    h.shutdown().await;
    assert_eq!(h.pending(Channel::General).await, 1);
    assert_eq!(h.processor(Channel::General).state(), ProcessorState::Stopped);
}

#[tokio::test]
async fn hasher_and_image_work_leaves_general_idle() {
    let h = probe_harness().await;
    h.enqueue(&ProbeCommand::succeed("hash", CommandType::HashFile))
        .await
        .unwrap();
    h.enqueue(&ProbeCommand::succeed("image", CommandType::DownloadImage))
        .await
        .unwrap();

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    let mut finished = h.probes.finished();
    finished.sort();
    assert_eq!(finished, vec!["hash", "image"]);
    assert_eq!(h.processor(Channel::General).state(), ProcessorState::Idle);
    h.shutdown().await;
}

// ---- Failures ----

#[tokio::test]
async fn failures_and_panics_are_dropped_and_the_worker_survives() {
    let h = probe_harness().await;
    h.enqueue(&general("fails", ProbeBehavior::Fail)).await.unwrap();
    h.enqueue(&general("panics", ProbeBehavior::Panic)).await.unwrap();
    h.enqueue(&general("fine", ProbeBehavior::Succeed)).await.unwrap();

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.started(), vec!["fails", "panics", "fine"]);
    assert_eq!(h.probes.finished(), vec!["fine"]);
    assert!(h.processor(Channel::General).is_task_alive());
    assert_eq!(h.pending(Channel::General).await, 0);
    h.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn failures_are_logged_with_key_type_and_channel() {
    let h = probe_harness().await;
    h.enqueue(&general("fails", ProbeBehavior::Fail)).await.unwrap();
    h.enqueue(&general("panics", ProbeBehavior::Panic)).await.unwrap();

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    assert!(logs_contain("command failed"));
    assert!(logs_contain("command panicked"));
    assert!(logs_contain("Probe_fails"));
    assert!(logs_contain("Probe_panics"));
    assert!(logs_contain("SyncMyList"));
    assert!(logs_contain("channel=general"));
    h.shutdown().await;
}

#[tokio::test]
async fn unresolvable_records_stay_in_the_store() {
    let h = probe_harness().await;
    let memory = h.memory_store.clone().unwrap();
    let mut unknown = NewCommand::new(CommandType::SyncMyList, "Mystery_1", "{}");
    unknown.command_type = 99;
    unknown.priority = 0;
    let unknown_id = h.store.save(&unknown).await.unwrap();
    let mut garbled = NewCommand::new(CommandType::SyncMyList, "Garbled_1", "not json");
    garbled.priority = 0;
    let garbled_id = h.store.save(&garbled).await.unwrap();

    h.enqueue(&general("after", ProbeBehavior::Succeed)).await.unwrap();

    // Unresolved records are passed over in the same drain pass.
    h.start();
    assert!(h.wait_until(WAIT, || h.probes.finished() == vec!["after"]).await);

    assert!(memory.is_claimed(unknown_id));
    assert!(memory.is_claimed(garbled_id));
    assert_eq!(memory.keys(), vec!["Mystery_1", "Garbled_1"]);
    assert!(h.processor(Channel::General).is_task_alive());
    h.shutdown().await;
}

// ---- Bans ----

#[tokio::test]
async fn ban_pauses_the_channel_and_requeues_the_command() {
    let h = probe_harness().await;
    let memory = h.memory_store.clone().unwrap();
    h.enqueue(&general("banned", ProbeBehavior::BanOnce(BanKind::Http)))
        .await
        .unwrap();
    h.enqueue(&general("after", ProbeBehavior::Succeed)).await.unwrap();

    h.start();
    let general_queue = h.processor(Channel::General).clone();
    assert!(
        h.wait_until(WAIT, || {
            general_queue.is_paused() && memory.keys().contains(&"Probe_banned".to_string())
        })
        .await
    );
    assert_eq!(h.probes.started(), vec!["banned"]);
    assert!(h.ctx.anidb.any_banned());
    assert_eq!(memory.records().len(), 2);

    let status = general_queue.status();
    assert!(status.paused);
    assert!(status.pause_started_at.is_some());
    assert_eq!(status.state, ProcessorState::Paused);
    assert!(!h.processor(Channel::Hasher).is_paused());

    h.queues.clear_bans();
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished(), vec!["after", "banned"]);
    assert!(!h.ctx.anidb.any_banned());
    h.shutdown().await;
}

#[tokio::test]
async fn banned_command_is_dropped_when_requeue_is_disabled() {
    let h = QueueHarness::builder()
        .with_probe(CommandType::SyncMyList)
        .with_processor_settings(ProcessorSettings {
            pause_poll: Duration::from_millis(20),
            pause_timeout: Duration::from_secs(3600),
            requeue_on_ban: false,
        })
        .build()
        .await
        .unwrap();
    h.enqueue(&general("banned", ProbeBehavior::Ban(BanKind::Udp)))
        .await
        .unwrap();

    h.start();
    let general_queue = h.processor(Channel::General).clone();
    assert!(h.wait_until(WAIT, || general_queue.is_paused()).await);
    assert!(h.wait_until_drained(WAIT).await);
    assert!(h.memory_store.as_ref().unwrap().records().is_empty());
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn long_pause_clears_bans_and_resumes() {
    let h = QueueHarness::builder()
        .with_probe(CommandType::SyncMyList)
        .with_processor_settings(ProcessorSettings {
            pause_poll: Duration::from_secs(1),
            pause_timeout: Duration::from_secs(120),
            requeue_on_ban: true,
        })
        .build()
        .await
        .unwrap();
    h.enqueue(&general("banned", ProbeBehavior::BanOnce(BanKind::Http)))
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    h.start();
    assert!(h.wait_until_drained(Duration::from_secs(600)).await);

    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(h.probes.started(), vec!["banned", "banned"]);
    assert!(!h.ctx.anidb.any_banned());
    assert!(!h.processor(Channel::General).is_paused());
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn default_pause_lasts_six_hours() {
    let h = QueueHarness::builder()
        .with_probe(CommandType::SyncMyList)
        .with_processor_settings(ProcessorSettings::default())
        .build()
        .await
        .unwrap();
    h.enqueue(&general("banned", ProbeBehavior::BanOnce(BanKind::Udp)))
        .await
        .unwrap();
    h.start();
    let general_queue = h.processor(Channel::General).clone();
    assert!(h.wait_until(WAIT, || general_queue.is_paused()).await);

    tokio::time::sleep(Duration::from_secs(5 * 3600)).await;
    assert!(general_queue.is_paused());
    assert_eq!(h.probes.started().len(), 1);

    tokio::time::sleep(Duration::from_secs(3600 + 10)).await;
    assert!(!general_queue.is_paused());
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished(), vec!["banned"]);
    h.shutdown().await;
}

#[tokio::test]
async fn manual_pause_holds_work_until_resumed() {
    let h = probe_harness().await;
    h.queues.pause(Channel::General);
    h.start();
    h.enqueue(&general("held", ProbeBehavior::Succeed)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.probes.started().is_empty());
    assert_eq!(h.pending(Channel::General).await, 1);

    h.queues.resume(Channel::General);
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished(), vec!["held"]);
    h.shutdown().await;
}

// ---- Enqueue semantics ----

#[tokio::test]
async fn duplicate_keys_are_skipped_except_for_watched_updates() {
    let h = probe_harness().await;
    let probe = general("once", ProbeBehavior::Succeed);
    assert!(h.enqueue(&probe).await.unwrap().is_enqueued());
    assert_eq!(h.enqueue(&probe).await.unwrap(), EnqueueOutcome::Duplicate);

    let watched = aniqueue_commands::UpdateWatched::new("abc", true);
    let unwatched = aniqueue_commands::UpdateWatched::new("abc", false);
    assert!(h.enqueue(&watched).await.unwrap().is_enqueued());
    assert!(h.enqueue(&unwatched).await.unwrap().is_enqueued());
    assert!(h.enqueue(&watched).await.unwrap().is_enqueued());

    assert_eq!(h.pending(Channel::General).await, 4);
}

#[tokio::test]
async fn clear_empties_one_channel_and_publishes_depth() {
    let h = probe_harness().await;
    let mut events = h.bus.subscribe();
    for name in ["a", "b", "c"] {
        h.enqueue(&general(name, ProbeBehavior::Succeed)).await.unwrap();
    }
    h.enqueue(&ProbeCommand::succeed("hash", CommandType::HashFile))
        .await
        .unwrap();

    assert_eq!(h.queues.clear(Channel::General).await.unwrap(), 3);
    assert_eq!(h.pending(Channel::General).await, 0);
    assert_eq!(h.pending(Channel::Hasher).await, 1);

    let mut last_general_depth = None;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::DepthChanged {
            channel: Channel::General,
            count,
        } = event.event
        {
            last_general_depth = Some(count);
        }
    }
    assert_eq!(last_general_depth, Some(0));
}

#[tokio::test]
async fn status_reports_every_channel() {
    let h = probe_harness().await;
    h.enqueue(&ProbeCommand::succeed("img", CommandType::DownloadImage))
        .await
        .unwrap();
    h.queues.pause(Channel::Images);

    let statuses = h.queues.status().await;
    assert_eq!(statuses.len(), 3);
    let images = statuses
        .iter()
        .find(|s| s.channel == Channel::Images)
        .unwrap();
    assert!(images.paused);
    assert_eq!(images.queue_count, 1);
    assert!(!images.worker_running);

    let general = statuses
        .iter()
        .find(|s| s.channel == Channel::General)
        .unwrap();
    assert_eq!(general.state, ProcessorState::Idle);
    assert_eq!(general.queue_count, 0);
}

#[tokio::test]
async fn parked_worker_reports_idle_not_running() {
    let h = probe_harness().await;
    h.enqueue(&general("one", ProbeBehavior::Succeed)).await.unwrap();
    h.start();
    assert!(h.wait_until_drained(WAIT).await);

    let general = h.processor(Channel::General).clone();
    assert!(h.wait_until(WAIT, || general.state() == ProcessorState::Idle).await);
    let status = general.status();
    assert!(general.is_task_alive());
    assert!(!status.worker_running);

    h.queues.pause(Channel::General);
    assert!(general.status().worker_running);
    h.shutdown().await;
}

// ---- Persistence ----

#[tokio::test]
async fn interrupted_commands_resume_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    {
        let h = QueueHarness::builder()
            .with_sqlite(&db)
            .with_probe(CommandType::SyncMyList)
            .build()
            .await
            .unwrap();
        h.enqueue(&general("one", ProbeBehavior::Succeed)).await.unwrap();
        h.enqueue(&general("two", ProbeBehavior::Succeed)).await.unwrap();
        // Claimed as if a worker crashed mid-command.
        let claimed = h.store.next_for(Channel::General).await.unwrap().unwrap();
        assert_eq!(claimed.key, "Probe_one");
        h.shutdown().await;
    }

    let h = QueueHarness::builder()
        .with_sqlite(&db)
        .with_probe(CommandType::SyncMyList)
        .build()
        .await
        .unwrap();
    assert_eq!(h.pending(Channel::General).await, 2);

    h.start();
    assert!(h.wait_until_drained(WAIT).await);
    assert_eq!(h.probes.finished(), vec!["one", "two"]);
    h.shutdown().await;
}

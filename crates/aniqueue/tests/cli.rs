// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the built binary against a throwaway config.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let db = dir.path().join("aniqueue.db");
    let config = dir.path().join("aniqueue.toml");
    std::fs::write(
        &config,
        format!(
            "[storage]\ndatabase_path = {:?}\n\n[server]\nlog_level = \"warn\"\n",
            db.to_string_lossy()
        ),
    )
    .unwrap();
    config
}

fn aniqueue(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aniqueue"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn pending_json(config: &Path) -> serde_json::Value {
    let output = aniqueue(config, &["status", "--json"]);
    assert!(output.status.success(), "status failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn enqueue_then_status_reports_pending_work() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let output = aniqueue(&config, &["enqueue", "anime", "22"]);
    assert!(output.status.success(), "enqueue failed: {output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("enqueued"));

    let output = aniqueue(&config, &["enqueue", "anime", "22"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("already queued"));

    aniqueue(&config, &["enqueue", "hash", "/media/show/01.mkv"]);

    let status = pending_json(&config);
    assert_eq!(status["total_pending"], 2);
    assert_eq!(status["channels"][0]["channel"], "general");
    assert_eq!(status["channels"][0]["pending"], 1);
    assert_eq!(status["channels"][1]["pending"], 1);
}

#[test]
fn clear_removes_a_channel() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    aniqueue(&config, &["enqueue", "sync-mylist"]);

    let output = aniqueue(&config, &["clear", "general"]);
    assert!(output.status.success(), "clear failed: {output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("removed 1"));
    assert_eq!(pending_json(&config)["total_pending"], 0);
}

#[test]
fn invalid_config_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.toml");
    std::fs::write(&config, "[queue]\npause_pol_secs = 5\n").unwrap();

    let output = aniqueue(&config, &["status"]);
    assert!(!output.status.success());
}

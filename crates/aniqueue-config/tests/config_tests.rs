// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the aniqueue configuration system.

use aniqueue_config::diagnostic::ConfigError;
use aniqueue_config::model::AniqueueConfig;
use aniqueue_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[server]
log_level = "debug"

[storage]
database_path = "/tmp/aniqueue-test.db"
wal_mode = false

[queue]
pause_poll_secs = 2
pause_timeout_hours = 1.5
requeue_on_ban = false

[anidb]
username = "someone"
password = "secret"
udp_port = 9001
http_ban_reset_hours = 24.0

[anidb.udp_rate]
short_delay_ms = 3000
long_delay_ms = 5000

[hashing]
file_access_budget_secs = 10

[images]
directory = "/tmp/images"

[schedule]
mylist_sync_hours = 0
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/aniqueue-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.queue.pause_poll_secs, 2);
    assert_eq!(config.queue.pause_timeout().as_secs(), 5400);
    assert!(!config.queue.requeue_on_ban);
    assert_eq!(config.anidb.username.as_deref(), Some("someone"));
    assert_eq!(config.anidb.udp_port, 9001);
    assert_eq!(config.anidb.http_ban_reset_hours, 24.0);
    assert_eq!(config.anidb.udp_rate.short_delay_ms, 3000);
    assert_eq!(config.anidb.udp_rate.long_delay_ms, 5000);
    // Unset fields of a partially given table fall back to field defaults.
    assert_eq!(config.anidb.udp_rate.reset_period_secs, 1800);
    assert_eq!(config.anidb.http_rate.short_delay_ms, 2000);
    assert_eq!(config.hashing.file_access_budget_secs, 10);
    assert_eq!(config.hashing.settle_secs, 3);
    assert_eq!(config.images.directory, "/tmp/images");
    assert_eq!(config.schedule.mylist_sync_hours, 0);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.queue.pause_poll_secs, 5);
    assert_eq!(config.queue.pause_timeout_hours, 6.0);
    assert_eq!(config.anidb.http_ban_reset_hours, 12.0);
    assert_eq!(config.anidb.udp_ban_reset_hours, 1.5);
    assert_eq!(config.anidb.udp_rate.short_delay_ms, 2500);
    assert_eq!(config.anidb.udp_host, "api.anidb.net");
    assert!(config.anidb.username.is_none());
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = r#"
[queue]
pause_pol_secs = 3
"#;

    let errors = load_and_validate_str(toml).expect_err("typo should be rejected");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } if key == "pause_pol_secs" => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("pause_poll_secs"));
}

#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;
    let result = load_config_from_str(toml);
    assert!(result.is_err());
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[anidb]
udp_port = "nine thousand"
"#;
    let errors = load_and_validate_str(toml).expect_err("string port should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { .. })));
}

#[test]
fn semantic_errors_surface_through_validation() {
    let toml = r#"
[queue]
pause_poll_secs = 0

[anidb]
password = "orphan"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn infinite_pause_timeout_is_rejected() {
    let errors = load_and_validate_str("[queue]\npause_timeout_hours = inf\n")
        .expect_err("inf must not validate");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Validation { message } if message.contains("pause_timeout_hours")
    )));
}

#[test]
fn config_round_trips_through_toml() {
    let config = AniqueueConfig::default();
    let rendered = toml::to_string(&config).expect("config should serialize");
    let parsed = load_and_validate_str(&rendered).expect("rendered config should load");
    assert_eq!(parsed.anidb.http_rate, config.anidb.http_rate);
    assert_eq!(parsed.storage.database_path, config.storage.database_path);
}

#[test]
#[serial_test::serial]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[anidb]
udp_port = 9100
"#,
        )?;
        jail.set_env("ANIQUEUE_ANIDB_UDP_PORT", "9200");
        jail.set_env("ANIQUEUE_QUEUE_PAUSE_POLL_SECS", "9");

        let config = load_and_validate_path(std::path::Path::new("custom.toml"))
            .expect("config should load");
        assert_eq!(config.anidb.udp_port, 9200);
        assert_eq!(config.queue.pause_poll_secs, 9);
        Ok(())
    });
}

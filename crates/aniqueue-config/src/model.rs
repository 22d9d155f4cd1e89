// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the aniqueue command scheduler.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level aniqueue configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AniqueueConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Queue processor settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// AniDB API access settings.
    #[serde(default)]
    pub anidb: AniDbConfig,

    /// File hashing settings.
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Image download settings.
    #[serde(default)]
    pub images: ImagesConfig,

    /// Periodic jobs.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("aniqueue").join("aniqueue.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("aniqueue.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Queue processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Seconds between pause checks while a channel is paused.
    #[serde(default = "default_pause_poll_secs")]
    pub pause_poll_secs: u64,

    /// A pause older than this is lifted automatically, together with any AniDB ban.
    #[serde(default = "default_pause_timeout_hours")]
    pub pause_timeout_hours: f64,

    /// Re-enqueue a command that was interrupted by a ban instead of dropping it.
    #[serde(default = "default_requeue_on_ban")]
    pub requeue_on_ban: bool,
}

impl QueueConfig {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_secs(self.pause_poll_secs)
    }

    /// Saturates at `Duration::MAX` for values validation would reject.
    pub fn pause_timeout(&self) -> Duration {
        hours_to_duration(self.pause_timeout_hours.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pause_poll_secs: default_pause_poll_secs(),
            pause_timeout_hours: default_pause_timeout_hours(),
            requeue_on_ban: default_requeue_on_ban(),
        }
    }
}

/// `hours` as a [`Duration`], or `None` if it is negative, not finite, or
/// too large to represent.
pub fn hours_to_duration(hours: f64) -> Option<Duration> {
    if !hours.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(hours * 3600.0).ok()
}

fn default_pause_poll_secs() -> u64 {
    5
}

fn default_pause_timeout_hours() -> f64 {
    6.0
}

fn default_requeue_on_ban() -> bool {
    true
}

/// AniDB API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AniDbConfig {
    /// AniDB account name. `None` disables UDP commands that need a session.
    #[serde(default)]
    pub username: Option<String>,

    /// AniDB account password.
    #[serde(default)]
    pub password: Option<String>,

    /// Registered client name sent with every request.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Registered client version.
    #[serde(default = "default_client_version")]
    pub client_version: u32,

    /// HTTP API endpoint.
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,

    /// UDP API host.
    #[serde(default = "default_udp_host")]
    pub udp_host: String,

    /// UDP API port.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    /// Local UDP port. AniDB expects a stable one.
    #[serde(default = "default_udp_local_port")]
    pub udp_local_port: u16,

    /// Per-request timeout for both transports.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Hours after which an HTTP ban is expected to lapse.
    #[serde(default = "default_http_ban_reset_hours")]
    pub http_ban_reset_hours: f64,

    /// Hours after which a UDP ban is expected to lapse.
    #[serde(default = "default_udp_ban_reset_hours")]
    pub udp_ban_reset_hours: f64,

    /// HTTP request spacing.
    #[serde(default = "RateLimitConfig::http")]
    pub http_rate: RateLimitConfig,

    /// UDP request spacing.
    #[serde(default = "RateLimitConfig::udp")]
    pub udp_rate: RateLimitConfig,
}

impl AniDbConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AniDbConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            client_name: default_client_name(),
            client_version: default_client_version(),
            http_base_url: default_http_base_url(),
            udp_host: default_udp_host(),
            udp_port: default_udp_port(),
            udp_local_port: default_udp_local_port(),
            request_timeout_secs: default_request_timeout_secs(),
            http_ban_reset_hours: default_http_ban_reset_hours(),
            udp_ban_reset_hours: default_udp_ban_reset_hours(),
            http_rate: RateLimitConfig::http(),
            udp_rate: RateLimitConfig::udp(),
        }
    }
}

fn default_client_name() -> String {
    "aniqueue".to_string()
}

fn default_client_version() -> u32 {
    1
}

fn default_http_base_url() -> String {
    "http://api.anidb.net:9001/httpapi".to_string()
}

fn default_udp_host() -> String {
    "api.anidb.net".to_string()
}

fn default_udp_port() -> u16 {
    9000
}

fn default_udp_local_port() -> u16 {
    4556
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_http_ban_reset_hours() -> f64 {
    12.0
}

fn default_udp_ban_reset_hours() -> f64 {
    1.5
}

/// Two-speed request spacing.
///
/// Calls are spaced by `short_delay_ms` until the handler has been busy for
/// `short_period_secs`, then by `long_delay_ms`. `reset_period_secs` of
/// silence returns the handler to the short delay.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_short_delay_ms")]
    pub short_delay_ms: u64,

    #[serde(default = "default_long_delay_ms")]
    pub long_delay_ms: u64,

    #[serde(default = "default_short_period_secs")]
    pub short_period_secs: u64,

    #[serde(default = "default_reset_period_secs")]
    pub reset_period_secs: u64,
}

impl RateLimitConfig {
    /// Defaults for the HTTP API.
    pub fn http() -> Self {
        Self {
            short_delay_ms: default_short_delay_ms(),
            long_delay_ms: default_long_delay_ms(),
            short_period_secs: default_short_period_secs(),
            reset_period_secs: default_reset_period_secs(),
        }
    }

    /// Defaults for the UDP API.
    pub fn udp() -> Self {
        Self {
            short_delay_ms: 2500,
            ..Self::http()
        }
    }
}

fn default_short_delay_ms() -> u64 {
    2000
}

fn default_long_delay_ms() -> u64 {
    4000
}

fn default_short_period_secs() -> u64 {
    3600
}

fn default_reset_period_secs() -> u64 {
    1800
}

/// File hashing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HashingConfig {
    /// How long a hash command waits for a file to become readable.
    #[serde(default = "default_file_access_budget_secs")]
    pub file_access_budget_secs: u64,

    /// The file size must stay unchanged this long before hashing starts.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            file_access_budget_secs: default_file_access_budget_secs(),
            settle_secs: default_settle_secs(),
        }
    }
}

fn default_file_access_budget_secs() -> u64 {
    60
}

fn default_settle_secs() -> u64 {
    3
}

/// Image download configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesConfig {
    /// Directory downloaded images are written to.
    #[serde(default = "default_images_directory")]
    pub directory: String,

    /// Base URL for AniDB cover images.
    #[serde(default = "default_anidb_image_base_url")]
    pub anidb_image_base_url: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            directory: default_images_directory(),
            anidb_image_base_url: default_anidb_image_base_url(),
        }
    }
}

fn default_images_directory() -> String {
    dirs::data_dir()
        .map(|p| p.join("aniqueue").join("images"))
        .unwrap_or_else(|| std::path::PathBuf::from("images"))
        .to_string_lossy()
        .into_owned()
}

fn default_anidb_image_base_url() -> String {
    "https://cdn.anidb.net/images/main".to_string()
}

/// Periodic job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Hours between MyList syncs. `0` disables the schedule; at most one year.
    #[serde(default = "default_mylist_sync_hours")]
    pub mylist_sync_hours: u64,
}

impl ScheduleConfig {
    /// Longest accepted MyList sync period, one year.
    pub const MAX_MYLIST_SYNC_HOURS: u64 = 24 * 366;

    /// Time between scheduled syncs, `None` when disabled or out of range.
    pub fn mylist_sync_period(&self) -> Option<Duration> {
        match self.mylist_sync_hours {
            0 => None,
            hours => hours.checked_mul(3600).map(Duration::from_secs),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mylist_sync_hours: default_mylist_sync_hours(),
        }
    }
}

fn default_mylist_sync_hours() -> u64 {
    24
}

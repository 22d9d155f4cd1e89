// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./aniqueue.toml` > `~/.config/aniqueue/aniqueue.toml` >
//! `/etc/aniqueue/aniqueue.toml` with environment variable overrides via the
//! `ANIQUEUE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::AniqueueConfig;

/// Top-level sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &[
    "server", "storage", "queue", "anidb", "hashing", "images", "schedule",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/aniqueue/aniqueue.toml`
/// 3. `~/.config/aniqueue/aniqueue.toml`
/// 4. `./aniqueue.toml`
/// 5. `ANIQUEUE_*` environment variables
pub fn load_config() -> Result<AniqueueConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<AniqueueConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AniqueueConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AniqueueConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AniqueueConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AniqueueConfig::default()))
        .merge(Toml::file("/etc/aniqueue/aniqueue.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("aniqueue/aniqueue.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("aniqueue.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `ANIQUEUE_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name is a separator, so
/// `ANIQUEUE_IMAGES_ANIDB_IMAGE_BASE_URL` maps to `images.anidb_image_base_url`.
fn env_provider() -> Env {
    Env::prefixed("ANIQUEUE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One module per command type.

pub mod add_file_to_mylist;
pub mod download_image;
pub mod get_anime_http;
pub mod hash_file;
pub mod process_file;
pub mod sync_mylist;
pub mod update_watched;

use std::path::Path;

use aniqueue_core::AniqueueError;
use tracing::warn;

/// Logs and swallows the failures a command is expected to meet.
///
/// Bans, cancellation and storage faults still reach the processor.
pub(crate) fn expected_failures_handled(
    key: &str,
    result: Result<(), AniqueueError>,
) -> Result<(), AniqueueError> {
    match result {
        Err(
            e @ (AniqueueError::Transport { .. }
            | AniqueueError::Remote { .. }
            | AniqueueError::Auth { .. }
            | AniqueueError::Timeout { .. }
            | AniqueueError::Command { .. }),
        ) => {
            warn!(key, error = %e, "command did not complete");
            Ok(())
        }
        other => other,
    }
}

/// Last path component for descriptions, falling back to the whole path.
pub(crate) fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in commands and the default collaborators they run against.

pub mod commands;
pub mod hashing;
pub mod images;

use aniqueue_core::CommandType;
use aniqueue_queue::CommandRegistry;

pub use commands::add_file_to_mylist::AddFileToMyList;
pub use commands::download_image::{DownloadImage, ImageEntity};
pub use commands::get_anime_http::GetAnimeHttp;
pub use commands::hash_file::HashFile;
pub use commands::process_file::ProcessFile;
pub use commands::sync_mylist::SyncMyList;
pub use commands::update_watched::UpdateWatched;
pub use hashing::DigestHasher;
pub use images::ReqwestImageFetcher;

/// Registers every built-in command type.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register_json::<ProcessFile>(CommandType::ProcessFile);
    registry.register_json::<HashFile>(CommandType::HashFile);
    registry.register_json::<DownloadImage>(CommandType::DownloadImage);
    registry.register_json::<GetAnimeHttp>(CommandType::GetAnimeHttp);
    registry.register_json::<SyncMyList>(CommandType::SyncMyList);
    registry.register_json::<AddFileToMyList>(CommandType::AddFileToMyList);
    registry.register_json::<UpdateWatched>(CommandType::UpdateWatched);
}

/// A registry holding every built-in command type.
pub fn builtin_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_type_has_a_builtin() {
        let registry = builtin_registry();
        for ty in CommandType::iter() {
            assert!(registry.is_registered(ty), "{ty} not registered");
        }
    }
}

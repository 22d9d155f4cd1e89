// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ban state control shared between connection handlers and queue processors.

use chrono::{DateTime, Utc};

use crate::types::BanKind;

/// A component that can be banned by the remote service.
///
/// Queue processors hold these so that the automatic resume after a long
/// pause also lifts the ban.
pub trait BanControl: Send + Sync + 'static {
    /// Which transport this ban applies to.
    fn kind(&self) -> BanKind;

    /// Whether outbound calls are currently refused.
    fn is_banned(&self) -> bool;

    /// When the ban was detected, if banned.
    fn ban_set_at(&self) -> Option<DateTime<Utc>>;

    /// Lifts the ban. No-op when not banned.
    fn clear_ban(&self);
}

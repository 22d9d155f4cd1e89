// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-transport ban flag.

use std::sync::Mutex;

use aniqueue_bus::{EventBus, QueueEvent};
use aniqueue_core::{AniqueueError, BanKind};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{info, warn};

/// Point-in-time view of a ban.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BanState {
    pub banned: bool,
    pub ban_set_at: Option<DateTime<Utc>>,
}

/// Ban flag for one transport.
///
/// Read on every outbound call and written rarely, so a plain mutex is
/// enough. The lock is never held across an await.
#[derive(Debug)]
pub struct BanTracker {
    kind: BanKind,
    reset_hours: f64,
    state: Mutex<BanState>,
    bus: Option<EventBus>,
}

impl BanTracker {
    pub fn new(kind: BanKind, reset_hours: f64, bus: Option<EventBus>) -> Self {
        Self {
            kind,
            reset_hours,
            state: Mutex::new(BanState::default()),
            bus,
        }
    }

    pub fn kind(&self) -> BanKind {
        self.kind
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BanState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> BanState {
        *self.lock()
    }

    pub fn is_banned(&self) -> bool {
        self.lock().banned
    }

    pub fn ban_set_at(&self) -> Option<DateTime<Utc>> {
        self.lock().ban_set_at
    }

    /// Marks the transport banned. A repeat detection moves `ban_set_at` forward.
    pub fn set_banned(&self) {
        let now = Utc::now();
        {
            let mut state = self.lock();
            state.banned = true;
            state.ban_set_at = Some(now);
        }
        let expires_at = self.expiry_from(now);
        warn!(
            kind = %self.kind,
            expires_at = ?expires_at,
            "AniDB ban detected, outbound calls suspended"
        );
        metrics::counter!("aniqueue_anidb_bans_total", "transport" => self.kind.to_string())
            .increment(1);
        self.publish(true, expires_at);
    }

    /// Lifts the ban. Does nothing when not banned.
    pub fn clear(&self) {
        let was_banned = {
            let mut state = self.lock();
            let was = state.banned;
            state.banned = false;
            state.ban_set_at = None;
            was
        };
        if was_banned {
            info!(kind = %self.kind, "AniDB ban cleared");
            self.publish(false, None);
        }
    }

    /// Suggested time the ban lapses. Informational only; nothing clears it automatically.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ban_set_at().and_then(|at| self.expiry_from(at))
    }

    /// The error returned to callers while banned.
    pub fn banned_error(&self) -> AniqueueError {
        AniqueueError::Banned {
            kind: self.kind,
            expires_at: self.expires_at(),
        }
    }

    fn expiry_from(&self, set_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let millis = (self.reset_hours.max(0.0) * 3_600_000.0) as i64;
        set_at.checked_add_signed(ChronoDuration::milliseconds(millis))
    }

    fn publish(&self, banned: bool, expires_at: Option<DateTime<Utc>>) {
        if let Some(bus) = &self.bus {
            bus.publish(QueueEvent::BanChanged {
                kind: self.kind,
                banned,
                expires_at,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unbanned() {
        let ban = BanTracker::new(BanKind::Http, 12.0, None);
        assert!(!ban.is_banned());
        assert!(ban.ban_set_at().is_none());
        assert!(ban.expires_at().is_none());
    }

    #[test]
    fn expiry_is_set_time_plus_reset_hours() {
        let ban = BanTracker::new(BanKind::Udp, 1.5, None);
        ban.set_banned();
        let set_at = ban.ban_set_at().unwrap();
        assert_eq!(
            ban.expires_at().unwrap() - set_at,
            ChronoDuration::minutes(90)
        );
        match ban.banned_error() {
            AniqueueError::Banned { kind, expires_at } => {
                assert_eq!(kind, BanKind::Udp);
                assert!(expires_at.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn repeated_detection_moves_set_time_forward() {
        let ban = BanTracker::new(BanKind::Http, 12.0, None);
        ban.set_banned();
        let first = ban.ban_set_at().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        ban.set_banned();
        assert!(ban.ban_set_at().unwrap() > first);
    }

    #[test]
    fn clear_resets_state() {
        let ban = BanTracker::new(BanKind::Http, 12.0, None);
        ban.set_banned();
        ban.clear();
        assert_eq!(ban.snapshot(), BanState::default());
    }

    #[tokio::test]
    async fn transitions_are_published() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let ban = BanTracker::new(BanKind::Http, 12.0, Some(bus));

        ban.set_banned();
        ban.clear();
        // Clearing twice publishes once.
        ban.clear();

        let first = rx.recv().await.unwrap().event;
        assert!(matches!(
            first,
            QueueEvent::BanChanged { banned: true, kind: BanKind::Http, expires_at: Some(_) }
        ));
        let second = rx.recv().await.unwrap().event;
        assert!(matches!(second, QueueEvent::BanChanged { banned: false, .. }));
        assert!(rx.try_recv().is_err());
    }
}

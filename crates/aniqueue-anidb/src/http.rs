// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API connection handler.

use std::sync::Arc;

use aniqueue_core::{AniqueueError, BanControl, BanKind, HttpTransport};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::ban::BanTracker;
use crate::rate_limiter::RateLimiter;
use crate::udp::mask_secrets;

/// AniDB answers a banned client with an XML error whose text is "Banned".
const BAN_MARKER: &str = ">banned<";

/// Returns `true` when an HTTP body carries the ban marker.
///
/// Case-insensitive substring match; the body is not parsed.
pub fn is_ban_body(body: &str) -> bool {
    body.to_ascii_lowercase().contains(BAN_MARKER)
}

/// Gateway for every HTTP API request.
pub struct HttpConnectionHandler {
    transport: Arc<dyn HttpTransport>,
    limiter: RateLimiter,
    ban: BanTracker,
}

impl HttpConnectionHandler {
    pub fn new(transport: Arc<dyn HttpTransport>, limiter: RateLimiter, ban: BanTracker) -> Self {
        Self {
            transport,
            limiter,
            ban,
        }
    }

    pub fn ban(&self) -> &BanTracker {
        &self.ban
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Sends one request and returns the raw body.
    ///
    /// While banned this fails with [`AniqueueError::Banned`] without touching
    /// the transport. A reply carrying the ban marker sets the ban and fails
    /// the same way.
    pub async fn get(&self, query: &str) -> Result<String, AniqueueError> {
        if self.ban.is_banned() {
            return Err(self.ban.banned_error());
        }

        let body = self
            .limiter
            .ensure_rate(|| async move {
                // A ban may have been detected while this call waited for its slot.
                if self.ban.is_banned() {
                    return Err(self.ban.banned_error());
                }
                debug!(query = %mask_secrets(query), "AniDB HTTP request");
                metrics::counter!("aniqueue_anidb_requests_total", "transport" => "HTTP")
                    .increment(1);
                self.transport.get(query).await
            })
            .await?;

        if is_ban_body(&body) {
            self.ban.set_banned();
            return Err(self.ban.banned_error());
        }
        Ok(body)
    }
}

impl BanControl for HttpConnectionHandler {
    fn kind(&self) -> BanKind {
        BanKind::Http
    }

    fn is_banned(&self) -> bool {
        self.ban.is_banned()
    }

    fn ban_set_at(&self) -> Option<DateTime<Utc>> {
        self.ban.ban_set_at()
    }

    fn clear_ban(&self) {
        self.ban.clear();
    }
}

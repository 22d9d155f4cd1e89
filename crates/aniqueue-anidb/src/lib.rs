// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The only gateway to AniDB.
//!
//! Every outbound call goes through a connection handler, which refuses to
//! talk while banned, spaces calls through its [`RateLimiter`], and checks
//! each raw reply for the service's ban signature before anything parses it.

pub mod ban;
pub mod http;
pub mod rate_limiter;
pub mod transport;
pub mod udp;

use std::sync::Arc;

use aniqueue_bus::EventBus;
use aniqueue_config::model::AniDbConfig;
use aniqueue_core::{AniqueueError, BanControl, BanKind};

pub use ban::{BanState, BanTracker};
pub use http::HttpConnectionHandler;
pub use rate_limiter::RateLimiter;
pub use transport::{ReqwestHttpTransport, TokioUdpTransport};
pub use udp::{Credentials, UdpConnectionHandler, UdpResponse};

/// Both connection handlers, built once and shared by every command.
#[derive(Clone)]
pub struct AniDbHandlers {
    pub http: Arc<HttpConnectionHandler>,
    pub udp: Arc<UdpConnectionHandler>,
}

impl AniDbHandlers {
    pub fn new(http: HttpConnectionHandler, udp: UdpConnectionHandler) -> Self {
        Self {
            http: Arc::new(http),
            udp: Arc::new(udp),
        }
    }

    /// Builds handlers over the real network transports.
    pub async fn connect(config: &AniDbConfig, bus: EventBus) -> Result<Self, AniqueueError> {
        let http_transport = ReqwestHttpTransport::new(config)?;
        let udp_transport = TokioUdpTransport::bind(config).await?;

        let http = HttpConnectionHandler::new(
            Arc::new(http_transport),
            RateLimiter::from_config("http", &config.http_rate),
            BanTracker::new(BanKind::Http, config.http_ban_reset_hours, Some(bus.clone())),
        );
        let udp = UdpConnectionHandler::new(
            Arc::new(udp_transport),
            RateLimiter::from_config("udp", &config.udp_rate),
            BanTracker::new(BanKind::Udp, config.udp_ban_reset_hours, Some(bus)),
            Credentials::from_config(config),
        );
        Ok(Self::new(http, udp))
    }

    /// The ban switches queue processors clear when a long pause times out.
    pub fn ban_controls(&self) -> Vec<Arc<dyn BanControl>> {
        vec![
            self.http.clone() as Arc<dyn BanControl>,
            self.udp.clone() as Arc<dyn BanControl>,
        ]
    }

    /// Whether either transport is banned.
    pub fn any_banned(&self) -> bool {
        self.http.is_banned() || self.udp.is_banned()
    }

    /// Manually lifts both bans.
    pub fn clear_bans(&self) {
        self.http.clear_ban();
        self.udp.clear_ban();
    }

    /// Ends the UDP session, if one is open.
    pub async fn shutdown(&self) {
        self.udp.logout().await;
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! UDP API connection handler and session management.
//!
//! The UDP API is text over datagrams: `COMMAND key=value&key=value`, answered
//! by `CODE message` followed by optional data lines. Most commands need a
//! session key obtained with `AUTH`, which this handler acquires lazily and
//! renews once when the server reports it expired.

use std::sync::Arc;

use aniqueue_config::model::AniDbConfig;
use aniqueue_core::{AniqueueError, BanControl, BanKind, UdpTransport};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ban::BanTracker;
use crate::rate_limiter::RateLimiter;

/// Status codes the handler acts on.
pub mod codes {
    pub const LOGIN_ACCEPTED: u16 = 200;
    pub const LOGIN_ACCEPTED_NEW_VERSION: u16 = 201;
    pub const LOGIN_FAILED: u16 = 500;
    pub const LOGIN_FIRST: u16 = 501;
    pub const CLIENT_VERSION_OUTDATED: u16 = 503;
    pub const CLIENT_BANNED: u16 = 504;
    pub const INVALID_SESSION: u16 = 506;
    pub const BANNED: u16 = 555;
    pub const INTERNAL_SERVER_ERROR: u16 = 600;
    pub const OUT_OF_SERVICE: u16 = 601;
    pub const SERVER_BUSY: u16 = 602;
    pub const TIMEOUT: u16 = 604;
}

/// Account and client identity used for `AUTH`.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub client_name: String,
    pub client_version: u32,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_name", &self.client_name)
            .field("client_version", &self.client_version)
            .finish()
    }
}

impl Credentials {
    /// `None` unless both username and password are configured.
    pub fn from_config(config: &AniDbConfig) -> Option<Self> {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) if !username.is_empty() => Some(Self {
                username: username.clone(),
                password: password.clone(),
                client_name: config.client_name.clone(),
                client_version: config.client_version,
            }),
            _ => None,
        }
    }

    fn auth_command(&self) -> String {
        format!(
            "AUTH user={}&pass={}&protover=3&client={}&clientver={}&enc=UTF8",
            self.username, self.password, self.client_name, self.client_version
        )
    }
}

/// A decoded UDP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpResponse {
    pub code: u16,
    /// Remainder of the first line after the code.
    pub message: String,
    /// Data lines following the status line.
    pub lines: Vec<String>,
}

impl UdpResponse {
    /// Decodes a raw datagram. Invalid UTF-8 is replaced rather than rejected.
    pub fn parse(raw: &[u8]) -> Result<Self, AniqueueError> {
        let text = String::from_utf8_lossy(strip_bom(raw));
        let mut lines = text.lines().map(str::trim_end);
        let status = lines.next().unwrap_or_default().trim_start();

        let code = status
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| AniqueueError::Transport {
                message: format!("malformed UDP reply: {status:?}"),
                source: None,
            })?;
        let message = status.get(3..).unwrap_or_default().trim().to_string();

        Ok(Self {
            code,
            message,
            lines: lines
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    /// First data line split on `|`, the field separator of UDP replies.
    pub fn fields(&self) -> Vec<&str> {
        self.lines
            .first()
            .map(|l| l.split('|').collect())
            .unwrap_or_default()
    }
}

fn strip_bom(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(raw)
}

/// Returns `true` when a raw datagram signals a ban.
///
/// AniDB answers `555` when banned and sends an all-zero datagram when it
/// drops a client outright.
pub fn is_ban_datagram(raw: &[u8]) -> bool {
    if !raw.is_empty() && raw.iter().all(|b| *b == 0) {
        return true;
    }
    let raw = strip_bom(raw);
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    raw[start..].starts_with(b"555")
}

/// Appends the session key to a command.
pub fn with_session(command: &str, session: &str) -> String {
    if command.contains(' ') {
        format!("{command}&s={session}")
    } else {
        format!("{command} s={session}")
    }
}

/// Replaces password and session values so a payload or query can be logged.
pub fn mask_secrets(payload: &str) -> String {
    let (command, params) = match payload.split_once(' ') {
        Some((command, params)) => (Some(command), params),
        None => (None, payload),
    };
    let masked: Vec<String> = params
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key @ ("pass" | "s"), _)) => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect();
    match command {
        Some(command) => format!("{command} {}", masked.join("&")),
        None => masked.join("&"),
    }
}

/// Gateway for every UDP API request.
pub struct UdpConnectionHandler {
    transport: Arc<dyn UdpTransport>,
    limiter: RateLimiter,
    ban: BanTracker,
    credentials: Option<Credentials>,
    session: Mutex<Option<String>>,
}

impl UdpConnectionHandler {
    pub fn new(
        transport: Arc<dyn UdpTransport>,
        limiter: RateLimiter,
        ban: BanTracker,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            transport,
            limiter,
            ban,
            credentials,
            session: Mutex::new(None),
        }
    }

    pub fn ban(&self) -> &BanTracker {
        &self.ban
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The configured account, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Sends a command that needs no session, e.g. `PING`.
    pub async fn send(&self, command: &str) -> Result<UdpResponse, AniqueueError> {
        self.exchange(command).await
    }

    /// Sends a command inside the session, logging in first if needed.
    ///
    /// An expired session (`501`/`506`) triggers one fresh login and one
    /// retry; a second rejection is returned as an auth error.
    pub async fn send_authenticated(&self, command: &str) -> Result<UdpResponse, AniqueueError> {
        let mut session = self.session.lock().await;

        let key = match session.clone() {
            Some(key) => key,
            None => {
                let key = self.login().await?;
                *session = Some(key.clone());
                key
            }
        };
        let response = self.exchange(&with_session(command, &key)).await?;
        if !is_session_rejected(response.code) {
            return Ok(response);
        }

        info!(code = response.code, "AniDB session expired, logging in again");
        *session = None;
        let key = self.login().await?;
        *session = Some(key.clone());
        let response = self.exchange(&with_session(command, &key)).await?;
        if is_session_rejected(response.code) {
            *session = None;
            return Err(AniqueueError::Auth {
                message: format!("session rejected after re-login: {}", response.message),
            });
        }
        Ok(response)
    }

    /// Ends the session if one is open. Failures are logged, not returned.
    pub async fn logout(&self) {
        let Some(key) = self.session.lock().await.take() else {
            return;
        };
        match self.exchange(&with_session("LOGOUT", &key)).await {
            Ok(response) => debug!(code = response.code, "AniDB session closed"),
            Err(e) => warn!(error = %e, "AniDB logout failed"),
        }
    }

    async fn login(&self) -> Result<String, AniqueueError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| AniqueueError::Auth {
            message: "AniDB username and password are not configured".to_string(),
        })?;

        let response = self.exchange(&credentials.auth_command()).await?;
        match response.code {
            codes::LOGIN_ACCEPTED | codes::LOGIN_ACCEPTED_NEW_VERSION => {
                if response.code == codes::LOGIN_ACCEPTED_NEW_VERSION {
                    warn!("AniDB reports a newer client version is available");
                }
                let key = response
                    .message
                    .split_whitespace()
                    .next()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| AniqueueError::Auth {
                        message: "login accepted without a session key".to_string(),
                    })?;
                info!(user = %credentials.username, "AniDB UDP session opened");
                Ok(key.to_string())
            }
            codes::LOGIN_FAILED | codes::CLIENT_VERSION_OUTDATED | codes::CLIENT_BANNED => {
                Err(AniqueueError::Auth {
                    message: format!("{} {}", response.code, response.message),
                })
            }
            code => Err(AniqueueError::Remote {
                code,
                message: response.message,
            }),
        }
    }

    /// One rate-limited, ban-checked round trip.
    async fn exchange(&self, payload: &str) -> Result<UdpResponse, AniqueueError> {
        if self.ban.is_banned() {
            return Err(self.ban.banned_error());
        }

        let raw = self
            .limiter
            .ensure_rate(|| async move {
                if self.ban.is_banned() {
                    return Err(self.ban.banned_error());
                }
                debug!(payload = %mask_secrets(payload), "AniDB UDP request");
                metrics::counter!("aniqueue_anidb_requests_total", "transport" => "UDP")
                    .increment(1);
                self.transport.exchange(payload.as_bytes()).await
            })
            .await?;

        if is_ban_datagram(&raw) {
            self.ban.set_banned();
            return Err(self.ban.banned_error());
        }

        let response = UdpResponse::parse(&raw)?;
        // Login replies carry the session key in the message.
        let shown = match response.code {
            codes::LOGIN_ACCEPTED | codes::LOGIN_ACCEPTED_NEW_VERSION => "***",
            _ => response.message.as_str(),
        };
        debug!(code = response.code, message = shown, "AniDB UDP reply");
        match response.code {
            codes::INTERNAL_SERVER_ERROR
            | codes::OUT_OF_SERVICE
            | codes::SERVER_BUSY
            | codes::TIMEOUT => Err(AniqueueError::Remote {
                code: response.code,
                message: response.message,
            }),
            _ => Ok(response),
        }
    }
}

fn is_session_rejected(code: u16) -> bool {
    matches!(code, codes::LOGIN_FIRST | codes::INVALID_SESSION)
}

impl BanControl for UdpConnectionHandler {
    fn kind(&self) -> BanKind {
        BanKind::Udp
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

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network transports behind the connection handlers.

use std::time::Duration;

use aniqueue_config::model::AniDbConfig;
use aniqueue_core::{AniqueueError, HttpTransport, UdpTransport};
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::debug;

/// Largest reply AniDB sends over UDP.
const MAX_DATAGRAM: usize = 2048;

/// HTTP API transport over reqwest.
///
/// Adds the client identity parameters AniDB requires on every request.
#[derive(Debug, Clone)]
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    base_url: String,
    client_name: String,
    client_version: u32,
}

impl ReqwestHttpTransport {
    pub fn new(config: &AniDbConfig) -> Result<Self, AniqueueError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(format!("{}/{}", config.client_name, config.client_version))
            .build()
            .map_err(|e| AniqueueError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.http_base_url.trim_end_matches('?').to_string(),
            client_name: config.client_name.clone(),
            client_version: config.client_version,
        })
    }

    /// Full request URL for `query`.
    pub fn url_for(&self, query: &str) -> String {
        format!(
            "{}?client={}&clientver={}&protover=1&{}",
            self.base_url, self.client_name, self.client_version, query
        )
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn get(&self, query: &str) -> Result<String, AniqueueError> {
        let response = self
            .client
            .get(self.url_for(query))
            .send()
            .await
            .map_err(|e| AniqueueError::Transport {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, "AniDB HTTP response received");
        if !status.is_success() {
            return Err(AniqueueError::Transport {
                message: format!("AniDB HTTP API returned {status}"),
                source: None,
            });
        }

        response.text().await.map_err(|e| AniqueueError::Transport {
            message: format!("failed to read HTTP body: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

/// UDP API transport over a tokio socket bound to a fixed local port.
///
/// The socket connects to the API host on first use. Each exchange holds a
/// lock across send and receive so replies cannot be paired with the wrong
/// request.
#[derive(Debug)]
pub struct TokioUdpTransport {
    socket: UdpSocket,
    host: String,
    port: u16,
    timeout: Duration,
    connected: Mutex<bool>,
}

impl TokioUdpTransport {
    pub async fn bind(config: &AniDbConfig) -> Result<Self, AniqueueError> {
        let socket = UdpSocket::bind(("0.0.0.0", config.udp_local_port))
            .await
            .map_err(|e| {
                AniqueueError::io(
                    format!("failed to bind UDP port {}", config.udp_local_port),
                    e,
                )
            })?;
        debug!(local = ?socket.local_addr().ok(), "AniDB UDP socket bound");

        Ok(Self {
            socket,
            host: config.udp_host.clone(),
            port: config.udp_port,
            timeout: config.request_timeout(),
            connected: Mutex::new(false),
        })
    }
}

#[async_trait]
impl UdpTransport for TokioUdpTransport {
    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, AniqueueError> {
        let mut connected = self.connected.lock().await;
        if !*connected {
            self.socket
                .connect((self.host.as_str(), self.port))
                .await
                .map_err(|e| {
                    AniqueueError::io(format!("failed to reach {}:{}", self.host, self.port), e)
                })?;
            *connected = true;
        }

        self.socket
            .send(payload)
            .await
            .map_err(|e| AniqueueError::io("UDP send failed", e))?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let len = tokio::time::timeout(self.timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| AniqueueError::Timeout {
                duration: self.timeout,
            })?
            .map_err(|e| AniqueueError::io("UDP receive failed", e))?;
        buf.truncate(len);
        Ok(buf)
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw AniDB transports.
//!
//! These perform the network call and nothing else. Rate limiting, ban
//! detection and session handling live in the connection handlers that wrap
//! them.

use async_trait::async_trait;

use crate::error::AniqueueError;

/// HTTP API transport: one GET per request, body returned as text.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    /// Performs the request described by `query` (e.g. `request=anime&aid=1`).
    async fn get(&self, query: &str) -> Result<String, AniqueueError>;
}

/// UDP API transport: one datagram out, one datagram back.
#[async_trait]
pub trait UdpTransport: Send + Sync + 'static {
    /// Sends `payload` and returns the raw reply bytes.
    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, AniqueueError>;
}

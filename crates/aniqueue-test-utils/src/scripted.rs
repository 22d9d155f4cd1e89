// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transports and fetchers that replay canned replies and record requests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use aniqueue_core::{AniqueueError, HttpTransport, ImageFetcher, UdpTransport};
use async_trait::async_trait;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn exhausted(what: &str) -> AniqueueError {
    AniqueueError::Transport {
        message: format!("scripted {what} transport has no reply queued"),
        source: None,
    }
}

/// HTTP transport answering from a FIFO of bodies.
#[derive(Default)]
pub struct ScriptedHttpTransport {
    replies: Mutex<VecDeque<Result<String, AniqueueError>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedHttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_body(&self, body: impl Into<String>) {
        lock(&self.replies).push_back(Ok(body.into()));
    }

    pub fn push_error(&self, error: AniqueueError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// Queries received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedHttpTransport {
    async fn get(&self, query: &str) -> Result<String, AniqueueError> {
        lock(&self.requests).push(query.to_string());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("HTTP")))
    }
}

/// UDP transport answering from a FIFO of datagrams.
#[derive(Default)]
pub struct ScriptedUdpTransport {
    replies: Mutex<VecDeque<Result<Vec<u8>, AniqueueError>>>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedUdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a text reply such as `"200 abcde LOGIN ACCEPTED"`.
    pub fn push_reply(&self, reply: &str) {
        self.push_raw(reply.as_bytes().to_vec());
    }

    pub fn push_raw(&self, datagram: Vec<u8>) {
        lock(&self.replies).push_back(Ok(datagram));
    }

    pub fn push_error(&self, error: AniqueueError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// Datagrams sent so far, decoded as UTF-8.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    pub fn pending_replies(&self) -> usize {
        lock(&self.replies).len()
    }
}

#[async_trait]
impl UdpTransport for ScriptedUdpTransport {
    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, AniqueueError> {
        lock(&self.sent).push(String::from_utf8_lossy(payload).into_owned());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("UDP")))
    }
}

/// Image fetcher serving fixed bytes.
pub struct StaticImageFetcher {
    default: Vec<u8>,
    by_url: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl StaticImageFetcher {
    pub fn new(default: impl Into<Vec<u8>>) -> Self {
        Self {
            default: default.into(),
            by_url: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        lock(&self.by_url).insert(url.into(), bytes.into());
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

impl Default for StaticImageFetcher {
    fn default() -> Self {
        Self::new(b"\xFF\xD8\xFFimage".to_vec())
    }
}

#[async_trait]
impl ImageFetcher for StaticImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AniqueueError> {
        lock(&self.requests).push(url.to_string());
        Ok(lock(&self.by_url)
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_in_order_then_errors() {
        let udp = ScriptedUdpTransport::new();
        udp.push_reply("200 s LOGIN ACCEPTED");
        udp.push_raw(vec![0, 0]);

        assert_eq!(udp.exchange(b"AUTH").await.unwrap(), b"200 s LOGIN ACCEPTED");
        assert_eq!(udp.exchange(b"PING").await.unwrap(), vec![0, 0]);
        assert!(udp.exchange(b"PING").await.is_err());
        assert_eq!(udp.sent(), vec!["AUTH", "PING", "PING"]);
    }
}

// SPDX-FileCopyrightText: 2026 Aniqueue Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Image downloads over reqwest.

use std::time::Duration;

use aniqueue_core::{AniqueueError, ImageFetcher};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ReqwestImageFetcher {
    client: reqwest::Client,
}

impl ReqwestImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AniqueueError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AniqueueError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for ReqwestImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AniqueueError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AniqueueError::Transport {
                message: format!("image request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AniqueueError::Transport {
                message: format!("image server returned {status} for {url}"),
                source: None,
            });
        }

        let bytes = response.bytes().await.map_err(|e| AniqueueError::Transport {
            message: format!("failed to read image body: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_bytes_and_rejects_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/images/main/1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/images/main/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ReqwestImageFetcher::new(Duration::from_secs(5)).unwrap();
        let bytes = fetcher
            .fetch(&format!("{}/images/main/1.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let err = fetcher
            .fetch(&format!("{}/images/main/missing.jpg", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"), "got: {err}");
    }
}

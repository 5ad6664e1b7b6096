//! Album artwork download
//!
//! Shared by the color and object-detection stages. Downloads carry a bounded
//! timeout and a fixed retry count with a fixed inter-retry delay; exhausting
//! retries degrades to "no artwork for this track" and never aborts a batch.

use std::time::Duration;

use image::DynamicImage;

use crate::config::Config;

/// Artwork downloader with bounded retries
#[derive(Clone)]
pub struct ArtworkFetcher {
    http_client: reqwest::Client,
    retry_count: u32,
    retry_delay: Duration,
}

impl ArtworkFetcher {
    pub fn new(config: &Config) -> Result<Self, crate::error::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.image_timeout_secs))
            .build()
            .map_err(|e| crate::error::Error::Internal(format!("HTTP client: {}", e)))?;

        Ok(ArtworkFetcher {
            http_client,
            retry_count: config.retry_count.max(1),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Download and decode one cover image
    ///
    /// Timeouts are retried; any other failure (bad status, undecodable
    /// bytes) gives up immediately. All failure paths return `None`.
    pub async fn fetch(&self, url: &str) -> Option<DynamicImage> {
        for attempt in 1..=self.retry_count {
            match self.try_fetch(url).await {
                Ok(image) => return Some(image),
                Err(FetchFailure::Timeout) if attempt < self.retry_count => {
                    tracing::debug!(url, attempt, "artwork download timed out, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(failure) => {
                    tracing::warn!(url, attempt, ?failure, "artwork download failed");
                    return None;
                }
            }
        }
        None
    }

    async fn try_fetch(&self, url: &str) -> Result<DynamicImage, FetchFailure> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Network(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchFailure::Status(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Network(e.to_string())
            }
        })?;

        image::load_from_memory(&bytes).map_err(|e| FetchFailure::Decode(e.to_string()))
    }
}

#[derive(Debug)]
enum FetchFailure {
    Timeout,
    Network(String),
    Status(u16),
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url_yields_none() {
        let fetcher = ArtworkFetcher {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_millis(200))
                .build()
                .unwrap(),
            retry_count: 1,
            retry_delay: Duration::from_millis(1),
        };

        // Reserved TEST-NET address, nothing listens there.
        let result = fetcher.fetch("http://192.0.2.1/cover.jpg").await;
        assert!(result.is_none());
    }
}

//! HTTP retrieval of remote XML catalogs
//!
//! Blocking download with an inactivity timeout, a bounded retry budget and
//! fractional progress reporting. One request is in flight per [`Fetcher`] at
//! a time; the caller blocks until completion, failure or retry exhaustion.
//! Nothing here touches the disk.

use std::io::Read;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::progress::{CancellationToken, ProgressTracker};

/// Inactivity timeout; reset every time a body chunk arrives.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Total attempts before a resource is reported unreachable.
const MAX_ATTEMPTS: u32 = 3;

/// Download buffer size.
const CHUNK_SIZE: usize = 64 * 1024;

/// Some mirrors refuse requests without a browser-like user-agent.
const USER_AGENT: &str = "Mozilla Firefox";

/// Blocking HTTP fetcher for the two source catalogs.
pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(INACTIVITY_TIMEOUT)
            .timeout(INACTIVITY_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Download `url`, retrying up to the attempt budget.
    ///
    /// Progress is reported as `received / total` per chunk and as `1.0` at
    /// the end of every attempt, successful or not. Cancellation is polled
    /// after each chunk.
    pub fn fetch(
        &self,
        url: &str,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        for attempt in 1..=MAX_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            let result = self.fetch_once(url, progress, cancel);
            progress.set(1.0);
            match result {
                Ok(data) => {
                    debug!("Downloaded {} bytes from {url}", data.len());
                    return Ok(data);
                }
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(e) => {
                    warn!("Download attempt {attempt}/{MAX_ATTEMPTS} failed for {url}: {e}");
                }
            }
        }
        Err(ProviderError::Unreachable {
            url: url.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }

    fn fetch_once(
        &self,
        url: &str,
        progress: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(classify)?;

        let total = response.content_length();
        let mut response = response;
        let mut data = Vec::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let read = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(ProviderError::Timeout(url.to_string()));
                }
                Err(e) => return Err(ProviderError::Network(e.to_string())),
            };
            data.extend_from_slice(&buf[..read]);
            if let Some(total) = total.filter(|&t| t > 0) {
                progress.set(data.len() as f32 / total as f32);
            }
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
        }
        Ok(data)
    }
}

fn classify(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

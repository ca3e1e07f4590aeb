// Transport abstraction between the cache and the network.
// The cache never talks to reqwest directly so tests can script failures,
// delays, and payloads.

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Progress callback, invoked with 0–100
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("http status {0}")]
    Status(u16),
}

/// A way to pull remote bytes. `fetch` is the primary streaming path with
/// byte-level progress; `fetch_basic` is the degraded fallback with no
/// progress of its own.
pub trait MediaTransport: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'static, Result<Vec<u8>, TransportError>>;

    fn fetch_basic(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, TransportError>>;
}

/// reqwest-backed transport used in production
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTransport for HttpTransport {
    fn fetch(
        &self,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'static, Result<Vec<u8>, TransportError>> {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TransportError::Status(response.status().as_u16()));
            }

            let total = response.content_length();
            let mut stream = response.bytes_stream();
            let mut buf: Vec<u8> = match total {
                Some(len) => Vec::with_capacity(len as usize),
                None => Vec::new(),
            };

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| TransportError::Request(e.to_string()))?;
                buf.extend_from_slice(&chunk);
                if let (Some(cb), Some(total)) = (&progress, total) {
                    if total > 0 {
                        // Completion itself reports 100; stay below it here
                        let pct = ((buf.len() as u64 * 100) / total).min(99) as u8;
                        cb(pct);
                    }
                }
            }

            debug!(url = %url, bytes = buf.len(), "primary transport complete");
            Ok(buf)
        })
    }

    fn fetch_basic(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, TransportError>> {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TransportError::Status(response.status().as_u16()));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            debug!(url = %url, bytes = bytes.len(), "fallback transport complete");
            Ok(bytes.to_vec())
        })
    }
}

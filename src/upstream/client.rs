//! Upstream HTTP client used for health probes

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::utils::{is_http, parse_url};

/// Status and (optionally) body of a probe response
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Issues probe requests to upstreams
///
/// Implementations return [`Error::Protocol`] when the request cannot be
/// built and [`Error::Transport`] when no response was received.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn fetch(&self, url: &str, accept: &str, read_body: bool) -> Result<ProbeResponse>;
}

/// reqwest-backed probe client
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ProbeClient {
    /// Create a client whose every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("doh-selector/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!("Probe client created with {}ms timeout", timeout.as_millis());

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying client, for dispatchers that want the same timeout
    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl ProbeTransport for ProbeClient {
    async fn fetch(&self, url: &str, accept: &str, read_body: bool) -> Result<ProbeResponse> {
        let parsed = parse_url(url)?;
        if !is_http(&parsed) {
            return Err(Error::Protocol(format!(
                "unsupported scheme '{}' in {}",
                parsed.scheme(),
                url
            )));
        }

        let response = self
            .client
            .get(parsed)
            .header(ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        debug!("Probe response from {}: {}", url, status);

        // An unreadable body is treated like an empty one; classifiers reject it.
        let body = if read_body {
            response.bytes().await.unwrap_or_default()
        } else {
            Bytes::new()
        };

        Ok(ProbeResponse { status, body })
    }
}

// Best-effort HEAD probes for asset byte sizes

use crate::error::Result;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// What a single probe learned. Both fields stay `None` when the probe
/// failed, timed out or the server withheld the headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

pub struct AssetProber {
    client: Client,
    timeout: Duration,
}

impl AssetProber {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(16)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, timeout })
    }

    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let request = self.client.head(url).send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!("Size probe for {} failed: {}", url, e);
                return ProbeOutcome::default();
            }
            Err(_) => {
                debug!("Size probe for {} timed out", url);
                return ProbeOutcome::default();
            }
        };

        if !response.status().is_success() {
            return ProbeOutcome::default();
        }

        let headers = response.headers();
        ProbeOutcome {
            size: headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok()),
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string()),
        }
    }

    /// Probe every URL with at most `concurrency` requests in flight.
    /// Results come back in input order.
    pub async fn probe_all(&self, urls: &[String], concurrency: usize) -> Vec<ProbeOutcome> {
        stream::iter(urls.iter())
            .map(|url| self.probe(url))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

//! Forwarding of normalized messages to the downstream sink.
//!
//! Both ingestion paths share one [`Forwarder`]. It owns an immutable sink URL
//! and a pooled HTTP client, so clones are cheap and need no locking.

use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

/// Failure to deliver one payload to the sink.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to reach sink: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sink rejected payload with status {status}")]
    SinkRejected { status: StatusCode },
}

/// POSTs JSON payloads to a single configured sink URL.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    sink_url: Url,
}

impl Forwarder {
    /// Build a forwarder with its own HTTP client.
    pub fn new(sink_url: Url, timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .build()?;

        Ok(Self::with_client(client, sink_url))
    }

    pub fn with_client(client: Client, sink_url: Url) -> Self {
        Self { client, sink_url }
    }

    pub fn sink_url(&self) -> &Url {
        &self.sink_url
    }

    /// Serialize `payload` and POST it to the sink.
    ///
    /// Any non-2xx response is a failure. No retry happens here; callers own
    /// the redelivery policy.
    pub async fn forward<T>(&self, payload: &T) -> Result<(), ForwardError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        let body_length = body.len();

        let response = self
            .client
            .post(self.sink_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(sink = %self.sink_url, error = %e, "sink_forward_timeout");
                } else {
                    error!(sink = %self.sink_url, error = %e, "sink_forward_transport_error");
                }
                ForwardError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                sink = %self.sink_url,
                status_code = status.as_u16(),
                "sink_forward_rejected"
            );
            return Err(ForwardError::SinkRejected { status });
        }

        info!(
            sink = %self.sink_url,
            status_code = status.as_u16(),
            body_length = body_length,
            "sink_forward_complete"
        );

        Ok(())
    }
}

use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::line_protocol::write_record;
use crate::metric::MetricRecord;

/// Destination for metric records; failures never reach the caller.
pub(crate) trait MetricSink {
    fn send(&self, record: &MetricRecord) -> impl Future<Output = ()>;
}

/// Settings for the line-protocol HTTP write endpoint.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Full write URL including any query parameters (e.g. `org` and `bucket`).
    pub write_url: String,
    /// Sent as `Authorization: Token <token>`.
    pub token: String,
    /// Bounds a single write request.
    pub timeout: Duration,
    /// Appended to every record unless the record carries the same key.
    pub default_tags: Vec<(String, String)>,
}

/// Failure while writing a record.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Request; err={0}")]
    Request(#[from] reqwest::Error),
    #[error("Status; status={status}; body={body}")]
    Status { status: StatusCode, body: String },
}

/// [`MetricSink`] posting one line-protocol record per request.
pub(crate) struct LineSink {
    http_client: Client,
    config: SinkConfig,
}

impl LineSink {
    pub(crate) fn new(config: SinkConfig) -> Result<Self, SinkError> {
        let http_client = Client::builder().timeout(config.timeout).build()?;

        Ok(LineSink { http_client, config })
    }

    pub(crate) async fn write(&self, body: String) -> Result<(), SinkError> {
        let resp = self
            .http_client
            .post(&self.config.write_url)
            .header(AUTHORIZATION, format!("Token {}", self.config.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() >= 300 {
            let body = resp.text().await.unwrap_or_default();

            return Err(SinkError::Status { status, body });
        }

        Ok(())
    }
}

impl MetricSink for LineSink {
    async fn send(&self, record: &MetricRecord) {
        let mut body = String::new();
        if !write_record(&mut body, record, &self.config.default_tags) {
            debug!(measurement = %record.measurement, "Skipping record without finite fields");

            return;
        }

        match self.write(body).await {
            Ok(()) => {}
            Err(SinkError::Status { status, body }) => {
                warn!(%status, %body, "InfluxDB write failed");
            }
            Err(err) => {
                warn!(%err, "InfluxDB write request failed");
            }
        }
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::CONTENT_TYPE, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::time::sleep;

use crate::{ConfigError, GrafanaConfig, LogEntry, LokiPush, MetricSample};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http error: {status}")]
    Http { status: StatusCode, body: String },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SinkError::Request(err) if err.is_timeout())
    }
}

/// Destination for formatted telemetry. Metrics and logs are delivered by
/// separate calls so that one failing does not affect the other.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn push_metrics(&self, samples: &[MetricSample]) -> Result<(), SinkError>;
    async fn push_logs(&self, entries: &[LogEntry]) -> Result<(), SinkError>;
}

#[derive(Clone, Debug)]
struct Target {
    url: String,
    username: String,
}

#[derive(Clone)]
pub struct GrafanaClient {
    client: Client,
    metrics: Target,
    logs: Target,
    access_token: SecretString,
    max_attempts: usize,
}

impl GrafanaClient {
    pub fn new(config: &GrafanaConfig) -> Result<Self, ConfigError> {
        let endpoints = config.resolve()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self {
            client,
            metrics: Target {
                url: endpoints.metrics_url,
                username: config.metrics_username.clone(),
            },
            logs: Target {
                url: endpoints.logs_url,
                username: config.logs_username.clone(),
            },
            access_token: config.access_token.clone(),
            max_attempts: config.max_attempts,
        })
    }

    pub fn metrics_url(&self) -> &str {
        &self.metrics.url
    }

    pub fn logs_url(&self) -> &str {
        &self.logs.url
    }

    async fn send_with_retry(
        &self,
        target: &Target,
        content_type: &'static str,
        body: String,
    ) -> Result<(), SinkError> {
        let mut attempt = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            attempt += 1;
            let request = self
                .client
                .post(&target.url)
                .basic_auth(&target.username, Some(self.access_token.expose_secret()))
                .header(CONTENT_TYPE, content_type)
                .body(body.clone());

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        return Ok(());
                    }
                    if should_retry(response.status()) && attempt < self.max_attempts {
                        sleep(next_delay(response.status(), response.headers(), backoff)).await;
                        backoff = backoff.saturating_mul(2);
                        continue;
                    }
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(SinkError::Http { status, body });
                }
                Err(err) => {
                    // Timeouts are not retried.
                    if err.is_connect() && !err.is_timeout() && attempt < self.max_attempts {
                        sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                        continue;
                    }
                    return Err(SinkError::Request(err));
                }
            }
        }
    }
}

#[async_trait]
impl TelemetrySink for GrafanaClient {
    async fn push_metrics(&self, samples: &[MetricSample]) -> Result<(), SinkError> {
        if samples.is_empty() {
            return Ok(());
        }
        let body = samples
            .iter()
            .map(MetricSample::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        self.send_with_retry(&self.metrics, "text/plain", body).await?;
        tracing::debug!(samples = samples.len(), "pushed metrics");
        Ok(())
    }

    async fn push_logs(&self, entries: &[LogEntry]) -> Result<(), SinkError> {
        if entries.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_string(&LokiPush::from_entries(entries))?;
        self.send_with_retry(&self.logs, "application/json", body).await?;
        tracing::debug!(entries = entries.len(), "pushed logs");
        Ok(())
    }
}

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(5);

fn should_retry(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn next_delay(status: StatusCode, headers: &HeaderMap, backoff: Duration) -> Duration {
    if status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(value) = headers.get("Retry-After").and_then(|v| v.to_str().ok()) {
            if let Ok(seconds) = value.parse::<u64>() {
                return Duration::from_secs(seconds).min(MAX_RETRY_AFTER);
            }
        }
    }
    backoff
}

//! Grafana Cloud telemetry for instrumented LLM calls.
//!
//! Each call is priced, turned into one Influx line protocol sample for the
//! metrics endpoint and one Loki log line, and pushed with basic auth. Metrics
//! and logs are delivered independently; delivery failures are logged and
//! never surface to the caller.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tokentap_core::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, PriceTable};
//! use tokentap_grafana::{
//!     ExporterConfig, GrafanaClient, GrafanaConfig, Monitor, TelemetryExporter,
//! };
//!
//! async fn create(request: ChatCompletionRequest) -> Result<ChatCompletionResponse, String> {
//!     let _ = request;
//!     Err("not connected".to_string())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GrafanaConfig::from_env()?.with_disable_content(true);
//!     let client = Arc::new(GrafanaClient::new(&config)?);
//!     let exporter = TelemetryExporter::new(client, ExporterConfig::default());
//!
//!     let create = Monitor::new(config)
//!         .with_pricing(PriceTable::openai())
//!         .with_exporter(exporter.clone())
//!         .instrument(create)?;
//!
//!     let request = ChatCompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("hi")]);
//!     let _ = create.call(request).await;
//!     let _ = exporter.flush(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```
mod client;
mod config;
mod exporter;
mod handler;
mod logs;
mod metrics;
mod monitor;
mod sanitize;

pub use client::{GrafanaClient, SinkError, TelemetrySink};
pub use config::{
    resolve_logs_url, resolve_metrics_url, ConfigError, GrafanaConfig, ResolvedEndpoints,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SOURCE,
};
pub use exporter::{ExporterConfig, FlushError, FlushStats, TelemetryEvent, TelemetryExporter};
pub use handler::{Delivery, GrafanaHandler};
pub use logs::{format_log, LogEntry, LogOptions, LokiPush, LokiStream};
pub use metrics::{format_metrics, LabelSet, MetricSample, JOB, MEASUREMENT};
pub use monitor::{monitor, monitor_blocking, Monitor};
pub use sanitize::{sanitize_value, truncate_str, DEFAULT_MAX_BYTES, REDACTED};

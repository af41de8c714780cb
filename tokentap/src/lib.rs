//! Cost and usage telemetry for OpenAI-style LLM calls.
//!
//! `tokentap` re-exports the pieces most applications need:
//!
//! - from `tokentap-core`: request and response shapes, [`CallRecord`], the
//!   [`PriceTable`] and the [`Instrumented`] / [`BlockingInstrumented`]
//!   wrappers.
//! - from `tokentap-grafana` (feature `grafana`, on by default): Grafana Cloud metrics and
//!   logs delivery and the [`monitor`] entry points.
//!
//! ```rust,no_run
//! # #[cfg(feature = "grafana")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use tokentap::{
//!     monitor, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, GrafanaConfig,
//! };
//!
//! async fn create(request: ChatCompletionRequest) -> Result<ChatCompletionResponse, String> {
//!     let _ = request;
//!     Err("offline".to_string())
//! }
//!
//! let create = monitor(create, GrafanaConfig::from_env()?)?;
//! let _ = create
//!     .call(ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")]))
//!     .await;
//! # Ok(())
//! # }
//! ```

pub use tokentap_core::{
    BlockingInstrumented, CallRecord, CallStatus, ChatCompletionRequest, ChatCompletionResponse,
    ChatMessage, CompletionRequest, CompletionResponse, CostEstimate, EndpointKind,
    InvocationMode, Instrumented, ModelPrice, PriceMatch, PriceTable, PricingError, Role,
    TelemetryHandler, TelemetryManager, TokenSource, Usage,
};

#[cfg(feature = "grafana")]
pub use tokentap_grafana as grafana;
#[cfg(feature = "grafana")]
pub use tokentap_grafana::{
    monitor, monitor_blocking, ConfigError, Delivery, ExporterConfig, FlushError, FlushStats,
    GrafanaClient, GrafanaConfig, GrafanaHandler, Monitor, SinkError, TelemetryExporter,
    TelemetrySink,
};

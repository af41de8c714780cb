use std::sync::Arc;

use tokentap_core::{BlockingInstrumented, Instrumented, PriceTable, TelemetryManager};

use crate::{
    ConfigError, Delivery, GrafanaClient, GrafanaConfig, GrafanaHandler, TelemetryExporter,
    TelemetrySink,
};

/// Wraps an async LLM callable so that every call is reported to Grafana.
///
/// Fails only when `config` is invalid. Once wrapped, the callable's results
/// and errors are returned unchanged.
///
/// ```rust,no_run
/// use secrecy::SecretString;
/// use tokentap_core::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
/// use tokentap_grafana::{monitor, GrafanaConfig};
///
/// async fn create(request: ChatCompletionRequest) -> Result<ChatCompletionResponse, String> {
///     let _ = request;
///     Err("not connected".to_string())
/// }
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GrafanaConfig::new(
///     "https://prometheus-prod-10-prod-us-central-0.grafana.net/api/prom",
///     "https://logs-prod-017.grafana.net",
///     "123456",
///     "654321",
///     SecretString::new("glc_token".to_string()),
/// );
/// let create = monitor(create, config)?;
/// let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hello")]);
/// let _ = create.call(request).await;
/// # Ok(())
/// # }
/// ```
pub fn monitor<F>(f: F, config: GrafanaConfig) -> Result<Instrumented<F>, ConfigError> {
    Monitor::new(config).instrument(f)
}

/// Blocking counterpart of [`monitor`].
pub fn monitor_blocking<F>(
    f: F,
    config: GrafanaConfig,
) -> Result<BlockingInstrumented<F>, ConfigError> {
    Monitor::new(config).instrument_blocking(f)
}

/// Builder for wrappers that need more than the defaults.
#[derive(Clone)]
pub struct Monitor {
    config: GrafanaConfig,
    pricing: Arc<PriceTable>,
    sink: Option<Arc<dyn TelemetrySink>>,
    exporter: Option<TelemetryExporter>,
}

impl Monitor {
    pub fn new(config: GrafanaConfig) -> Self {
        Self {
            config,
            pricing: Arc::new(PriceTable::openai()),
            sink: None,
            exporter: None,
        }
    }

    pub fn with_pricing(mut self, pricing: impl Into<Arc<PriceTable>>) -> Self {
        self.pricing = pricing.into();
        self
    }

    /// Delivers through `sink` instead of a [`GrafanaClient`] built from the
    /// config.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Queues telemetry on `exporter` instead of pushing per call. Takes
    /// precedence over [`Monitor::with_sink`].
    pub fn with_exporter(mut self, exporter: TelemetryExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn handler(&self) -> Result<GrafanaHandler, ConfigError> {
        self.config.resolve()?;
        let delivery = match (&self.exporter, &self.sink) {
            (Some(exporter), _) => Delivery::Batched(exporter.clone()),
            (None, Some(sink)) => Delivery::Direct(Arc::clone(sink)),
            (None, None) => Delivery::Direct(Arc::new(GrafanaClient::new(&self.config)?)),
        };
        Ok(GrafanaHandler::new(
            Arc::clone(&self.pricing),
            &self.config,
            delivery,
        ))
    }

    pub fn manager(&self) -> Result<TelemetryManager, ConfigError> {
        let handler = self.handler()?;
        Ok(TelemetryManager::noop().with_handler(Arc::new(handler)))
    }

    pub fn instrument<F>(&self, f: F) -> Result<Instrumented<F>, ConfigError> {
        Ok(Instrumented::new(f, self.manager()?))
    }

    pub fn instrument_blocking<F>(&self, f: F) -> Result<BlockingInstrumented<F>, ConfigError> {
        Ok(BlockingInstrumented::new(f, self.manager()?))
    }
}

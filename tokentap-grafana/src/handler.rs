use std::slice;
use std::sync::Arc;

use async_trait::async_trait;
use tokentap_core::{CallRecord, PriceTable, TelemetryHandler};

use crate::{
    format_log, format_metrics, GrafanaConfig, LabelSet, LogOptions, TelemetryEvent,
    TelemetryExporter, TelemetrySink,
};

/// How a [`GrafanaHandler`] hands formatted telemetry to its sink.
#[derive(Clone)]
pub enum Delivery {
    /// Push both payloads before the wrapped call returns.
    Direct(Arc<dyn TelemetrySink>),
    /// Queue the payloads for the exporter's background flush loop.
    Batched(TelemetryExporter),
}

/// Prices each call, formats it for Grafana and delivers it.
///
/// Sink failures are logged and never reach the caller. A metrics failure
/// does not stop the log push and vice versa.
#[derive(Clone)]
pub struct GrafanaHandler {
    pricing: Arc<PriceTable>,
    labels: LabelSet,
    log_options: LogOptions,
    delivery: Delivery,
}

impl GrafanaHandler {
    pub fn new(pricing: Arc<PriceTable>, config: &GrafanaConfig, delivery: Delivery) -> Self {
        Self {
            pricing,
            labels: LabelSet::from_config(config),
            log_options: LogOptions::from_config(config),
            delivery,
        }
    }

    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// Formats the metric sample and log entry for one call.
    pub fn payloads(&self, record: &CallRecord) -> TelemetryEvent {
        let cost = self
            .pricing
            .estimate(&record.model, record.input_tokens, record.output_tokens);
        if !cost.pricing.is_priced() {
            tracing::debug!(model = %record.model, "no price for model; reporting zero cost");
        }
        TelemetryEvent {
            sample: format_metrics(record, &cost, &self.labels),
            entry: format_log(record, &cost, &self.log_options),
        }
    }
}

#[async_trait]
impl TelemetryHandler for GrafanaHandler {
    async fn on_call(&self, record: &CallRecord) {
        let event = self.payloads(record);
        match &self.delivery {
            Delivery::Direct(sink) => {
                let (metrics, logs) = tokio::join!(
                    sink.push_metrics(slice::from_ref(&event.sample)),
                    sink.push_logs(slice::from_ref(&event.entry))
                );
                if let Err(err) = metrics {
                    tracing::warn!(
                        call_id = %record.call_id,
                        error = %err,
                        "error sending metrics to Grafana"
                    );
                }
                if let Err(err) = logs {
                    tracing::warn!(
                        call_id = %record.call_id,
                        error = %err,
                        "error sending logs to Grafana"
                    );
                }
            }
            Delivery::Batched(exporter) => exporter.enqueue(event).await,
        }
    }
}

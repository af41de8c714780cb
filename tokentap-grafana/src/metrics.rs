//! Influx line protocol samples for Grafana Cloud's metrics push endpoint.
//!
//! Grafana converts each field into a Prometheus series named
//! `<measurement>_<field>`, so a sample for one call becomes
//! `openai_promptTokens`, `openai_usageCost` and so on. Tags become labels and
//! are kept to a fixed, low-cardinality set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokentap_core::{CallRecord, CostEstimate};

use crate::GrafanaConfig;

pub const MEASUREMENT: &str = "openai";
pub const JOB: &str = "integrations/openai";

/// Labels shared by every metric sample and log entry of a monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    pub source: String,
    pub environment: Option<String>,
}

impl LabelSet {
    pub fn from_config(config: &GrafanaConfig) -> Self {
        Self {
            source: config.source.clone(),
            environment: config.environment.clone(),
        }
    }

    /// Labels for one call: the static set plus model, endpoint and status.
    pub fn for_record(&self, record: &CallRecord) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::from([
            ("job".to_string(), JOB.to_string()),
            ("source".to_string(), self.source.clone()),
            ("model".to_string(), record.model.clone()),
            (
                "endpoint".to_string(),
                record.endpoint_kind.as_str().to_string(),
            ),
            ("status".to_string(), record.status.as_str().to_string()),
        ]);
        if let Some(environment) = &self.environment {
            labels.insert("environment".to_string(), environment.clone());
        }
        labels
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetricSample {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: Vec<(String, f64)>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
    }

    /// Renders the sample as one line of Influx line protocol with a
    /// nanosecond timestamp.
    pub fn to_line(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape(key, TAG_SPECIALS));
            line.push('=');
            line.push_str(&escape(value, TAG_SPECIALS));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, value)| value.is_finite())
            .map(|(key, value)| format!("{}={}", escape(key, TAG_SPECIALS), value))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&nanos.to_string());
        }
        line
    }
}

const TAG_SPECIALS: &[char] = &[',', '=', ' '];

fn escape(text: &str, specials: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' | '\r' => escaped.push(' '),
            ch if specials.contains(&ch) => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ch => escaped.push(ch),
        }
    }
    escaped
}

pub fn format_metrics(record: &CallRecord, cost: &CostEstimate, labels: &LabelSet) -> MetricSample {
    MetricSample {
        measurement: MEASUREMENT.to_string(),
        tags: labels.for_record(record),
        fields: vec![
            ("requests".to_string(), 1.0),
            ("promptTokens".to_string(), record.input_tokens as f64),
            ("completionTokens".to_string(), record.output_tokens as f64),
            ("totalTokens".to_string(), record.total_tokens() as f64),
            ("requestDuration".to_string(), record.latency_ms / 1000.0),
            ("usageCost".to_string(), cost.total_cost),
        ],
        timestamp: record.timestamp,
    }
}

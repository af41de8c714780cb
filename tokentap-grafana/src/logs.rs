use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokentap_core::{CallRecord, CallStatus, CostEstimate, RequestPayload};

use crate::sanitize::{sanitize_value, DEFAULT_MAX_BYTES};
use crate::{GrafanaConfig, LabelSet};

#[derive(Clone, Debug)]
pub struct LogOptions {
    pub labels: LabelSet,
    pub disable_content: bool,
    pub redact_regex: Option<Regex>,
    /// Per-string byte limit applied to the log line's values.
    pub max_bytes: usize,
}

impl LogOptions {
    pub fn from_config(config: &GrafanaConfig) -> Self {
        Self {
            labels: LabelSet::from_config(config),
            disable_content: config.disable_content,
            redact_regex: config.redact_regex.clone(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub labels: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

impl LogEntry {
    fn timestamp_nanos(&self) -> String {
        self.timestamp
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string()
    }
}

/// Body of a Loki push request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LokiPush {
    pub streams: Vec<LokiStream>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LokiStream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<[String; 2]>,
}

impl LokiPush {
    /// Groups entries with identical labels into one stream each.
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let mut streams: Vec<LokiStream> = Vec::new();
        for entry in entries {
            let value = [entry.timestamp_nanos(), entry.line.clone()];
            match streams
                .iter_mut()
                .find(|stream| stream.stream == entry.labels)
            {
                Some(stream) => stream.values.push(value),
                None => streams.push(LokiStream {
                    stream: entry.labels.clone(),
                    values: vec![value],
                }),
            }
        }
        Self { streams }
    }
}

pub fn format_log(record: &CallRecord, cost: &CostEstimate, options: &LogOptions) -> LogEntry {
    let level = match record.status {
        CallStatus::Success => "info",
        CallStatus::Error => "error",
    };
    let mut labels = options.labels.for_record(record);
    labels.insert("level".to_string(), level.to_string());

    let mut line = Map::new();
    line.insert("level".to_string(), json!(level));
    line.insert("call_id".to_string(), json!(record.call_id.to_string()));
    line.insert("model".to_string(), json!(record.model));
    line.insert("endpoint".to_string(), json!(record.endpoint_kind.as_str()));
    line.insert("status".to_string(), json!(record.status.as_str()));
    line.insert("latency_ms".to_string(), json!(record.latency_ms));
    line.insert("prompt_tokens".to_string(), json!(record.input_tokens));
    line.insert("completion_tokens".to_string(), json!(record.output_tokens));
    line.insert("total_tokens".to_string(), json!(record.total_tokens()));
    line.insert("token_source".to_string(), json!(record.token_source.as_str()));
    line.insert(
        "cost".to_string(),
        json!({
            "input": cost.input_cost,
            "output": cost.output_cost,
            "total": cost.total_cost,
            "pricing": cost.pricing.as_str(),
        }),
    );
    if let Some(error) = &record.error_message {
        line.insert("error".to_string(), json!(error));
    }
    if let Some(response) = &record.response {
        if let Some(model) = &response.model {
            line.insert("response_model".to_string(), json!(model));
        }
        if let Some(role) = &response.role {
            line.insert("role".to_string(), json!(role));
        }
        if let Some(reason) = &response.finish_reason {
            line.insert("finish_reason".to_string(), json!(reason));
        }
    }

    if !options.disable_content {
        match &record.request {
            RequestPayload::Messages(messages) => {
                line.insert("messages".to_string(), json!(messages));
            }
            RequestPayload::Prompt(prompt) => {
                line.insert("prompt".to_string(), json!(prompt));
            }
            RequestPayload::Unknown => {}
        }
        if let Some(response) = &record.response {
            line.insert("completion".to_string(), json!(response.text));
        }
    }

    let line = sanitize_value(
        Value::Object(line),
        options.redact_regex.as_ref(),
        options.max_bytes,
    );
    LogEntry {
        labels,
        timestamp: record.timestamp,
        line: line.to_string(),
    }
}

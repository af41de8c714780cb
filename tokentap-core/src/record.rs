use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::llm::{CallShape, ChatMessage};

/// Model name recorded when neither the request nor the response carries one.
pub const UNKNOWN_MODEL: &str = "unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    ChatCompletion,
    Completion,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::ChatCompletion => "chat",
            EndpointKind::Completion => "completion",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Where the token counts of a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// Usage metadata returned by the provider.
    Reported,
    /// Length-based estimate; the provider returned no usage.
    Estimated,
    /// The call failed before producing a response.
    Unavailable,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Reported => "reported",
            TokenSource::Estimated => "estimated",
            TokenSource::Unavailable => "unavailable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPayload {
    Messages(Vec<ChatMessage>),
    Prompt(String),
    Unknown,
}

impl RequestPayload {
    /// Concatenated request text, used for token estimation.
    pub fn text(&self) -> String {
        match self {
            RequestPayload::Messages(messages) => messages
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            RequestPayload::Prompt(prompt) => prompt.clone(),
            RequestPayload::Unknown => String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResponsePayload {
    pub model: Option<String>,
    pub role: Option<String>,
    pub text: String,
    pub finish_reason: Option<String>,
}

/// Request arguments captured before they are moved into the wrapped call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSnapshot {
    pub model: Option<String>,
    pub endpoint_kind: EndpointKind,
    pub payload: RequestPayload,
}

impl RequestSnapshot {
    pub fn capture<R: CallShape + ?Sized>(request: &R) -> Self {
        Self::capture_as(request, EndpointKind::ChatCompletion)
    }

    /// Like [`RequestSnapshot::capture`], using `fallback` as the endpoint
    /// kind when the request exposes neither messages nor a prompt.
    pub fn capture_as<R: CallShape + ?Sized>(request: &R, fallback: EndpointKind) -> Self {
        let model = request.model().map(str::to_string);
        let (endpoint_kind, payload) = match (request.messages(), request.prompt()) {
            (Some(messages), _) => (EndpointKind::ChatCompletion, RequestPayload::Messages(messages)),
            (None, Some(prompt)) => (EndpointKind::Completion, RequestPayload::Prompt(prompt)),
            (None, None) => (fallback, RequestPayload::Unknown),
        };
        Self {
            model,
            endpoint_kind,
            payload,
        }
    }
}

/// Normalized description of one intercepted call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallRecord {
    pub call_id: Uuid,
    pub model: String,
    pub endpoint_kind: EndpointKind,
    pub request: RequestPayload,
    pub response: Option<ResponsePayload>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub token_source: TokenSource,
    pub latency_ms: f64,
    pub status: CallStatus,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CallRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }
}

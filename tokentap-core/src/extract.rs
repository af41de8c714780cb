use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::llm::ProviderResponse;
use crate::record::{
    CallRecord, CallStatus, RequestPayload, RequestSnapshot, ResponsePayload, TokenSource,
    UNKNOWN_MODEL,
};

/// Characters per token assumed by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Length-based token estimate used when the provider reports no usage.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Builds the record for one call from its captured request and outcome.
///
/// Never fails: shapes that cannot be read degrade to empty text, an
/// `"unknown"` model or estimated token counts.
pub fn extract<R, E>(
    snapshot: &RequestSnapshot,
    outcome: Result<&R, &E>,
    elapsed: Duration,
    timestamp: DateTime<Utc>,
) -> CallRecord
where
    R: ProviderResponse + ?Sized,
    E: fmt::Display + ?Sized,
{
    let latency_ms = elapsed.as_secs_f64() * 1000.0;
    if snapshot.payload == RequestPayload::Unknown {
        tracing::debug!(
            endpoint = snapshot.endpoint_kind.as_str(),
            "request exposes neither messages nor prompt"
        );
    }

    match outcome {
        Ok(response) => {
            let text = response.output_text().unwrap_or_else(|| {
                tracing::debug!("response carries no output text");
                String::new()
            });
            let payload = ResponsePayload {
                model: response.model().map(str::to_string),
                role: response.role(),
                text,
                finish_reason: response.finish_reason(),
            };
            let (input_tokens, output_tokens, token_source) = match response.usage() {
                Some(usage) => (
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    TokenSource::Reported,
                ),
                None => {
                    tracing::debug!("response carries no usage; estimating token counts");
                    (
                        estimate_tokens(&snapshot.payload.text()),
                        estimate_tokens(&payload.text),
                        TokenSource::Estimated,
                    )
                }
            };
            CallRecord {
                call_id: Uuid::new_v4(),
                model: resolve_model(snapshot.model.as_deref(), payload.model.as_deref()),
                endpoint_kind: snapshot.endpoint_kind,
                request: snapshot.payload.clone(),
                response: Some(payload),
                input_tokens,
                output_tokens,
                token_source,
                latency_ms,
                status: CallStatus::Success,
                error_message: None,
                timestamp,
            }
        }
        Err(error) => CallRecord {
            call_id: Uuid::new_v4(),
            model: resolve_model(snapshot.model.as_deref(), None),
            endpoint_kind: snapshot.endpoint_kind,
            request: snapshot.payload.clone(),
            response: None,
            input_tokens: 0,
            output_tokens: 0,
            token_source: TokenSource::Unavailable,
            latency_ms,
            status: CallStatus::Error,
            error_message: Some(error.to_string()),
            timestamp,
        },
    }
}

// The requested model wins over the one echoed back by the provider.
fn resolve_model(requested: Option<&str>, responded: Option<&str>) -> String {
    requested
        .filter(|model| !model.is_empty())
        .or(responded.filter(|model| !model.is_empty()))
        .unwrap_or(UNKNOWN_MODEL)
        .to_string()
}

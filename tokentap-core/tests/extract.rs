use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokentap_core::{
    estimate_tokens, extract, CallStatus, ChatCompletionRequest, ChatCompletionResponse,
    ChatMessage, CompletionRequest, CompletionResponse, EndpointKind, RequestPayload,
    RequestSnapshot, TokenSource, Value, UNKNOWN_MODEL,
};

fn chat_response(usage: Option<Value>) -> ChatCompletionResponse {
    let mut body = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Paris."},
            "finish_reason": "stop"
        }]
    });
    if let Some(usage) = usage {
        body["usage"] = usage;
    }
    serde_json::from_value(body).unwrap()
}

#[test]
fn chat_call_keeps_model_kind_and_reported_usage() {
    let request = ChatCompletionRequest::new(
        "gpt-4o",
        vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("Capital of France?"),
        ],
    );
    let snapshot = RequestSnapshot::capture(&request);
    let response = chat_response(Some(
        json!({"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}),
    ));

    let record = extract::<_, String>(
        &snapshot,
        Ok(&response),
        Duration::from_millis(250),
        Utc::now(),
    );

    assert_eq!(record.model, "gpt-4o");
    assert_eq!(record.endpoint_kind, EndpointKind::ChatCompletion);
    assert_eq!(record.status, CallStatus::Success);
    assert_eq!(record.input_tokens, 12);
    assert_eq!(record.output_tokens, 3);
    assert_eq!(record.total_tokens(), 15);
    assert_eq!(record.token_source, TokenSource::Reported);
    assert_eq!(record.latency_ms, 250.0);
    let payload = record.response.unwrap();
    assert_eq!(payload.text, "Paris.");
    assert_eq!(payload.model.as_deref(), Some("gpt-4o-2024-08-06"));
    assert_eq!(payload.role.as_deref(), Some("assistant"));
    assert_eq!(payload.finish_reason.as_deref(), Some("stop"));
    assert!(matches!(record.request, RequestPayload::Messages(ref m) if m.len() == 2));
}

#[test]
fn completion_call_is_classified_by_prompt() {
    let request = CompletionRequest::new("gpt-3.5-turbo-instruct", "Say hi");
    let snapshot = RequestSnapshot::capture(&request);
    let response: CompletionResponse = serde_json::from_value(json!({
        "model": "gpt-3.5-turbo-instruct",
        "choices": [{"text": "hi", "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 2, "completion_tokens": 1, "total_tokens": 3}
    }))
    .unwrap();

    let record = extract::<_, String>(&snapshot, Ok(&response), Duration::ZERO, Utc::now());

    assert_eq!(record.endpoint_kind, EndpointKind::Completion);
    assert_eq!(record.request, RequestPayload::Prompt("Say hi".to_string()));
    assert_eq!(record.response.unwrap().text, "hi");
}

#[test]
fn missing_usage_falls_back_to_length_estimate() {
    let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("12345678")]);
    let snapshot = RequestSnapshot::capture(&request);
    let response = chat_response(None);

    let record = extract::<_, String>(&snapshot, Ok(&response), Duration::ZERO, Utc::now());

    assert_eq!(record.token_source, TokenSource::Estimated);
    assert_eq!(record.input_tokens, estimate_tokens("12345678"));
    assert_eq!(record.input_tokens, 2);
    assert_eq!(record.output_tokens, estimate_tokens("Paris."));
}

#[test]
fn upstream_error_yields_error_record() {
    let request = ChatCompletionRequest::new("gpt-4", vec![ChatMessage::user("hi")]);
    let snapshot = RequestSnapshot::capture(&request);
    let error = "rate limited".to_string();

    let record = extract::<ChatCompletionResponse, _>(
        &snapshot,
        Err(&error),
        Duration::from_millis(5),
        Utc::now(),
    );

    assert_eq!(record.status, CallStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("rate limited"));
    assert_eq!(record.model, "gpt-4");
    assert!(record.response.is_none());
    assert_eq!(record.token_source, TokenSource::Unavailable);
    assert_eq!(record.total_tokens(), 0);
}

#[test]
fn json_request_with_multipart_content_is_read() {
    let request = json!({
        "model": "gpt-4o",
        "messages": [
            {"role": "user", "content": [
                {"type": "text", "text": "describe"},
                {"type": "image_url", "image_url": {"url": "https://example.test/a.png"}}
            ]}
        ]
    });
    let snapshot = RequestSnapshot::capture(&request);
    assert_eq!(snapshot.endpoint_kind, EndpointKind::ChatCompletion);
    assert_eq!(snapshot.payload.text(), "describe");
}

#[test]
fn malformed_shapes_degrade_instead_of_failing() {
    let request = json!({"input": 42});
    let snapshot = RequestSnapshot::capture_as(&request, EndpointKind::Completion);
    let response = json!({"unexpected": true});

    let record = extract::<_, String>(&snapshot, Ok(&response), Duration::ZERO, Utc::now());

    assert_eq!(record.model, UNKNOWN_MODEL);
    assert_eq!(record.endpoint_kind, EndpointKind::Completion);
    assert_eq!(record.request, RequestPayload::Unknown);
    assert_eq!(record.status, CallStatus::Success);
    assert_eq!(record.token_source, TokenSource::Estimated);
    assert_eq!(record.input_tokens, 0);
    assert_eq!(record.output_tokens, 0);
}

#[test]
fn json_response_model_fills_in_missing_request_model() {
    let request = json!({"prompt": "hello"});
    let snapshot = RequestSnapshot::capture(&request);
    let response = json!({
        "model": "davinci-002",
        "choices": [{"text": "world"}],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    });

    let record = extract::<_, String>(&snapshot, Ok(&response), Duration::ZERO, Utc::now());

    assert_eq!(record.model, "davinci-002");
    assert_eq!(record.endpoint_kind, EndpointKind::Completion);
    assert_eq!(record.token_source, TokenSource::Reported);
}

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokentap_core::{
    CallRecord, CallStatus, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    InvocationMode, Instrumented, RequestPayload, TelemetryHandler, TelemetryManager,
};

#[derive(Default)]
struct RecordingHandler {
    records: Mutex<Vec<CallRecord>>,
}

impl RecordingHandler {
    fn records(&self) -> Vec<CallRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TelemetryHandler for RecordingHandler {
    async fn on_call(&self, record: &CallRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

#[derive(Debug, PartialEq)]
struct ProviderError(String);

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider error: {}", self.0)
    }
}

fn response_for(request: &ChatCompletionRequest) -> ChatCompletionResponse {
    let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
    serde_json::from_value(json!({
        "model": request.model,
        "choices": [{"message": {"role": "assistant", "content": format!("echo: {prompt}")}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": prompt.len(), "completion_tokens": 1, "total_tokens": prompt.len() + 1}
    }))
    .unwrap()
}

async fn echo(request: ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
    Ok(response_for(&request))
}

async fn failing(_request: ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
    Err(ProviderError("quota exceeded".to_string()))
}

fn manager_with(handler: &Arc<RecordingHandler>) -> TelemetryManager {
    TelemetryManager::noop().with_handler(handler.clone())
}

#[tokio::test]
async fn success_returns_inner_result_and_records_once() {
    let handler = Arc::new(RecordingHandler::default());
    let wrapped = Instrumented::new(echo, manager_with(&handler));
    let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hello")]);

    let response = wrapped.call(request.clone()).await.unwrap();

    assert_eq!(response, response_for(&request));
    assert_eq!(wrapped.mode(), InvocationMode::Async);
    let records = handler.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CallStatus::Success);
    assert_eq!(records[0].model, "gpt-4o");
    assert!(records[0].latency_ms >= 0.0);
}

#[tokio::test]
async fn upstream_error_is_returned_unchanged() {
    let handler = Arc::new(RecordingHandler::default());
    let wrapped = Instrumented::new(failing, manager_with(&handler));
    let request = ChatCompletionRequest::new("gpt-4", vec![ChatMessage::user("hello")]);

    let err = wrapped.call(request).await.unwrap_err();

    assert_eq!(err, ProviderError("quota exceeded".to_string()));
    let records = handler.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CallStatus::Error);
    assert_eq!(
        records[0].error_message.as_deref(),
        Some("provider error: quota exceeded")
    );
}

#[tokio::test]
async fn latency_covers_the_wrapped_call() {
    let handler = Arc::new(RecordingHandler::default());
    let slow = |request: ChatCompletionRequest| async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok::<_, ProviderError>(response_for(&request))
    };
    let wrapped = Instrumented::new(slow, manager_with(&handler));

    wrapped
        .call(ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("x")]))
        .await
        .unwrap();

    assert!(handler.records()[0].latency_ms >= 30.0);
}

#[tokio::test]
async fn noop_manager_skips_telemetry() {
    let wrapped = Instrumented::new(echo, TelemetryManager::noop());
    let response = wrapped
        .call(ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("x")]))
        .await
        .unwrap();
    assert_eq!(response.model, "gpt-4o");
    assert!(wrapped.manager().is_noop());
}

#[tokio::test]
async fn every_handler_sees_the_same_record() {
    let first = Arc::new(RecordingHandler::default());
    let second = Arc::new(RecordingHandler::default());
    let handlers: Vec<Arc<dyn TelemetryHandler>> = vec![first.clone(), second.clone()];
    let manager = TelemetryManager::new(handlers);
    let wrapped = Instrumented::new(echo, manager);

    wrapped
        .call(ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("x")]))
        .await
        .unwrap();

    assert_eq!(first.records(), second.records());
}

#[tokio::test]
async fn concurrent_calls_produce_isolated_records() {
    const CALLS: usize = 64;
    let handler = Arc::new(RecordingHandler::default());
    let jittered = |request: ChatCompletionRequest| async move {
        let delay = request.messages[0].content.len() as u64 % 7;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, ProviderError>(response_for(&request))
    };
    let call = Instrumented::new(jittered, manager_with(&handler)).into_fn();

    let tasks: Vec<_> = (0..CALLS)
        .map(|i| {
            let call = call.clone();
            tokio::spawn(async move {
                let request = ChatCompletionRequest::new(
                    format!("model-{i}"),
                    vec![ChatMessage::user(format!("prompt number {i}"))],
                );
                call(request).await.unwrap()
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let records = handler.records();
    assert_eq!(records.len(), CALLS);
    let ids: HashSet<_> = records.iter().map(|record| record.call_id).collect();
    assert_eq!(ids.len(), CALLS);
    for record in &records {
        let index = record.model.trim_start_matches("model-");
        let expected_prompt = format!("prompt number {index}");
        match &record.request {
            RequestPayload::Messages(messages) => assert_eq!(messages[0].content, expected_prompt),
            other => panic!("unexpected request payload {other:?}"),
        }
        let response = record.response.as_ref().unwrap();
        assert_eq!(response.text, format!("echo: {expected_prompt}"));
        assert_eq!(record.input_tokens, expected_prompt.len() as u64);
    }
}

#[tokio::test]
async fn cancelled_call_emits_nothing() {
    let handler = Arc::new(RecordingHandler::default());
    let hanging = |_request: ChatCompletionRequest| async move {
        futures::future::pending::<Result<ChatCompletionResponse, ProviderError>>().await
    };
    let wrapped = Instrumented::new(hanging, manager_with(&handler));

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        wrapped.call(ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("x")])),
    )
    .await;

    assert!(outcome.is_err());
    assert!(handler.records().is_empty());
}

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokentap::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ExporterConfig, GrafanaClient,
    GrafanaConfig, Monitor, PriceMatch, PriceTable, TelemetryExporter,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn create(request: ChatCompletionRequest) -> Result<ChatCompletionResponse, String> {
    serde_json::from_value(json!({
        "model": request.model,
        "choices": [{"message": {"role": "assistant", "content": "ok"}}],
        "usage": {"prompt_tokens": 1000, "completion_tokens": 1000, "total_tokens": 2000}
    }))
    .map_err(|err| err.to_string())
}

#[test]
fn gpt_4_turbo_costs_four_cents_per_thousand_each_way() {
    let cost = PriceTable::openai().estimate("gpt-4-turbo", 1000, 1000);
    assert_eq!(cost.pricing, PriceMatch::Exact);
    assert!((cost.total_cost - 0.04).abs() < 1e-12);
}

#[tokio::test]
async fn batched_monitor_flushes_through_reexports() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/prom"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/loki/api/v1/push"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = GrafanaConfig::new(
        format!("{}/api/prom", server.uri()),
        server.uri(),
        "m",
        "l",
        SecretString::new("token".to_string()),
    );
    let client = Arc::new(GrafanaClient::new(&config).unwrap());
    let exporter = TelemetryExporter::new(
        client,
        ExporterConfig {
            flush_interval: Duration::from_secs(3600),
            ..Default::default()
        },
    );
    let wrapped = Monitor::new(config)
        .with_exporter(exporter.clone())
        .instrument(create)
        .unwrap();

    for _ in 0..3 {
        wrapped
            .call(ChatCompletionRequest::new(
                "gpt-4-turbo",
                vec![ChatMessage::user("ping")],
            ))
            .await
            .unwrap();
    }
    let stats = exporter.flush(Duration::from_secs(5)).await.unwrap();
    assert_eq!(stats.events_flushed, 3);
    assert_eq!(stats.metrics_failed, 0);
    assert_eq!(stats.logs_failed, 0);
}

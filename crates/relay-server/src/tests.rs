use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use relay_config::Settings;
use relay_core::{AgentError, ModelMessage, ToolSchema};
use relay_llm::{CompletionProvider, FinishReason, LlmStream, StreamChunk};
use relay_tools::ToolRegistry;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{app, ServerState};

/// Answers every call with the same text and counts the calls.
#[derive(Default)]
struct CannedProvider {
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    async fn chat_stream(&self, _messages: &[ModelMessage], _tools: &[ToolSchema]) -> Result<LlmStream, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks = vec![
            Ok(StreamChunk::Content(self.reply.to_string())),
            Ok(StreamChunk::Finish(FinishReason::Stop)),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

fn router(provider: Arc<CannedProvider>) -> axum::Router {
    let settings = Settings::from_lookup(|key| match key {
        "AI_GATEWAY_API_KEY" => Some("test-key".into()),
        "WEATHER_LATENCY_MS" => Some("0".into()),
        _ => None,
    })
    .unwrap();
    let tools = ToolRegistry::with_defaults(&settings);

    app(Arc::new(ServerState::new(settings, provider, tools)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Splits an SSE body into its `data:` payloads.
fn data_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(String::from)
        .collect()
}

fn chunk_types(data: &[String]) -> Vec<String> {
    data.iter()
        .filter(|d| d.as_str() != "[DONE]")
        .map(|d| serde_json::from_str::<Value>(d).unwrap()["type"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn streams_ui_message_chunks() {
    let provider = Arc::new(CannedProvider { reply: "It is sunny.", ..Default::default() });
    let request = post_json(
        "/api/weather",
        json!({ "messages": [
            { "id": "m1", "role": "user", "parts": [{ "type": "text", "text": "Weather in Oslo?" }] }
        ]}),
    );

    let response = router(provider.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["x-vercel-ai-ui-message-stream"], "v1");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    let data = data_lines(&body_text(response).await);
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(
        chunk_types(&data),
        vec!["start", "start-step", "text-start", "text-delta", "text-end", "finish-step", "finish"]
    );

    let delta: Value = serde_json::from_str(&data[3]).unwrap();
    assert_eq!(delta, json!({ "type": "text-delta", "id": "text_1", "delta": "It is sunny." }));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chat_alias_accepts_legacy_content() {
    let provider = Arc::new(CannedProvider { reply: "hi", ..Default::default() });
    let request = post_json("/api/chat", json!({ "messages": [{ "role": "user", "content": "hello" }] }));

    let response = router(provider.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("\"delta\":\"hi\""));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_messages_stream_start_and_finish() {
    let provider = Arc::new(CannedProvider::default());
    let response = router(provider.clone())
        .oneshot(post_json("/api/weather", json!({ "messages": [] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let data = data_lines(&body_text(response).await);
    assert_eq!(chunk_types(&data), vec!["start", "finish"]);
    assert_eq!(data.last().map(String::as_str), Some("[DONE]"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_messages_is_bad_request() {
    let provider = Arc::new(CannedProvider::default());
    let response = router(provider.clone())
        .oneshot(post_json("/api/weather", json!({ "prompt": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("messages"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_json_body_is_bad_request() {
    let provider = Arc::new(CannedProvider::default());
    let request = Request::post("/api/weather").body(Body::from("messages")).unwrap();

    let response = router(provider.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unconvertible_history_is_bad_request() {
    let provider = Arc::new(CannedProvider::default());
    let request = post_json(
        "/api/weather",
        json!({ "messages": [{
            "role": "assistant",
            "parts": [{
                "type": "dynamic-tool",
                "toolName": "",
                "toolCallId": "call_1",
                "state": "output-available",
                "output": {}
            }]
        }]}),
    );

    let response = router(provider.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid message"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lists_declared_tools() {
    let response = router(Arc::new(CannedProvider::default()))
        .oneshot(Request::get("/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tools: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let names: Vec<&str> = tools.as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["fetch_weather_data", "generate_ui"]);
    assert_eq!(tools[0]["parameters"]["properties"]["units"]["enum"], json!(["celsius", "fahrenheit"]));
}

#[tokio::test]
async fn health_is_ok() {
    let response = router(Arc::new(CannedProvider::default()))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

mod common;

use common::{reply_with, spawn_inference, spawn_inference_with_delay};
use opendental_cua::extraction::EMPTY_RESPONSE_MARKER;
use opendental_cua::json_recovery::PARSE_ERROR_MARKER;
use opendental_cua::{ExtractionClient, ExtractionError, ImageRef, InferenceSettings, MediaType};
use serde_json::json;
use std::time::Duration;

fn settings(base_url: &str) -> InferenceSettings {
    InferenceSettings {
        api_key: "inference-test-key".to_string(),
        base_url: base_url.to_string(),
        ..Default::default()
    }
}

fn images() -> Vec<ImageRef> {
    vec![
        ImageRef::new(MediaType::Png, "TGVmdA=="),
        ImageRef::new(MediaType::Png, "UmlnaHQ="),
    ]
}

#[tokio::test]
async fn test_single_call_carries_all_images_and_headers() {
    let inference = spawn_inference(200, reply_with(r#"{"patients": [], "total_count": 0}"#)).await;
    let client = ExtractionClient::new(settings(&inference.base_url));

    let value = client.extract(&images(), "Return patients").await.unwrap();
    assert_eq!(value, json!({"patients": [], "total_count": 0}));

    let requests = inference.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.api_key.as_deref(), Some("inference-test-key"));
    assert_eq!(request.api_version.as_deref(), Some("2023-06-01"));
    assert_eq!(request.payload["model"], "claude-sonnet-4-20250514");
    assert_eq!(request.payload["max_tokens"], 4096);

    let content = request.payload["messages"][0]["content"].as_array().unwrap();
    let kinds: Vec<&str> = content.iter().map(|c| c["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["image", "image", "text"]);
    assert_eq!(content[1]["source"]["data"], "UmlnaHQ=");
    assert_eq!(content[2]["text"], "Return patients");
}

#[tokio::test]
async fn test_fenced_reply_is_recovered() {
    let reply = "Here you go:\n```json\n{\"appointments\": [{\"time\": \"9:00 AM\"}]}\n```";
    let inference = spawn_inference(200, reply_with(reply)).await;
    let client = ExtractionClient::new(settings(&inference.base_url));

    let value = client.extract(&images()[..1], "Return appointments").await.unwrap();
    assert_eq!(value["appointments"][0]["time"], "9:00 AM");
}

#[tokio::test]
async fn test_unparsable_reply_is_data_not_error() {
    let reply = "Sorry, ".repeat(200);
    let inference = spawn_inference(200, reply_with(&reply)).await;
    let client = ExtractionClient::new(settings(&inference.base_url));

    let value = client.extract(&images(), "Return patients").await.unwrap();
    assert_eq!(value["error"], PARSE_ERROR_MARKER);
    assert_eq!(value["raw_response"].as_str().unwrap().chars().count(), 500);
}

#[tokio::test]
async fn test_empty_content_returns_marker() {
    let inference = spawn_inference(200, json!({"content": []})).await;
    let client = ExtractionClient::new(settings(&inference.base_url));

    let value = client.extract(&images(), "Return patients").await.unwrap();
    assert_eq!(value, json!({"error": EMPTY_RESPONSE_MARKER}));
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let inference = spawn_inference(429, json!({"type": "error", "error": {"type": "rate_limit_error"}})).await;
    let client = ExtractionClient::new(settings(&inference.base_url));

    let err = client.extract(&images(), "Return patients").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Status { status: 429, .. }));
    assert_eq!(err.to_string(), "API error: 429");
    assert_eq!(err.status_code(), Some(429));
    assert_eq!(inference.requests().len(), 1);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let inference =
        spawn_inference_with_delay(200, reply_with("{}"), Duration::from_secs(3)).await;
    let client = ExtractionClient::new(InferenceSettings {
        single_image_timeout: Duration::from_millis(200),
        ..settings(&inference.base_url)
    });

    let err = client.extract(&images()[..1], "Return appointments").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Timeout(_)), "{err:?}");
    assert_eq!(err.to_value()["status_code"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_no_images_makes_no_request() {
    let inference = spawn_inference(200, reply_with("{}")).await;
    let client = ExtractionClient::new(settings(&inference.base_url));

    let err = client.extract(&[], "Return patients").await.unwrap_err();
    assert!(matches!(err, ExtractionError::NoImages));
    assert!(inference.requests().is_empty());
}

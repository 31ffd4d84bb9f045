//! GeminiGenerator against a mocked Gemini HTTP API.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::RecordingSleeper;
use video_blogger::config::GeminiConfig;
use video_blogger::generator::{ContentGenerator, GeminiGenerator};
use video_blogger::retry::RetryPolicy;
use video_blogger::GenerationError;

const POST_JSON: &str = r#"{"title":"Listening In","content_html":"<h2>Intro</h2><p>Words.</p>","summary_for_card":"A summary."}"#;
const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";
const FILE_URI: &str = "https://generativelanguage.googleapis.com/v1beta/files/abc123";

fn file_json(state: &str) -> Value {
    json!({
        "name": "files/abc123",
        "uri": FILE_URI,
        "mimeType": "audio/mp4",
        "state": state
    })
}

fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 20, "totalTokenCount": 30 }
    }))
}

fn rate_limited() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_json(json!({
        "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
    }))
}

/// Mount the upload, status and delete endpoints. The uploaded file reports `initial_state`.
async fn mock_files_api(server: &MockServer, initial_state: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(query_param("key", "test-key"))
        .and(header("x-goog-upload-command", "start"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-goog-upload-url", format!("{}/upload-session/1", server.uri())),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload-session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file": file_json(initial_state) })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("ACTIVE")))
        .mount(server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(server)
        .await;
}

fn generate_mock() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
}

async fn requests_to(server: &MockServer, method_name: &str, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == method_name && request.url.path() == request_path)
        .count()
}

fn generator_for(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> GeminiGenerator {
    let config = GeminiConfig {
        api_key: Some("test-key".to_string()),
        api_base: server.uri(),
        ..GeminiConfig::default()
    };
    GeminiGenerator::new(&config, RetryPolicy::default()).with_sleeper(sleeper)
}

fn audio_file(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("dQw4w9WgXcQ.0123.m4a");
    std::fs::write(&path, vec![7u8; 2048]).unwrap();
    path
}

#[tokio::test]
async fn test_rate_limit_retried_then_succeeds() {
    let server = MockServer::start().await;
    mock_files_api(&server, "ACTIVE").await;
    generate_mock()
        .respond_with(rate_limited())
        .up_to_n_times(2)
        .mount(&server)
        .await;
    generate_mock()
        .respond_with(text_response(POST_JSON))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let generator = generator_for(&server, sleeper.clone());
    let dir = tempfile::tempdir().unwrap();

    let post = generator.generate(&audio_file(&dir)).await.unwrap();

    assert_eq!(post.title, "Listening In");
    assert_eq!(requests_to(&server, "POST", GENERATE_PATH).await, 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert_eq!(sleeper.total(), Duration::from_secs(6));
}

#[tokio::test]
async fn test_rate_limit_exhausts_attempts() {
    let server = MockServer::start().await;
    mock_files_api(&server, "ACTIVE").await;
    generate_mock().respond_with(rate_limited()).mount(&server).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let generator = generator_for(&server, sleeper.clone());
    let dir = tempfile::tempdir().unwrap();

    let err = generator.generate(&audio_file(&dir)).await.unwrap_err();

    assert!(err.is_rate_limited(), "{}", err);
    assert_eq!(requests_to(&server, "POST", GENERATE_PATH).await, 3);
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let server = MockServer::start().await;
    mock_files_api(&server, "ACTIVE").await;
    generate_mock()
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Unsupported MIME type" }
        })))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let generator = generator_for(&server, sleeper.clone());
    let dir = tempfile::tempdir().unwrap();

    let err = generator.generate(&audio_file(&dir)).await.unwrap_err();

    match err {
        GenerationError::Upstream { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Unsupported MIME type");
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
    assert_eq!(requests_to(&server, "POST", GENERATE_PATH).await, 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_fenced_output_is_accepted() {
    let server = MockServer::start().await;
    mock_files_api(&server, "ACTIVE").await;
    let fenced = format!("```json\n{}\n```", POST_JSON);
    generate_mock()
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{}, { "fileData": { "fileUri": FILE_URI } }] }]
        })))
        .respond_with(text_response(&fenced))
        .mount(&server)
        .await;

    let generator = generator_for(&server, Arc::new(RecordingSleeper::default()));
    let dir = tempfile::tempdir().unwrap();

    let post = generator.generate(&audio_file(&dir)).await.unwrap();

    assert_eq!(post.summary_for_card, "A summary.");
}

#[tokio::test]
async fn test_unparseable_output_is_malformed_and_not_retried() {
    let server = MockServer::start().await;
    mock_files_api(&server, "ACTIVE").await;
    generate_mock()
        .respond_with(text_response("Here is a lovely blog post about music!"))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let generator = generator_for(&server, sleeper.clone());
    let dir = tempfile::tempdir().unwrap();

    let err = generator.generate(&audio_file(&dir)).await.unwrap_err();

    assert!(matches!(err, GenerationError::MalformedOutput(_)));
    assert_eq!(requests_to(&server, "POST", GENERATE_PATH).await, 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_waits_for_processing_upload() {
    let server = MockServer::start().await;
    mock_files_api(&server, "PROCESSING").await;
    generate_mock()
        .respond_with(text_response(POST_JSON))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let generator = generator_for(&server, sleeper.clone());
    let dir = tempfile::tempdir().unwrap();

    generator.generate(&audio_file(&dir)).await.unwrap();

    assert_eq!(requests_to(&server, "GET", "/v1beta/files/abc123").await, 1);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
}

//! Wire-level tests for the OpenAI-compatible adapter.

use nexus_inference::openai::{OpenAIBackend, OpenAIConfig};
use nexus_inference::{
    EmbeddingProvider, Error, ImageProvider, ImageRequest, ModelConfig, ProviderKind,
    TextProvider, TextRequest,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, model: &str) -> OpenAIBackend {
    let config = OpenAIConfig {
        http_referer: Some("https://nexus.example.com".to_string()),
        ..OpenAIConfig::openrouter("test-key").with_base_url(server.uri())
    };
    OpenAIBackend::new(ModelConfig::new(ProviderKind::OpenRouter, model), config)
        .expect("Failed to create backend")
}

fn chat_reply(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn test_text_request_shape_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header("HTTP-Referer", "https://nexus.example.com"))
        .and(header("X-Title", "Systemic Shift AI"))
        .and(body_partial_json(json!({
            "model": "openai/gpt-3.5-turbo",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Hello"}
            ],
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(json!("{\"ok\":true}"))))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend(&server, "openai/gpt-3.5-turbo")
        .generate_text(&TextRequest::new("Hello").with_system("Be brief.").json())
        .await
        .unwrap();
    assert_eq!(text, "{\"ok\":true}");
}

#[tokio::test]
async fn test_plain_text_requests_text_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"response_format": {"type": "text"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(json!("hi"))))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend(&server, "m")
        .generate_text(&TextRequest::new("Hello"))
        .await
        .unwrap();
    assert_eq!(text, "hi");
}

#[tokio::test]
async fn test_non_success_status_is_transport_with_truncated_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("r".repeat(2_000)))
        .mount(&server)
        .await;

    let err = backend(&server, "m")
        .generate_text(&TextRequest::new("Hello"))
        .await
        .unwrap_err();
    match err {
        Error::Transport { status, body } => {
            assert_eq!(status, Some(429));
            assert_eq!(body.chars().count(), 500);
        }
        other => panic!("Expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_success_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>oops</html>", "text/html"))
        .mount(&server)
        .await;

    let err = backend(&server, "m")
        .generate_text(&TextRequest::new("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn test_missing_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = backend(&server, "m")
        .generate_text(&TextRequest::new("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_without_status() {
    let server = MockServer::start().await;
    let backend = backend(&server, "m");
    drop(server);

    let err = backend
        .generate_text(&TextRequest::new("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { status: None, .. }), "{err:?}");
}

#[tokio::test]
async fn test_image_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "google/gemini-2.5-flash-image",
            "modalities": ["image", "text"],
            "image_config": {"aspect_ratio": "16:9"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "images": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,iVBORw0KGgo="}}]
            }}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = backend(&server, "google/gemini-2.5-flash-image")
        .generate_image(&ImageRequest::new("A skyline").with_aspect_ratio("16:9"))
        .await
        .unwrap();
    assert_eq!(payload.as_str(), "data:image/png;base64,iVBORw0KGgo=");
}

#[tokio::test]
async fn test_image_response_without_images_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(json!("I cannot draw"))))
        .mount(&server)
        .await;

    let err = backend(&server, "m")
        .generate_image(&ImageRequest::new("A skyline"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}

#[tokio::test]
async fn test_embedding_request_and_dimension_check() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": "hello world"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
            "model": "text-embedding-3-small"
        })))
        .mount(&server)
        .await;

    let ok = backend(&server, "text-embedding-3-small");
    assert_eq!(ok.embed_text("hello world").await.unwrap(), vec![0.1, 0.2, 0.3]);

    let config = OpenAIConfig {
        embed_dimension: Some(1536),
        ..OpenAIConfig::openai("k").with_base_url(server.uri())
    };
    let strict = OpenAIBackend::new(
        ModelConfig::new(ProviderKind::OpenAi, "text-embedding-3-small"),
        config,
    )
    .unwrap();
    let err = strict.embed_text("hello world").await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse(_)));
}

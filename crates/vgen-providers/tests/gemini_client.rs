//! Gemini client against a mocked HTTP API.

use serde_json::json;
use vgen_providers::{
    EnhanceContext, GeminiClient, GeminiConfig, ProviderError, PromptEnhancer,
    FALLBACK_IMAGE_DESCRIPTION,
};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIMARY: &str = "/models/gemini-2.5-flash:generateContent";
const FALLBACK: &str = "/models/gemini-2.5-flash-lite:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig::new("test-key").with_base_url(server.uri())).unwrap()
}

fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

#[tokio::test]
async fn test_enhance_returns_model_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRIMARY))
        .and(query_param("key", "test-key"))
        .respond_with(text_response("  A ginger cat rides a skateboard at golden hour.  "))
        .expect(1)
        .mount(&server)
        .await;

    let enhanced = client(&server)
        .enhance("a cat on a skateboard", EnhanceContext::TextToVideo)
        .await;
    assert_eq!(enhanced, "A ginger cat rides a skateboard at golden hour.");
}

#[tokio::test]
async fn test_enhance_falls_back_to_next_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRIMARY))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FALLBACK))
        .respond_with(text_response("enhanced by lite"))
        .expect(1)
        .mount(&server)
        .await;

    let enhanced = client(&server)
        .enhance("sunset", EnhanceContext::TextToVideo)
        .await;
    assert_eq!(enhanced, "enhanced by lite");
}

#[tokio::test]
async fn test_enhance_returns_input_when_every_model_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let enhanced = client(&server)
        .enhance("a lighthouse in a storm", EnhanceContext::ImageToVideo)
        .await;
    assert_eq!(enhanced, "a lighthouse in a storm");
}

#[tokio::test]
async fn test_enhance_treats_empty_candidates_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let enhanced = client(&server)
        .enhance("unchanged", EnhanceContext::TextToVideo)
        .await;
    assert_eq!(enhanced, "unchanged");
}

#[tokio::test]
async fn test_analyze_image_sends_inline_data() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("beach.webp");
    std::fs::write(&image, b"img").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PRIMARY))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{}, { "inlineData": { "mimeType": "image/webp", "data": "aW1n" } }] }]
        })))
        .respond_with(text_response("A quiet beach at dawn with gentle waves."))
        .expect(1)
        .mount(&server)
        .await;

    let analysis = client(&server).analyze_image(image.to_str().unwrap()).await;
    assert!(!analysis.degraded);
    assert_eq!(analysis.description, "A quiet beach at dawn with gentle waves.");
}

#[tokio::test]
async fn test_analyze_image_degrades_on_provider_error() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("beach.png");
    std::fs::write(&image, b"img").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad image"))
        .mount(&server)
        .await;

    let analysis = client(&server).analyze_image(image.to_str().unwrap()).await;
    assert!(analysis.degraded);
    assert_eq!(analysis.description, FALLBACK_IMAGE_DESCRIPTION);
    assert_eq!(analysis.error.as_deref(), Some("bad image"));
}

#[tokio::test]
async fn test_storyboard_parses_fenced_json() {
    let server = MockServer::start().await;
    let fenced = r#"```json
{"scenes": [
  {"description": "A knight rides out at dawn", "camera": "wide tracking shot", "duration_secs": 4, "transition": "fade"},
  {"description": "The village burns", "camera_angle": "aerial", "duration": 6}
]}
```"#;
    Mock::given(method("POST"))
        .and(path(PRIMARY))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(text_response(fenced))
        .mount(&server)
        .await;

    let storyboard = client(&server)
        .generate_storyboard("A knight rides into a burning village at dawn.", 2)
        .await
        .unwrap();

    assert_eq!(storyboard.num_scenes(), 2);
    assert_eq!(storyboard.scenes[0].scene_number, 1);
    assert_eq!(storyboard.scenes[0].transition, "fade");
    assert_eq!(storyboard.scenes[1].camera, "aerial");
    assert_eq!(storyboard.scenes[1].transition, "cut");
    assert_eq!(storyboard.total_duration_secs, 10);
}

#[tokio::test]
async fn test_storyboard_rejects_malformed_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(text_response("Scene 1: a castle"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_storyboard("A knight rides into a burning village.", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Json(_)));
}

#[tokio::test]
async fn test_storyboard_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key invalid"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_storyboard("A knight rides into a burning village.", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Http { status: 403, .. }));
}

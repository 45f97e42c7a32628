use std::time::Duration;

use base64::Engine;
use kothakoli_core::{Dialect, ImageQuality, MaturityLevel, MediaBlob, Tone};
use kothakoli_engine::gateway::{GatewayConfig, GeminiGateway};
use kothakoli_engine::{GatewayError, StoryAi, TextRequest};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> GeminiGateway {
    let mut cfg = GatewayConfig::production(Some("test-key".into()));
    cfg.base_url = server.uri();
    cfg.text_model = "text-model".into();
    cfg.image_model = "image-model".into();
    cfg.edit_model = "edit-model".into();
    cfg.video_model = "video-model".into();
    cfg.speech_model = "tts-model".into();
    cfg.poll_interval = Duration::from_millis(5);
    cfg.max_poll_attempts = 3;
    cfg.request_timeout = Duration::from_secs(5);
    cfg.media_timeout = Duration::from_secs(5);
    GeminiGateway::new(cfg)
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn inline_reply(mime: &str, bytes: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"parts": [
            {"text": "done"},
            {"inlineData": {"mimeType": mime, "data": b64(bytes)}}
        ]}}]
    })
}

#[tokio::test]
async fn text_generation_sends_story_instruction_and_sampling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-model:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("Sylheti"))
        .and(body_string_contains("\"topP\":0.95"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "নতুন অধ্যায়\n\n\n\nশেষ"}]}, "finishReason": "STOP"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server);
    let out = gw
        .generate_text(&TextRequest {
            context: "গল্প".into(),
            maturity: MaturityLevel::General,
            tone: Tone::Standard,
            dialect: Dialect::Sylhet,
        })
        .await
        .unwrap();

    assert_eq!(out, "নতুন অধ্যায়\n\nশেষ");
}

#[tokio::test]
async fn empty_text_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "STOP"}]
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .generate_text(&TextRequest {
            context: "x".into(),
            maturity: MaturityLevel::General,
            tone: Tone::Standard,
            dialect: Dialect::Bengali,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Empty("text")));
}

#[tokio::test]
async fn image_generation_uses_quality_and_aspect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/image-model:generateContent"))
        .and(body_string_contains("\"imageSize\":\"2K\""))
        .and(body_string_contains("\"aspectRatio\":\"16:9\""))
        .and(body_string_contains("adult fiction aesthetic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inline_reply("image/png", &[9, 9])))
        .mount(&server)
        .await;

    let img = gateway(&server)
        .generate_image("rainy night", MaturityLevel::Mature, ImageQuality::TwoK)
        .await
        .unwrap();
    assert_eq!(img.mime_type, "image/png");
    assert_eq!(img.bytes, vec![9, 9]);
}

#[tokio::test]
async fn prompt_block_maps_to_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/image-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .generate_image("x", MaturityLevel::General, ImageQuality::OneK)
        .await
        .unwrap_err();
    match err {
        GatewayError::Blocked { reason } => assert_eq!(reason, "SAFETY"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_maps_to_invalid_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/edit-model:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .edit_image(&MediaBlob::new("image/png", vec![1]), "add rain")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCredential(_)));
}

#[tokio::test]
async fn edit_returns_new_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/edit-model:generateContent"))
        .and(body_string_contains("add rain"))
        .and(body_string_contains(&b64(&[1, 2, 3])))
        .respond_with(ResponseTemplate::new(200).set_body_json(inline_reply("image/jpeg", &[4])))
        .mount(&server)
        .await;

    let out = gateway(&server)
        .edit_image(&MediaBlob::new("image/png", vec![1, 2, 3]), "add rain")
        .await
        .unwrap();
    assert_eq!(out, MediaBlob::new("image/jpeg", vec![4]));
}

#[tokio::test]
async fn speech_picks_voice_by_tone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/tts-model:generateContent"))
        .and(body_string_contains("\"voiceName\":\"Kore\""))
        .and(body_string_contains("romantic tone"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(inline_reply("audio/L16;codec=pcm;rate=24000", &[0, 0, 1, 0])),
        )
        .mount(&server)
        .await;

    let audio = gateway(&server)
        .generate_speech("ভালোবাসা", Tone::Romantic)
        .await
        .unwrap();
    assert_eq!(audio.sample_rate_hz, 24_000);
    assert_eq!(audio.sample_count(), 2);
}

#[tokio::test]
async fn video_polls_until_done_then_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/video-model:predictLongRunning"))
        .and(body_string_contains("\"resolution\":\"720p\""))
        .and(body_string_contains("bytesBase64Encoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/video-model/operations/op1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models/video-model/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/video-model/operations/op1",
            "done": true,
            "response": {"generateVideoResponse": {"generatedSamples": [
                {"video": {"uri": format!("{}/files/clip:download?alt=media", server.uri())}}
            ]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/clip:download"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![0, 0, 0, 24]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let seed = MediaBlob::new("image/png", vec![7]);
    let video = gateway(&server)
        .generate_video("নদীর ধারে", Some(&seed))
        .await
        .unwrap();
    assert_eq!(video.mime_type, "video/mp4");
    assert_eq!(video.bytes, vec![0, 0, 0, 24]);
}

#[tokio::test]
async fn video_polling_gives_up_after_cap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/video-model:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/video-model/operations/slow"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models/video-model/operations/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/video-model/operations/slow",
            "done": false
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = gateway(&server).generate_video("x", None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout { attempts: 3 }));
}

#[tokio::test]
async fn video_entity_not_found_is_a_key_problem() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/video-model:predictLongRunning"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).generate_video("x", None).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCredential(_)));
}

#[tokio::test]
async fn filtered_video_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/video-model:predictLongRunning"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/video-model/operations/f",
            "done": true,
            "response": {"generateVideoResponse": {"raiMediaFilteredReasons": ["unsafe"]}}
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).generate_video("x", None).await.unwrap_err();
    assert!(matches!(err, GatewayError::Blocked { .. }));
}

#[tokio::test]
async fn visual_prompt_falls_back_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-model:generateContent"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let out = gateway(&server)
        .translate_to_visual_prompt("নদী", MaturityLevel::General)
        .await;
    assert_eq!(out, kothakoli_core::prompts::FALLBACK_VISUAL_PROMPT);
}

#[tokio::test]
async fn visual_prompt_returns_model_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-model:generateContent"))
        .and(body_string_contains("Respond with the English prompt ONLY."))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "  A river at dusk  "}]}}]
        })))
        .mount(&server)
        .await;

    let out = gateway(&server)
        .translate_to_visual_prompt("নদী", MaturityLevel::General)
        .await;
    assert_eq!(out, "A river at dusk");
}

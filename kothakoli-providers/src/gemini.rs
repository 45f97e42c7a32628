use crate::request::HttpRequest;
use base64::Engine;
use kothakoli_core::MediaBlob;
use serde_json::{Value, json};

pub const PRODUCTION_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone, PartialEq, Eq)]
pub struct GeminiEndpoint {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for GeminiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        join_url(&self.base_url, &format!("v1beta/models/{model}:{method}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f64,
    pub top_p: f64,
}

pub fn build_generate_content_request(
    endpoint: &GeminiEndpoint,
    model: &str,
    payload: &Value,
) -> HttpRequest {
    HttpRequest::post_json(
        endpoint.model_url(model, "generateContent"),
        &endpoint.api_key,
        payload,
    )
}

pub fn text_payload(system_instruction: Option<&str>, user_text: &str, sampling: Option<Sampling>) -> Value {
    let mut payload = json!({
        "contents": [{"role": "user", "parts": [{"text": user_text}]}],
    });
    if let Some(map) = payload.as_object_mut() {
        if let Some(system) = system_instruction {
            map.insert(
                "systemInstruction".into(),
                json!({"parts": [{"text": system}]}),
            );
        }
        if let Some(s) = sampling {
            map.insert(
                "generationConfig".into(),
                json!({"temperature": s.temperature, "topP": s.top_p}),
            );
        }
    }
    payload
}

pub fn image_payload(prompt: &str, aspect_ratio: &str, image_size: &str) -> Value {
    json!({
        "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": {"aspectRatio": aspect_ratio, "imageSize": image_size},
        },
    })
}

pub fn edit_image_payload(image: &MediaBlob, instruction: &str) -> Value {
    json!({
        "contents": [{"role": "user", "parts": [
            {"inlineData": {"mimeType": image.mime_type, "data": encode_b64(&image.bytes)}},
            {"text": instruction},
        ]}],
        "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]},
    })
}

pub fn speech_payload(text: &str, voice_name: &str) -> Value {
    json!({
        "contents": [{"parts": [{"text": text}]}],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": voice_name}}},
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParams<'a> {
    pub prompt: &'a str,
    pub aspect_ratio: &'a str,
    pub resolution: &'a str,
}

pub fn build_video_request(
    endpoint: &GeminiEndpoint,
    model: &str,
    params: &VideoParams<'_>,
    seed_image: Option<&MediaBlob>,
) -> HttpRequest {
    let mut instance = json!({"prompt": params.prompt});
    if let (Some(image), Some(map)) = (seed_image, instance.as_object_mut()) {
        map.insert(
            "image".into(),
            json!({"bytesBase64Encoded": encode_b64(&image.bytes), "mimeType": image.mime_type}),
        );
    }

    let payload = json!({
        "instances": [instance],
        "parameters": {
            "aspectRatio": params.aspect_ratio,
            "resolution": params.resolution,
        },
    });

    HttpRequest::post_json(
        endpoint.model_url(model, "predictLongRunning"),
        &endpoint.api_key,
        &payload,
    )
}

pub fn build_operation_request(endpoint: &GeminiEndpoint, operation_name: &str) -> HttpRequest {
    let url = join_url(&endpoint.base_url, &format!("v1beta/{operation_name}"));
    HttpRequest::get(url, &endpoint.api_key)
}

/// Generated files are served by the same API and need the key as well.
pub fn build_download_request(endpoint: &GeminiEndpoint, uri: &str) -> HttpRequest {
    HttpRequest::get(uri, &endpoint.api_key)
}

fn encode_b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::API_KEY_HEADER;

    fn endpoint() -> GeminiEndpoint {
        GeminiEndpoint::new("https://api.example.com/", "k")
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://a.com/", "/v1beta/x"), "https://a.com/v1beta/x");
        assert_eq!(join_url("https://a.com", "v1beta/x"), "https://a.com/v1beta/x");
    }

    #[test]
    fn text_request_carries_system_instruction_and_sampling() {
        let payload = text_payload(
            Some("be a novelist"),
            "continue",
            Some(Sampling {
                temperature: 0.9,
                top_p: 0.95,
            }),
        );
        let req = build_generate_content_request(&endpoint(), "gemini-test", &payload);

        assert_eq!(req.method, "POST");
        assert_eq!(
            req.url,
            "https://api.example.com/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(req.header(API_KEY_HEADER), Some("k"));

        let body = req.json_body().unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be a novelist");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "continue");
        assert!(body["generationConfig"]["topP"].as_f64().unwrap() > 0.9);
    }

    #[test]
    fn plain_text_payload_has_no_config() {
        let payload = text_payload(None, "hi", None);
        assert!(payload.get("systemInstruction").is_none());
        assert!(payload.get("generationConfig").is_none());
    }

    #[test]
    fn image_and_speech_payloads_select_modalities() {
        let image = image_payload("river", "16:9", "2K");
        assert_eq!(image["generationConfig"]["imageConfig"]["imageSize"], "2K");
        assert_eq!(image["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");

        let speech = speech_payload("text", "Kore");
        assert_eq!(speech["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            speech["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn edit_payload_inlines_image() {
        let image = MediaBlob::new("image/png", vec![1, 2, 3]);
        let payload = edit_image_payload(&image, "add a hill");
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["text"], "add a hill");
    }

    #[test]
    fn video_request_includes_optional_seed_image() {
        let params = VideoParams {
            prompt: "animate",
            aspect_ratio: "16:9",
            resolution: "720p",
        };
        let without = build_video_request(&endpoint(), "veo", &params, None);
        assert!(without.url.ends_with("/v1beta/models/veo:predictLongRunning"));
        let body = without.json_body().unwrap();
        assert!(body["instances"][0].get("image").is_none());
        assert_eq!(body["parameters"]["resolution"], "720p");

        let seed = MediaBlob::new("image/png", vec![1, 2, 3]);
        let with = build_video_request(&endpoint(), "veo", &params, Some(&seed));
        let body = with.json_body().unwrap();
        assert_eq!(body["instances"][0]["image"]["bytesBase64Encoded"], "AQID");
    }

    #[test]
    fn operation_request_uses_operation_name() {
        let req = build_operation_request(&endpoint(), "models/veo/operations/abc");
        assert_eq!(req.method, "GET");
        assert_eq!(req.url, "https://api.example.com/v1beta/models/veo/operations/abc");
    }

    #[test]
    fn endpoint_debug_redacts_key() {
        let s = format!("{:?}", GeminiEndpoint::new("https://x", "secret"));
        assert!(!s.contains("secret"));
    }
}

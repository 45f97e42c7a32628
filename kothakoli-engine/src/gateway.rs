use std::time::Duration;

use async_trait::async_trait;
use kothakoli_core::prompts::{
    EMPTY_VISUAL_PROMPT, FALLBACK_VISUAL_PROMPT, VISUAL_PROMPT_SYSTEM, image_prompt,
    narration_request, narration_voice, story_system_instruction, truncate_context,
    video_prompt, visual_prompt_request,
};
use kothakoli_core::text::clean_model_output;
use kothakoli_core::{ImageQuality, MaturityLevel, MediaBlob, Tone};
use kothakoli_providers::gemini::{
    GeminiEndpoint, PRODUCTION_BASE_URL, Sampling, VideoParams, build_download_request,
    build_generate_content_request, build_operation_request, build_video_request,
    edit_image_payload, image_payload, speech_payload, text_payload,
};
use kothakoli_providers::parse::{
    GenerateContentReply, VideoOperation, parse_api_error, parse_generate_content,
    parse_video_operation,
};
use kothakoli_providers::request::HttpRequest;
use kothakoli_providers::runtime::{HttpResponse, execute_with_timeout};
use serde_json::Value;

use crate::error::GatewayError;
use crate::traits::{SpeechAudio, StoryAi, TextRequest};

const ASPECT_RATIO: &str = "16:9";
const VIDEO_RESOLUTION: &str = "720p";
const SPEECH_SAMPLE_RATE_HZ: u32 = 24_000;
const STORY_SAMPLING: Sampling = Sampling {
    temperature: 0.9,
    top_p: 0.95,
};
// Returned by the API for keys that cannot reach a model (e.g. Veo on a free key).
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,

    pub text_model: String,
    pub image_model: String,
    pub edit_model: String,
    pub video_model: String,
    pub speech_model: String,

    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub request_timeout: Duration,
    pub media_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("edit_model", &self.edit_model)
            .field("video_model", &self.video_model)
            .field("speech_model", &self.speech_model)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

impl GatewayConfig {
    pub fn production(api_key: Option<String>) -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.into(),
            api_key,
            text_model: "gemini-3-flash-preview".into(),
            image_model: "gemini-3-pro-image-preview".into(),
            edit_model: "gemini-2.5-flash-image".into(),
            video_model: "veo-3.1-fast-generate-preview".into(),
            speech_model: "gemini-2.5-flash-preview-tts".into(),
            poll_interval: Duration::from_secs(8),
            // About twelve minutes at the production interval.
            max_poll_attempts: 90,
            request_timeout: Duration::from_secs(120),
            media_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiGateway {
    cfg: GatewayConfig,
}

impl GeminiGateway {
    pub fn new(cfg: GatewayConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.cfg
    }

    fn endpoint(&self) -> Result<GeminiEndpoint, GatewayError> {
        let key = self
            .cfg
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(GatewayError::MissingCredential)?;
        Ok(GeminiEndpoint::new(self.cfg.base_url.clone(), key))
    }

    async fn send(&self, req: &HttpRequest, timeout: Duration) -> Result<HttpResponse, GatewayError> {
        let resp = execute_with_timeout(req, timeout)
            .await
            .map_err(GatewayError::from_transport)?;
        if !resp.is_success() {
            let err = classify_http_error(resp.status, &resp.body);
            log::warn!("gemini request failed: {err}");
            return Err(err);
        }
        Ok(resp)
    }

    async fn generate_content(
        &self,
        model: &str,
        payload: &Value,
    ) -> Result<GenerateContentReply, GatewayError> {
        let endpoint = self.endpoint()?;
        let req = build_generate_content_request(&endpoint, model, payload);
        let resp = self.send(&req, self.cfg.request_timeout).await?;
        let reply = parse_generate_content(&resp.body).map_err(GatewayError::from_transport)?;

        let produced_nothing = reply.text.is_none() && reply.media.is_empty();
        if let Some(reason) = reply.safety_block() {
            if produced_nothing || reply.block_reason.is_some() {
                log::warn!("gemini {model} blocked: {reason}");
                return Err(GatewayError::Blocked { reason });
            }
        }
        Ok(reply)
    }

    async fn poll_video(&self, endpoint: &GeminiEndpoint, mut op: VideoOperation) -> Result<VideoOperation, GatewayError> {
        let mut polls: u32 = 0;
        while !op.done {
            if polls >= self.cfg.max_poll_attempts {
                log::warn!("video operation {} still running after {polls} polls", op.name);
                return Err(GatewayError::Timeout { attempts: polls });
            }
            tokio::time::sleep(self.cfg.poll_interval).await;
            polls += 1;

            let req = build_operation_request(endpoint, &op.name);
            let resp = self.send(&req, self.cfg.request_timeout).await?;
            op = parse_video_operation(&resp.body).map_err(GatewayError::from_transport)?;
            log::debug!("video operation {} poll {polls}: done={}", op.name, op.done);
        }
        Ok(op)
    }
}

fn classify_http_error(status: u16, body: &[u8]) -> GatewayError {
    let api = parse_api_error(body);
    let message = api
        .as_ref()
        .map(|e| e.message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    let key_rejected = message.contains(ENTITY_NOT_FOUND)
        || message.contains("API key not valid")
        || api
            .as_ref()
            .and_then(|e| e.status.as_deref())
            .is_some_and(|s| s == "PERMISSION_DENIED" || s == "UNAUTHENTICATED");

    if status == 401 || status == 403 || key_rejected {
        return GatewayError::InvalidCredential(message);
    }

    GatewayError::Request {
        status: Some(status),
        message,
    }
}

fn classify_operation_error(message: String) -> GatewayError {
    if message.contains(ENTITY_NOT_FOUND) {
        GatewayError::InvalidCredential(message)
    } else {
        GatewayError::request(message)
    }
}

fn sample_rate_from_mime(mime: &str) -> u32 {
    mime.split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
        .unwrap_or(SPEECH_SAMPLE_RATE_HZ)
}

fn first_image(reply: GenerateContentReply) -> Result<MediaBlob, GatewayError> {
    reply
        .media
        .into_iter()
        .find(|m| m.mime_type.starts_with("image/"))
        .ok_or(GatewayError::Empty("image"))
}

#[async_trait]
impl StoryAi for GeminiGateway {
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GatewayError> {
        let system = story_system_instruction(req.maturity, req.tone, req.dialect);
        let payload = text_payload(
            Some(&system),
            &truncate_context(&req.context),
            Some(STORY_SAMPLING),
        );
        let reply = self.generate_content(&self.cfg.text_model, &payload).await?;
        let text = reply.text.map(|t| clean_model_output(&t)).unwrap_or_default();
        if text.is_empty() {
            return Err(GatewayError::Empty("text"));
        }
        Ok(text)
    }

    async fn generate_image(
        &self,
        prompt: &str,
        maturity: MaturityLevel,
        quality: ImageQuality,
    ) -> Result<MediaBlob, GatewayError> {
        let payload = image_payload(&image_prompt(prompt, maturity), ASPECT_RATIO, quality.as_str());
        let reply = self.generate_content(&self.cfg.image_model, &payload).await?;
        first_image(reply)
    }

    async fn edit_image(
        &self,
        image: &MediaBlob,
        instruction: &str,
    ) -> Result<MediaBlob, GatewayError> {
        let payload = edit_image_payload(image, instruction);
        let reply = self.generate_content(&self.cfg.edit_model, &payload).await?;
        first_image(reply)
    }

    async fn generate_video(
        &self,
        prompt: &str,
        seed_image: Option<&MediaBlob>,
    ) -> Result<MediaBlob, GatewayError> {
        let endpoint = self.endpoint()?;
        let params = VideoParams {
            prompt: video_prompt(prompt),
            aspect_ratio: ASPECT_RATIO,
            resolution: VIDEO_RESOLUTION,
        };
        let req = build_video_request(&endpoint, &self.cfg.video_model, &params, seed_image);
        let resp = self.send(&req, self.cfg.request_timeout).await?;
        let op = parse_video_operation(&resp.body).map_err(GatewayError::from_transport)?;
        log::info!("video operation started: {}", op.name);

        let op = self.poll_video(&endpoint, op).await?;
        if let Some(err) = op.error {
            return Err(classify_operation_error(err.message));
        }

        let Some(uri) = op.video_uri else {
            if !op.filtered_reasons.is_empty() {
                return Err(GatewayError::Blocked {
                    reason: op.filtered_reasons.join("; "),
                });
            }
            return Err(GatewayError::Empty("video"));
        };

        let download = build_download_request(&endpoint, &uri);
        let resp = self.send(&download, self.cfg.media_timeout).await?;
        if resp.body.is_empty() {
            return Err(GatewayError::Empty("video"));
        }
        let mime = resp
            .content_type
            .filter(|c| c.starts_with("video/"))
            .unwrap_or_else(|| "video/mp4".into());
        Ok(MediaBlob::new(mime, resp.body))
    }

    async fn generate_speech(&self, text: &str, tone: Tone) -> Result<SpeechAudio, GatewayError> {
        let payload = speech_payload(&narration_request(text, tone), narration_voice(tone));
        let reply = self.generate_content(&self.cfg.speech_model, &payload).await?;
        let audio = reply
            .first_media()
            .filter(|m| !m.bytes.is_empty())
            .ok_or(GatewayError::Empty("audio"))?;
        Ok(SpeechAudio {
            sample_rate_hz: sample_rate_from_mime(&audio.mime_type),
            pcm_s16le: audio.bytes,
        })
    }

    async fn translate_to_visual_prompt(&self, text: &str, maturity: MaturityLevel) -> String {
        let payload = text_payload(
            Some(VISUAL_PROMPT_SYSTEM),
            &visual_prompt_request(text, maturity),
            None,
        );
        match self.generate_content(&self.cfg.text_model, &payload).await {
            Ok(reply) => reply
                .text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| EMPTY_VISUAL_PROMPT.to_string()),
            Err(e) => {
                log::warn!("visual prompt translation failed, using fallback: {e}");
                FALLBACK_VISUAL_PROMPT.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_401_and_403_are_credential_errors() {
        assert!(matches!(
            classify_http_error(401, b"{}"),
            GatewayError::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_http_error(403, b"nope"),
            GatewayError::InvalidCredential(_)
        ));
    }

    #[test]
    fn entity_not_found_is_a_credential_error() {
        let body = br#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        match classify_http_error(404, body) {
            GatewayError::InvalidCredential(m) => assert!(m.contains("Requested entity")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn invalid_key_400_is_a_credential_error() {
        let body = br#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_http_error(400, body),
            GatewayError::InvalidCredential(_)
        ));
    }

    #[test]
    fn server_errors_keep_status_and_message() {
        let body = br#"{"error":{"code":500,"message":"internal","status":"INTERNAL"}}"#;
        match classify_http_error(500, body) {
            GatewayError::Request { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "internal");
            }
            other => panic!("unexpected: {other:?}"),
        }
        match classify_http_error(502, b"bad gateway") {
            GatewayError::Request { message, .. } => assert_eq!(message, "bad gateway"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn speech_rate_comes_from_mime() {
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=24000"), 24_000);
        assert_eq!(sample_rate_from_mime("audio/L16; rate=16000"), 16_000);
        assert_eq!(sample_rate_from_mime("audio/pcm"), 24_000);
    }

    #[test]
    fn production_config_defaults() {
        let cfg = GatewayConfig::production(Some("k".into()));
        assert_eq!(cfg.poll_interval, Duration::from_secs(8));
        assert_eq!(cfg.max_poll_attempts, 90);
        assert_eq!(cfg.video_model, "veo-3.1-fast-generate-preview");
        assert!(!format!("{cfg:?}").contains("\"k\""));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let gw = GeminiGateway::new(GatewayConfig::production(Some("   ".into())));
        let req = TextRequest {
            context: "x".into(),
            maturity: MaturityLevel::General,
            tone: Tone::Standard,
            dialect: kothakoli_core::Dialect::Bengali,
        };
        assert!(matches!(
            gw.generate_text(&req).await,
            Err(GatewayError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn visual_prompt_falls_back_without_key() {
        let gw = GeminiGateway::new(GatewayConfig::production(None));
        let out = gw
            .translate_to_visual_prompt("নদী", MaturityLevel::General)
            .await;
        assert_eq!(out, FALLBACK_VISUAL_PROMPT);
    }
}

use async_trait::async_trait;
use kothakoli_core::{Dialect, ImageQuality, MaturityLevel, MediaBlob, Tone};

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    // Full prompt (directive plus manuscript). The gateway keeps only the tail.
    pub context: String,
    pub maturity: MaturityLevel,
    pub tone: Tone,
    pub dialect: Dialect,
}

/// Raw synthesized speech: mono signed 16-bit little-endian PCM.
#[derive(Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub pcm_s16le: Vec<u8>,
    pub sample_rate_hz: u32,
}

impl std::fmt::Debug for SpeechAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechAudio")
            .field("bytes", &self.pcm_s16le.len())
            .field("sample_rate_hz", &self.sample_rate_hz)
            .finish()
    }
}

impl SpeechAudio {
    pub fn sample_count(&self) -> usize {
        self.pcm_s16le.len() / 2
    }
}

/// Generative backend used by the studio. One call is one request
/// (video generation polls until done).
#[async_trait]
pub trait StoryAi: Send + Sync {
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GatewayError>;

    async fn generate_image(
        &self,
        prompt: &str,
        maturity: MaturityLevel,
        quality: ImageQuality,
    ) -> Result<MediaBlob, GatewayError>;

    async fn edit_image(
        &self,
        image: &MediaBlob,
        instruction: &str,
    ) -> Result<MediaBlob, GatewayError>;

    async fn generate_video(
        &self,
        prompt: &str,
        seed_image: Option<&MediaBlob>,
    ) -> Result<MediaBlob, GatewayError>;

    async fn generate_speech(&self, text: &str, tone: Tone) -> Result<SpeechAudio, GatewayError>;

    /// Never fails: falls back to a fixed cinematic prompt.
    async fn translate_to_visual_prompt(&self, text: &str, maturity: MaturityLevel) -> String;
}

use anyhow::{Context, anyhow};
use base64::Engine;
use kothakoli_core::MediaBlob;
use serde::Deserialize;

// Finish reasons that mean the model refused rather than failed.
const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// The useful parts of a `generateContent` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateContentReply {
    pub text: Option<String>,
    pub media: Vec<MediaBlob>,
    pub finish_reason: Option<String>,
    pub block_reason: Option<String>,
}

impl GenerateContentReply {
    /// Why the request was refused, if it was.
    pub fn safety_block(&self) -> Option<String> {
        if let Some(reason) = &self.block_reason {
            return Some(reason.clone());
        }
        self.finish_reason
            .as_ref()
            .filter(|r| SAFETY_FINISH_REASONS.contains(&r.as_str()))
            .cloned()
    }

    pub fn first_media(self) -> Option<MediaBlob> {
        self.media.into_iter().next()
    }
}

pub fn parse_generate_content(body: &[u8]) -> anyhow::Result<GenerateContentReply> {
    let resp: GenerateContentResponse =
        serde_json::from_slice(body).context("decode generateContent JSON")?;

    let block_reason = resp.prompt_feedback.and_then(|f| f.block_reason);
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Ok(GenerateContentReply {
            block_reason,
            ..Default::default()
        });
    };

    let mut text = String::new();
    let mut media = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if part.thought {
            continue;
        }
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(inline) = part.inline_data {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .context("decode inline data")?;
            let mime = inline
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".into());
            media.push(MediaBlob::new(mime, bytes));
        }
    }

    Ok(GenerateContentReply {
        text: (!text.trim().is_empty()).then_some(text),
        media,
        finish_reason: candidate.finish_reason,
        block_reason,
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}

pub fn parse_api_error(body: &[u8]) -> Option<ApiError> {
    serde_json::from_slice::<ApiErrorEnvelope>(body)
        .ok()
        .map(|e| e.error)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<ApiError>,
    response: Option<OperationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
    #[serde(default)]
    rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

/// State of a long-running video generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    pub name: String,
    pub done: bool,
    pub video_uri: Option<String>,
    pub error: Option<ApiError>,
    pub filtered_reasons: Vec<String>,
}

pub fn parse_video_operation(body: &[u8]) -> anyhow::Result<VideoOperation> {
    let op: OperationResponse =
        serde_json::from_slice(body).context("decode operation JSON")?;
    let name = op
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| anyhow!("operation has no name"))?;

    let video = op.response.and_then(|r| r.generate_video_response);
    let (video_uri, filtered_reasons) = match video {
        Some(v) => (
            v.generated_samples
                .into_iter()
                .find_map(|s| s.video.and_then(|v| v.uri)),
            v.rai_media_filtered_reasons,
        ),
        None => (None, vec![]),
    };

    Ok(VideoOperation {
        name,
        done: op.done,
        video_uri,
        error: op.error,
        filtered_reasons,
    })
}

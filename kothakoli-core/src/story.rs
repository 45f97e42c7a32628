use crate::types::{AssetId, AssetKind, ImageQuality, MaturityLevel, StoryId, Tone};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const NEW_STORY_TITLE: &str = "নতুন গল্প (New Story)";
pub const VOICE_STORY_TITLE: &str = "ভয়েস গল্প (Voice Story)";
pub const DEFAULT_GENRE: &str = "Drama";
pub const VOICE_GENRE: &str = "Voice";

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryAsset {
    pub id: AssetId,
    pub kind: AssetKind,

    // File path or `data:` URL.
    pub url: String,
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<ImageQuality>,
}

impl StoryAsset {
    pub fn image(url: impl Into<String>, prompt: impl Into<String>, quality: ImageQuality) -> Self {
        Self {
            id: AssetId::new(),
            kind: AssetKind::Image,
            url: url.into(),
            prompt: prompt.into(),
            quality: Some(quality),
        }
    }

    pub fn video(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(),
            kind: AssetKind::Video,
            url: url.into(),
            prompt: prompt.into(),
            quality: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == AssetKind::Image
    }

    /// The same asset pointing at an edited image.
    pub fn edited(&self, url: impl Into<String>, instruction: &str) -> Self {
        Self {
            url: url.into(),
            prompt: format!("{} (Edited: {})", self.prompt, instruction.trim()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub content: String,
    pub genre: String,

    // Fixed at creation.
    pub maturity: MaturityLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,

    pub updated_at: i64,

    // Newest first.
    #[serde(default)]
    pub assets: Vec<StoryAsset>,
}

/// Shallow partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoryPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub genre: Option<String>,
    pub tone: Option<Option<Tone>>,
    pub assets: Option<Vec<StoryAsset>>,
}

impl StoryPatch {
    pub fn title(value: impl Into<String>) -> Self {
        Self {
            title: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn content(value: impl Into<String>) -> Self {
        Self {
            content: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn assets(value: Vec<StoryAsset>) -> Self {
        Self {
            assets: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &StoryPatch::default()
    }
}

impl Story {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        genre: impl Into<String>,
        maturity: MaturityLevel,
        now_ms: i64,
    ) -> Self {
        Self {
            id: StoryId::new(),
            title: title.into(),
            content: content.into(),
            genre: genre.into(),
            maturity,
            tone: None,
            updated_at: now_ms,
            assets: vec![],
        }
    }

    pub fn blank(maturity: MaturityLevel, now_ms: i64) -> Self {
        Self::new(NEW_STORY_TITLE, "", DEFAULT_GENRE, maturity, now_ms)
    }

    pub fn apply(&mut self, patch: StoryPatch, now_ms: i64) {
        let StoryPatch {
            title,
            content,
            genre,
            tone,
            assets,
        } = patch;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = content {
            self.content = content;
        }
        if let Some(genre) = genre {
            self.genre = genre;
        }
        if let Some(tone) = tone {
            self.tone = tone;
        }
        if let Some(assets) = assets {
            self.assets = assets;
        }
        self.touch(now_ms);
    }

    // A wall clock can repeat or step back; the stamp must still move forward.
    fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms.max(self.updated_at.saturating_add(1));
    }

    pub fn tone_or_default(&self) -> Tone {
        self.tone.unwrap_or_default()
    }

    pub fn asset(&self, id: AssetId) -> Option<&StoryAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn first_image(&self) -> Option<&StoryAsset> {
        self.assets.iter().find(|a| a.is_image())
    }

    /// Asset list with `asset` prepended.
    pub fn with_new_asset(&self, asset: StoryAsset) -> Vec<StoryAsset> {
        let mut out = Vec::with_capacity(self.assets.len() + 1);
        out.push(asset);
        out.extend(self.assets.iter().cloned());
        out
    }

    /// Asset list with the asset of the same id replaced.
    pub fn with_replaced_asset(&self, asset: StoryAsset) -> Vec<StoryAsset> {
        self.assets
            .iter()
            .map(|a| if a.id == asset.id { asset.clone() } else { a.clone() })
            .collect()
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Content rating that drives both presentation and the prompts we send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaturityLevel {
    #[default]
    General,
    Mature,
}

impl MaturityLevel {
    pub fn is_mature(self) -> bool {
        self == MaturityLevel::Mature
    }

    pub fn badge(self) -> &'static str {
        match self {
            MaturityLevel::General => "Safe",
            MaturityLevel::Mature => "18+",
        }
    }
}

impl FromStr for MaturityLevel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "safe" => Ok(MaturityLevel::General),
            "mature" | "adult" | "18+" => Ok(MaturityLevel::Mature),
            other => Err(ParseLabelError::new("maturity level", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Standard,
    Romantic,
    Dark,
    Erotic,
    Suspense,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Standard,
        Tone::Romantic,
        Tone::Dark,
        Tone::Erotic,
        Tone::Suspense,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tone::Standard => "Standard",
            Tone::Romantic => "Romantic",
            Tone::Dark => "Dark",
            Tone::Erotic => "Erotic",
            Tone::Suspense => "Suspense",
        }
    }
}

impl FromStr for Tone {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLabelError::new("tone", s))
    }
}

/// Written language variant requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    Bengali,
    Dhaka,
    Chittagong,
    Sylhet,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Bengali,
        Dialect::Dhaka,
        Dialect::Chittagong,
        Dialect::Sylhet,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Dialect::Bengali => "Bengali",
            Dialect::Dhaka => "Dhaka",
            Dialect::Chittagong => "Chittagong",
            Dialect::Sylhet => "Sylhet",
        }
    }

    // How the dialect is named inside model instructions.
    pub fn prompt_name(self) -> &'static str {
        match self {
            Dialect::Bengali => "Standard Bengali",
            Dialect::Dhaka => "the Dhaka dialect of Bengali",
            Dialect::Chittagong => "the Chittagonian dialect of Bengali",
            Dialect::Sylhet => "the Sylheti dialect of Bengali",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Dialect::Bengali => "Standard Bengali (প্রমিত বাংলা)",
            Dialect::Dhaka => "Dhaka Dialect (ঢাকার উপভাষা)",
            Dialect::Chittagong => "Chittagong Dialect (চাটগাঁইয়া)",
            Dialect::Sylhet => "Sylheti Dialect (সিলটী)",
        }
    }
}

impl FromStr for Dialect {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLabelError::new("dialect", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageQuality {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageQuality::OneK => "1K",
            ImageQuality::TwoK => "2K",
            ImageQuality::FourK => "4K",
        }
    }
}

impl FromStr for ImageQuality {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(ImageQuality::OneK),
            "2K" => Ok(ImageQuality::TwoK),
            "4K" => Ok(ImageQuality::FourK),
            other => Err(ParseLabelError::new("image quality", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

/// Raw bytes of a generated image or video plus their mime type.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaBlob {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            m if m.starts_with("video/") => "mp4",
            _ => "png",
        }
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBlob")
            .field("mime_type", &self.mime_type)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: {value}")]
pub struct ParseLabelError {
    pub what: &'static str,
    pub value: String,
}

impl ParseLabelError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.trim().to_string(),
        }
    }
}

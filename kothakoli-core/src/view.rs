use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::ParseLabelError;

/// Which panel is mounted. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Editor,
    Library,
    Settings,
    VoiceStudio,
    MediaLab,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Editor => "editor",
            View::Library => "library",
            View::Settings => "settings",
            View::VoiceStudio => "voice_studio",
            View::MediaLab => "media_lab",
        }
    }

    // Panels that operate on the selected story.
    pub fn needs_active_story(self) -> bool {
        matches!(self, View::Editor | View::MediaLab)
    }
}

impl FromStr for View {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        [
            View::Editor,
            View::Library,
            View::Settings,
            View::VoiceStudio,
            View::MediaLab,
        ]
        .into_iter()
        .find(|v| v.as_str() == key)
        .ok_or(ParseLabelError {
            what: "view",
            value: s.trim().to_string(),
        })
    }
}

use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "kothakoli";
pub const STORIES_FILE: &str = "stories.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const MEDIA_DIR: &str = "media";

/// Everything the studio persists lives under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data dir>/kothakoli`, falling back to the working directory.
    pub fn default_location() -> Self {
        let mut p = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push(APP_DIR_NAME);
        Self::at(p)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stories(&self) -> PathBuf {
        self.root.join(STORIES_FILE)
    }

    pub fn settings(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn media(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }
}

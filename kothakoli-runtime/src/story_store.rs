use std::path::{Path, PathBuf};

use anyhow::Context;
use kothakoli_core::Story;

use crate::files::{read_optional, write_atomic};

/// The whole library as one JSON array, newest first.
#[derive(Debug, Clone)]
pub struct StoryStore {
    path: PathBuf,
}

impl StoryStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Vec<Story>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(vec![]);
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("decode stories: {}", self.path.display()))
    }

    pub fn save(&self, stories: &[Story]) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(stories).context("encode stories JSON")?;
        write_atomic(&self.path, &json)
    }
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use kothakoli_core::AppSettings;

use crate::files::{read_optional, write_atomic};

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Defaults when the file does not exist yet.
    pub fn load(&self) -> anyhow::Result<AppSettings> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(AppSettings::default());
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("decode settings: {}", self.path.display()))
    }

    pub fn save(&self, settings: &AppSettings) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(settings).context("encode settings JSON")?;
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kothakoli_core::{Dialect, ImageQuality, MaturityLevel};

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at_path(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), AppSettings::default());
    }

    #[test]
    fn round_trips_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at_path(dir.path().join("settings.json"));

        let mut s = AppSettings::default();
        s.dialect = Dialect::Chittagong;
        s.set_maturity(MaturityLevel::Mature, true).unwrap();
        s.blur_thumbnails = false;
        s.default_image_quality = ImageQuality::FourK;

        store.save(&s).unwrap();
        assert_eq!(store.load().unwrap(), s);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, br#"{"dialect":"Sylhet"}"#).unwrap();

        let s = SettingsStore::at_path(path).load().unwrap();
        assert_eq!(s.dialect, Dialect::Sylhet);
        assert!(s.blur_thumbnails);
        assert_eq!(s.effective_maturity(), MaturityLevel::General);
    }
}

//! Generated images, clips and narration stored as files under `media/`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, anyhow};
use base64::Engine;
use kothakoli_core::MediaBlob;

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn at_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the blob as `<stem>.<ext>` and returns the path used as asset url.
    pub fn save(&self, stem: &str, blob: &MediaBlob) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create media dir: {}", self.dir.display()))?;
        let path = self.dir.join(format!("{stem}.{}", blob.file_extension()));
        fs::write(&path, &blob.bytes)
            .with_context(|| format!("write media: {}", path.display()))?;
        Ok(path)
    }

    /// Narration is kept as a playable mono 16-bit WAV.
    pub fn save_wav(&self, stem: &str, pcm_s16le: &[u8], sample_rate_hz: u32) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create media dir: {}", self.dir.display()))?;
        let path = self.dir.join(format!("{stem}.wav"));

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: sample_rate_hz,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("create wav: {}", path.display()))?;
        for b in pcm_s16le.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([b[0], b[1]]))
                .context("write wav sample")?;
        }
        writer.finalize().context("finalize wav")?;
        Ok(path)
    }

    /// Reads an asset url: a `data:` URL or a file path.
    pub fn load(&self, url: &str) -> anyhow::Result<MediaBlob> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        let path = Path::new(url);
        let bytes = fs::read(path).with_context(|| format!("read media: {}", path.display()))?;
        Ok(MediaBlob::new(mime_from_path(path), bytes))
    }

    /// Removes a file this store wrote. Urls outside the media dir are left alone.
    pub fn remove(&self, url: &str) -> anyhow::Result<()> {
        let path = Path::new(url);
        if !self.owns(path) {
            log::debug!("not removing {}: outside the media dir", path.display());
            return Ok(());
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("remove {}", path.display()))),
        }
    }

    // `starts_with` is component-wise only, so `..` must be ruled out separately.
    fn owns(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.dir) {
            Ok(rest) => {
                rest.components().next().is_some()
                    && rest.components().all(|c| matches!(c, Component::Normal(_)))
            }
            Err(_) => false,
        }
    }
}

pub fn decode_data_url(url: &str) -> anyhow::Result<MediaBlob> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("not a data url"))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data url has no payload"))?;
    let mime = meta.strip_suffix(";base64").ok_or_else(|| anyhow!("data url is not base64"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .context("decode data url")?;
    let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
    Ok(MediaBlob::new(mime, bytes))
}

fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_and_loads_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::at_dir(dir.path().join("media"));
        let blob = MediaBlob::new("image/png", vec![1, 2, 3]);

        let path = store.save("asset-1", &blob).unwrap();
        assert_eq!(path.extension().unwrap(), "png");

        let loaded = store.load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, blob);
    }

    #[test]
    fn loads_data_urls() {
        let store = MediaStore::at_dir("/nonexistent");
        let blob = store.load("data:image/png;base64,AQID").unwrap();
        assert_eq!(blob, MediaBlob::new("image/png", vec![1, 2, 3]));
        assert!(store.load("data:image/png,AQID").is_err());
        assert!(store.load("data:image/png;base64").is_err());
    }

    #[test]
    fn writes_wav_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::at_dir(dir.path());
        let path = store.save_wav("n", &[0, 0, 0xff, 0x7f], 24_000).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, i16::MAX]);
    }

    #[test]
    fn remove_ignores_foreign_paths() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.png");
        fs::write(&outside, b"x").unwrap();

        let store = MediaStore::at_dir(dir.path().join("media"));
        store.remove(outside.to_str().unwrap()).unwrap();
        assert!(outside.exists());

        let saved = store.save("gone", &MediaBlob::new("image/png", vec![1])).unwrap();
        store.remove(saved.to_str().unwrap()).unwrap();
        assert!(!saved.exists());
    }

    #[test]
    fn remove_refuses_to_climb_out_of_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stories = dir.path().join("stories.json");
        fs::write(&stories, b"[]").unwrap();
        let store = MediaStore::at_dir(dir.path().join("media"));
        store.save("a", &MediaBlob::new("image/png", vec![1])).unwrap();

        let sneaky = dir.path().join("media").join("..").join("stories.json");
        store.remove(sneaky.to_str().unwrap()).unwrap();
        assert!(stories.exists());

        store.remove(dir.path().join("media").to_str().unwrap()).unwrap();
        assert!(store.dir().exists());
    }
}

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use kothakoli_core::prompts::{animation_asset_prompt, animation_prompt, continuation_request};
use kothakoli_core::text::{sanitize_file_stem, title_from_path};
use kothakoli_core::{
    AppSettings, AssetId, Dialect, ImageQuality, LibraryCard, LibraryError, MaturityLevel,
    DEFAULT_GENRE, NEW_STORY_TITLE, Story, StoryAsset, StoryId, StoryLibrary, StoryPatch, View,
    now_unix_ms,
};
use kothakoli_engine::{StoryAi, TextRequest};
use kothakoli_runtime::debounce::{DEFAULT_DEBOUNCE, DebouncedWriter};
use kothakoli_runtime::files::write_atomic;
use kothakoli_runtime::media::MediaStore;
use kothakoli_runtime::paths::DataPaths;
use kothakoli_runtime::settings_store::SettingsStore;
use kothakoli_runtime::story_store::StoryStore;
use tokio::sync::oneshot;

use crate::busy::{BusyFlags, Panel};
use crate::error::StudioError;

#[derive(Debug, Default)]
struct StudioState {
    library: StoryLibrary,
    settings: AppSettings,
    view: View,
}

/// The studio's single writer. Clones share state.
#[derive(Clone)]
pub struct StudioService {
    state: Arc<Mutex<StudioState>>,
    ai: Arc<dyn StoryAi>,
    persist: DebouncedWriter<Vec<Story>>,
    settings_store: SettingsStore,
    media: MediaStore,
    busy: BusyFlags,
    pub(crate) voice_stop: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl StudioService {
    /// Loads stories and settings from `paths`. Must be called inside a tokio runtime.
    pub fn open(paths: &DataPaths, ai: Arc<dyn StoryAi>) -> Result<Self, StudioError> {
        Self::open_with(paths, ai, DEFAULT_DEBOUNCE)
    }

    pub fn open_with(
        paths: &DataPaths,
        ai: Arc<dyn StoryAi>,
        debounce: Duration,
    ) -> Result<Self, StudioError> {
        let story_store = StoryStore::at_path(paths.stories());
        let stories = story_store.load()?;

        let settings_store = SettingsStore::at_path(paths.settings());
        let settings = match settings_store.load() {
            Ok(s) => s,
            Err(e) => {
                log::warn!("settings unreadable, using defaults: {e:#}");
                AppSettings::default()
            }
        };

        log::info!(
            "studio opened at {} ({} stories)",
            paths.root().display(),
            stories.len()
        );

        let persist = DebouncedWriter::spawn(debounce, move |stories: &Vec<Story>| {
            story_store.save(stories)
        });

        Ok(Self {
            state: Arc::new(Mutex::new(StudioState {
                library: StoryLibrary::from_stories(stories),
                settings,
                view: View::default(),
            })),
            ai,
            persist,
            settings_store,
            media: MediaStore::at_dir(paths.media()),
            busy: BusyFlags::default(),
            voice_stop: Arc::new(Mutex::new(None)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StudioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_save(&self, state: &StudioState) {
        self.persist.schedule(state.library.list().to_vec());
    }

    // ---- reads ----

    pub fn stories(&self) -> Vec<Story> {
        self.lock().library.list().to_vec()
    }

    pub fn story(&self, id: StoryId) -> Option<Story> {
        self.lock().library.get(id).cloned()
    }

    pub fn active_story(&self) -> Option<Story> {
        self.lock().library.active().cloned()
    }

    pub fn view(&self) -> View {
        self.lock().view
    }

    pub fn settings(&self) -> AppSettings {
        self.lock().settings.clone()
    }

    pub fn library_cards(&self) -> Vec<LibraryCard> {
        let state = self.lock();
        state.library.cards(state.settings.blur_thumbnails)
    }

    pub fn is_busy(&self, panel: Panel) -> bool {
        self.busy.is_busy(panel)
    }

    pub fn media_store(&self) -> &MediaStore {
        &self.media
    }

    pub(crate) fn busy(&self) -> &BusyFlags {
        &self.busy
    }

    // ---- story store ----

    pub fn new_story(&self) -> StoryId {
        let mut state = self.lock();
        let maturity = state.settings.effective_maturity();
        let id = state.library.create(Story::blank(maturity, now_unix_ms()));
        state.view = View::Editor;
        self.schedule_save(&state);
        log::info!("created story {id}");
        id
    }

    /// File stem becomes the title, the file's text the body.
    pub fn import_story(&self, path: &Path) -> Result<StoryId, StudioError> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read story file: {}", path.display()))?;
        let title = title_from_path(path).unwrap_or_else(|| NEW_STORY_TITLE.to_string());

        let mut state = self.lock();
        let maturity = state.settings.effective_maturity();
        let id = state.library.create(Story::new(
            title,
            content,
            DEFAULT_GENRE,
            maturity,
            now_unix_ms(),
        ));
        state.view = View::Editor;
        self.schedule_save(&state);
        log::info!("imported {} as story {id}", path.display());
        Ok(id)
    }

    /// Writes `<title>.txt` into `dir` and returns its path.
    pub fn export_story(&self, id: StoryId, dir: &Path) -> Result<PathBuf, StudioError> {
        let story = self.story(id).ok_or(LibraryError::StoryNotFound(id))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create export dir: {}", dir.display()))?;
        let path = dir.join(format!("{}.txt", sanitize_file_stem(&story.title)));
        write_atomic(&path, story.content.as_bytes())?;
        Ok(path)
    }

    pub fn update_story(&self, id: StoryId, patch: StoryPatch) -> Result<Story, StudioError> {
        let mut state = self.lock();
        let story = state.library.update(id, patch, now_unix_ms())?.clone();
        self.schedule_save(&state);
        Ok(story)
    }

    /// Removes the story and any media files it owned.
    pub fn delete_story(&self, id: StoryId) -> Result<Story, StudioError> {
        let removed = {
            let mut state = self.lock();
            let removed = state.library.delete(id)?;
            self.schedule_save(&state);
            removed
        };

        for asset in &removed.assets {
            if let Err(e) = self.media.remove(&asset.url) {
                log::warn!("failed to remove media for deleted story {id}: {e:#}");
            }
        }
        log::info!("deleted story {id}");
        Ok(removed)
    }

    pub fn select_story(&self, id: StoryId) -> Result<(), StudioError> {
        let mut state = self.lock();
        state.library.select(id)?;
        state.view = View::Editor;
        Ok(())
    }

    pub fn navigate(&self, view: View) -> Result<(), StudioError> {
        let previous = {
            let mut state = self.lock();
            if view.needs_active_story() && state.library.active().is_none() {
                return Err(LibraryError::NoActiveStory.into());
            }
            std::mem::replace(&mut state.view, view)
        };

        if previous == View::VoiceStudio && view != View::VoiceStudio {
            self.stop_voice();
        }
        Ok(())
    }

    /// Appends to the active story or starts a voice story. Blank transcripts are ignored.
    pub fn apply_voice_transcript(&self, transcript: &str) -> Option<StoryId> {
        if transcript.trim().is_empty() {
            return None;
        }
        let mut state = self.lock();
        let maturity = state.settings.effective_maturity();
        let id = state
            .library
            .apply_voice_transcript(transcript, maturity, now_unix_ms());
        state.view = View::Editor;
        self.schedule_save(&state);
        Some(id)
    }

    /// Writes the pending story snapshot now.
    pub async fn flush(&self) -> Result<(), StudioError> {
        self.persist.flush().await?;
        Ok(())
    }

    // ---- settings (saved on every change) ----

    fn change_settings<F>(&self, f: F) -> Result<AppSettings, StudioError>
    where
        F: FnOnce(&mut AppSettings) -> Result<(), StudioError>,
    {
        let mut state = self.lock();
        let mut next = state.settings.clone();
        f(&mut next)?;
        self.settings_store.save(&next)?;
        state.settings = next.clone();
        Ok(next)
    }

    pub fn set_dialect(&self, dialect: Dialect) -> Result<AppSettings, StudioError> {
        self.change_settings(|s| {
            s.dialect = dialect;
            Ok(())
        })
    }

    pub fn set_maturity(
        &self,
        level: MaturityLevel,
        confirm_adult: bool,
    ) -> Result<AppSettings, StudioError> {
        self.change_settings(|s| Ok(s.set_maturity(level, confirm_adult)?))
    }

    pub fn set_blur_thumbnails(&self, blur: bool) -> Result<AppSettings, StudioError> {
        self.change_settings(|s| {
            s.blur_thumbnails = blur;
            Ok(())
        })
    }

    pub fn set_default_image_quality(
        &self,
        quality: ImageQuality,
    ) -> Result<AppSettings, StudioError> {
        self.change_settings(|s| {
            s.default_image_quality = quality;
            Ok(())
        })
    }

    pub fn set_dark_theme(&self, dark: bool) -> Result<AppSettings, StudioError> {
        self.change_settings(|s| {
            s.dark_theme = dark;
            Ok(())
        })
    }

    // ---- generation ----

    fn active_snapshot(&self) -> Result<(Story, AppSettings), StudioError> {
        let state = self.lock();
        let story = state.library.require_active()?.clone();
        Ok((story, state.settings.clone()))
    }

    /// Asks the model to continue the active story and appends the result.
    pub async fn continue_story(&self, directive: &str) -> Result<Story, StudioError> {
        if directive.trim().is_empty() {
            return Err(StudioError::EmptyInput("directive"));
        }
        let _guard = self.busy.try_acquire(Panel::Editor)?;
        let (story, settings) = self.active_snapshot()?;

        let req = TextRequest {
            context: continuation_request(directive, &story.content),
            maturity: generation_maturity(&story, &settings),
            tone: story.tone_or_default(),
            dialect: settings.dialect,
        };
        let generated = self.ai.generate_text(&req).await?;

        // The story may have been edited while the request was out.
        let mut state = self.lock();
        let latest = state
            .library
            .get(story.id)
            .ok_or(LibraryError::StoryNotFound(story.id))?;
        let content = format!("{}\n\n{}", latest.content, generated);
        let updated = state
            .library
            .update(story.id, StoryPatch::content(content), now_unix_ms())?
            .clone();
        self.schedule_save(&state);
        Ok(updated)
    }

    /// Illustrates the active story. Without a prompt the story text is turned
    /// into one first.
    pub async fn illustrate(
        &self,
        prompt: Option<&str>,
        quality: Option<ImageQuality>,
    ) -> Result<StoryAsset, StudioError> {
        let _guard = self.busy.try_acquire(Panel::MediaLab)?;
        let (story, settings) = self.active_snapshot()?;
        let maturity = generation_maturity(&story, &settings);
        let quality = quality.unwrap_or(settings.default_image_quality);

        let prompt = match prompt.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => {
                self.ai
                    .translate_to_visual_prompt(&story.content, maturity)
                    .await
            }
        };

        let image = self.ai.generate_image(&prompt, maturity, quality).await?;
        let mut asset = StoryAsset::image(String::new(), prompt, quality);
        asset.url = self.save_media(&asset.id.to_string(), &image)?;
        self.prepend_asset(story.id, asset)
    }

    /// Edits an image asset in place: new file, same id, annotated prompt.
    pub async fn edit_asset(
        &self,
        asset_id: AssetId,
        instruction: &str,
    ) -> Result<StoryAsset, StudioError> {
        if instruction.trim().is_empty() {
            return Err(StudioError::EmptyInput("edit instruction"));
        }
        let _guard = self.busy.try_acquire(Panel::MediaLab)?;
        let (story, _) = self.active_snapshot()?;
        let asset = self.lock().library.image_asset(story.id, asset_id)?.clone();

        let source = self.media.load(&asset.url)?;
        let edited = self.ai.edit_image(&source, instruction.trim()).await?;
        let url = self.save_media(&format!("{asset_id}-{}", now_unix_ms()), &edited)?;
        let replaced = asset.edited(url, instruction.trim());

        let mut state = self.lock();
        let latest = state
            .library
            .get(story.id)
            .ok_or(LibraryError::StoryNotFound(story.id))?;
        if latest.asset(asset_id).is_none() {
            return Err(LibraryError::AssetNotFound(asset_id).into());
        }
        let assets = latest.with_replaced_asset(replaced.clone());
        // Old image goes once the story points at the new one.
        state
            .library
            .update(story.id, StoryPatch::assets(assets), now_unix_ms())?;
        self.schedule_save(&state);
        drop(state);

        if let Err(e) = self.media.remove(&asset.url) {
            log::warn!("failed to remove replaced image {}: {e:#}", asset.url);
        }
        Ok(replaced)
    }

    /// Turns an image asset into a short clip seeded by that image.
    pub async fn animate_asset(&self, asset_id: AssetId) -> Result<StoryAsset, StudioError> {
        let _guard = self.busy.try_acquire(Panel::MediaLab)?;
        let (story, _) = self.active_snapshot()?;
        let asset = self.lock().library.image_asset(story.id, asset_id)?.clone();

        let seed = self.media.load(&asset.url)?;
        let clip = self
            .ai
            .generate_video(&animation_prompt(&asset.prompt), Some(&seed))
            .await?;

        let mut video = StoryAsset::video(String::new(), animation_asset_prompt(&asset.prompt));
        video.url = self.save_media(&video.id.to_string(), &clip)?;
        self.prepend_asset(story.id, video)
    }

    /// Narrates `text` (default: the whole active story) and returns the WAV path.
    pub async fn narrate(&self, text: Option<&str>) -> Result<PathBuf, StudioError> {
        let _guard = self.busy.try_acquire(Panel::Narration)?;
        let (story, _) = self.active_snapshot()?;
        let text = text.unwrap_or(story.content.as_str());
        if text.trim().is_empty() {
            return Err(StudioError::EmptyInput("narration text"));
        }

        let speech = self
            .ai
            .generate_speech(text, story.tone_or_default())
            .await?;
        let stem = format!("{}-narration-{}", story.id, now_unix_ms());
        let path = self
            .media
            .save_wav(&stem, &speech.pcm_s16le, speech.sample_rate_hz)?;
        log::info!(
            "narration saved: {} ({} samples)",
            path.display(),
            speech.sample_count()
        );
        Ok(path)
    }

    fn save_media(&self, stem: &str, blob: &kothakoli_core::MediaBlob) -> Result<String, StudioError> {
        let path = self.media.save(stem, blob)?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn prepend_asset(&self, story_id: StoryId, asset: StoryAsset) -> Result<StoryAsset, StudioError> {
        let mut state = self.lock();
        let assets = state
            .library
            .get(story_id)
            .map(|s| s.with_new_asset(asset.clone()));
        let Some(assets) = assets else {
            drop(state);
            // Story went away mid-generation; do not leak the file.
            if let Err(e) = self.media.remove(&asset.url) {
                log::warn!("failed to remove orphaned media {}: {e:#}", asset.url);
            }
            return Err(LibraryError::StoryNotFound(story_id).into());
        };
        state
            .library
            .update(story_id, StoryPatch::assets(assets), now_unix_ms())?;
        self.schedule_save(&state);
        Ok(asset)
    }
}

/// Mature content is requested only when the story and the current settings both allow it.
pub fn generation_maturity(story: &Story, settings: &AppSettings) -> MaturityLevel {
    if story.maturity.is_mature() && settings.effective_maturity().is_mature() {
        MaturityLevel::Mature
    } else {
        MaturityLevel::General
    }
}

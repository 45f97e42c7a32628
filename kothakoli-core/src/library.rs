use crate::story::{Story, StoryAsset, StoryPatch, VOICE_GENRE, VOICE_STORY_TITLE};
use crate::text::excerpt;
use crate::types::{AssetId, MaturityLevel, StoryId};
use serde::Serialize;
use thiserror::Error;

const CARD_EXCERPT_CHARS: usize = 160;
const EMPTY_EXCERPT: &str = "গল্পের কোনো বিষয়বস্তু নেই...";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("story not found: {0}")]
    StoryNotFound(StoryId),

    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("asset is not an image: {0}")]
    NotAnImage(AssetId),

    #[error("no story selected")]
    NoActiveStory,
}

/// In-memory story list plus the current selection.
///
/// Single writer; the newest story is kept at the front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryLibrary {
    stories: Vec<Story>,
    active: Option<StoryId>,
}

impl StoryLibrary {
    pub fn from_stories(stories: Vec<Story>) -> Self {
        Self {
            stories,
            active: None,
        }
    }

    pub fn list(&self) -> &[Story] {
        &self.stories
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get(&self, id: StoryId) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }

    pub fn active_id(&self) -> Option<StoryId> {
        self.active
    }

    pub fn active(&self) -> Option<&Story> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn require_active(&self) -> Result<&Story, LibraryError> {
        self.active().ok_or(LibraryError::NoActiveStory)
    }

    pub fn select(&mut self, id: StoryId) -> Result<(), LibraryError> {
        if self.get(id).is_none() {
            return Err(LibraryError::StoryNotFound(id));
        }
        self.active = Some(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    /// Prepends the story and makes it active.
    pub fn create(&mut self, story: Story) -> StoryId {
        let id = story.id;
        self.stories.insert(0, story);
        self.active = Some(id);
        id
    }

    pub fn update(
        &mut self,
        id: StoryId,
        patch: StoryPatch,
        now_ms: i64,
    ) -> Result<&Story, LibraryError> {
        let story = self
            .stories
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(LibraryError::StoryNotFound(id))?;
        story.apply(patch, now_ms);
        Ok(story)
    }

    pub fn delete(&mut self, id: StoryId) -> Result<Story, LibraryError> {
        let idx = self
            .stories
            .iter()
            .position(|s| s.id == id)
            .ok_or(LibraryError::StoryNotFound(id))?;
        let removed = self.stories.remove(idx);
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(removed)
    }

    pub fn image_asset(&self, id: StoryId, asset_id: AssetId) -> Result<&StoryAsset, LibraryError> {
        let story = self.get(id).ok_or(LibraryError::StoryNotFound(id))?;
        let asset = story
            .asset(asset_id)
            .ok_or(LibraryError::AssetNotFound(asset_id))?;
        if !asset.is_image() {
            return Err(LibraryError::NotAnImage(asset_id));
        }
        Ok(asset)
    }

    /// Appends a finished voice transcript to the active story, or starts a new
    /// voice story when nothing is selected. Returns the story that received it.
    pub fn apply_voice_transcript(
        &mut self,
        transcript: &str,
        maturity: MaturityLevel,
        now_ms: i64,
    ) -> StoryId {
        if let Some(active) = self.active() {
            let id = active.id;
            let content = format!("{}\n{}", active.content, transcript);
            if self.update(id, StoryPatch::content(content), now_ms).is_ok() {
                return id;
            }
        }

        self.create(Story::new(
            VOICE_STORY_TITLE,
            transcript,
            VOICE_GENRE,
            maturity,
            now_ms,
        ))
    }

    pub fn cards(&self, blur_mature_thumbnails: bool) -> Vec<LibraryCard> {
        self.stories
            .iter()
            .map(|s| LibraryCard::from_story(s, blur_mature_thumbnails))
            .collect()
    }
}

/// What the library grid shows for one story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryCard {
    pub id: StoryId,
    pub title: String,
    pub excerpt: String,
    pub badge: &'static str,
    pub maturity: MaturityLevel,
    pub updated_at: i64,
    pub asset_count: usize,
    pub thumbnail: Option<String>,
    pub blur_thumbnail: bool,
}

impl LibraryCard {
    fn from_story(story: &Story, blur_mature_thumbnails: bool) -> Self {
        let excerpt = if story.content.trim().is_empty() {
            EMPTY_EXCERPT.to_string()
        } else {
            excerpt(&story.content, CARD_EXCERPT_CHARS)
        };
        let thumbnail = story.first_image().map(|a| a.url.clone());

        Self {
            id: story.id,
            title: story.title.clone(),
            excerpt,
            badge: story.maturity.badge(),
            maturity: story.maturity,
            updated_at: story.updated_at,
            asset_count: story.assets.len(),
            blur_thumbnail: thumbnail.is_some()
                && blur_mature_thumbnails
                && story.maturity.is_mature(),
            thumbnail,
        }
    }
}

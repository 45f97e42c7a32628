pub mod debounce;
pub mod files;
pub mod media;
pub mod paths;
pub mod secrets;
pub mod settings_store;
pub mod story_store;

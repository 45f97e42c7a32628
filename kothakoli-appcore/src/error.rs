use kothakoli_core::{LibraryError, SettingsError};
use kothakoli_engine::GatewayError;
use thiserror::Error;

use crate::busy::Panel;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0:?} is already generating")]
    Busy(Panel),

    #[error("{0} is empty")]
    EmptyInput(&'static str),

    #[error("voice session: {0}")]
    Voice(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl StudioError {
    /// What the UI should show. Gateway failures get their localized text.
    pub fn user_message(&self) -> String {
        match self {
            StudioError::Gateway(e) => e.user_message(),
            StudioError::Busy(_) => {
                "অনুগ্রহ করে অপেক্ষা করুন... (Please wait for the current generation.)".into()
            }
            other => other.to_string(),
        }
    }
}

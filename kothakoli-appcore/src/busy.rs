use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::StudioError;

/// Panels that run at most one generation at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Editor,
    MediaLab,
    Narration,
    VoiceStudio,
}

#[derive(Debug, Clone, Default)]
pub struct BusyFlags {
    inner: Arc<Mutex<HashSet<Panel>>>,
}

impl BusyFlags {
    pub fn try_acquire(&self, panel: Panel) -> Result<BusyGuard, StudioError> {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(panel) {
            return Err(StudioError::Busy(panel));
        }
        Ok(BusyGuard {
            flags: self.clone(),
            panel,
        })
    }

    pub fn is_busy(&self, panel: Panel) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&panel)
    }
}

/// Clears the panel's flag when dropped, including when the task is cancelled.
#[derive(Debug)]
pub struct BusyGuard {
    flags: BusyFlags,
    panel: Panel,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flags
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.panel);
    }
}

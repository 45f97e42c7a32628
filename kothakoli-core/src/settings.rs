use crate::types::{Dialect, ImageQuality, MaturityLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("adult content requires confirming you are 18 or older")]
    AdultConfirmationRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub dialect: Dialect,
    pub maturity_level: MaturityLevel,
    pub adult_confirmed: bool,
    pub blur_thumbnails: bool,
    pub default_image_quality: ImageQuality,
    pub dark_theme: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Bengali,
            maturity_level: MaturityLevel::General,
            adult_confirmed: false,
            blur_thumbnails: true,
            default_image_quality: ImageQuality::OneK,
            dark_theme: false,
        }
    }
}

impl AppSettings {
    /// Mature only counts once the user has confirmed their age.
    pub fn effective_maturity(&self) -> MaturityLevel {
        if self.maturity_level.is_mature() && self.adult_confirmed {
            MaturityLevel::Mature
        } else {
            MaturityLevel::General
        }
    }

    pub fn set_maturity(
        &mut self,
        level: MaturityLevel,
        confirm_adult: bool,
    ) -> Result<(), SettingsError> {
        if level.is_mature() {
            if !(confirm_adult || self.adult_confirmed) {
                return Err(SettingsError::AdultConfirmationRequired);
            }
            self.adult_confirmed = true;
        }
        self.maturity_level = level;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mature_requires_confirmation() {
        let mut s = AppSettings::default();
        assert_eq!(
            s.set_maturity(MaturityLevel::Mature, false),
            Err(SettingsError::AdultConfirmationRequired)
        );
        assert_eq!(s.maturity_level, MaturityLevel::General);

        s.set_maturity(MaturityLevel::Mature, true).unwrap();
        assert_eq!(s.effective_maturity(), MaturityLevel::Mature);

        // Confirmation sticks once given.
        s.set_maturity(MaturityLevel::General, false).unwrap();
        s.set_maturity(MaturityLevel::Mature, false).unwrap();
        assert_eq!(s.effective_maturity(), MaturityLevel::Mature);
    }

    #[test]
    fn unconfirmed_mature_level_is_treated_as_general() {
        let s = AppSettings {
            maturity_level: MaturityLevel::Mature,
            adult_confirmed: false,
            ..Default::default()
        };
        assert_eq!(s.effective_maturity(), MaturityLevel::General);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let s: AppSettings = serde_json::from_str(r#"{"dialect":"Sylhet"}"#).unwrap();
        assert_eq!(s.dialect, Dialect::Sylhet);
        assert!(s.blur_thumbnails);
        assert_eq!(s.default_image_quality, ImageQuality::OneK);
    }
}

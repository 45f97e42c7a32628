use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The user has to (re)select an API key.
    Credential,
    /// The model refused the content.
    Safety,
    /// Anything else. Reported once and abandoned.
    Transient,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("API key is missing")]
    MissingCredential,

    #[error("API key was rejected: {0}")]
    InvalidCredential(String),

    #[error("request was blocked by safety filters: {reason}")]
    Blocked { reason: String },

    #[error("request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Request { status: Option<u16>, message: String },

    #[error("model returned no {0}")]
    Empty(&'static str),

    #[error("video generation did not finish after {attempts} polls")]
    Timeout { attempts: u32 },
}

impl GatewayError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            status: None,
            message: message.into(),
        }
    }

    pub(crate) fn from_transport(err: anyhow::Error) -> Self {
        Self::request(format!("{err:#}"))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingCredential | Self::InvalidCredential(_) => ErrorCategory::Credential,
            Self::Blocked { .. } => ErrorCategory::Safety,
            Self::Request { .. } | Self::Empty(_) | Self::Timeout { .. } => {
                ErrorCategory::Transient
            }
        }
    }

    /// Message shown to the writer, Bengali first.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Credential => {
                "API কী পাওয়া যায়নি বা বৈধ নয়। সেটিংসে একটি বৈধ কী নির্বাচন করুন। \
                 (Please select a valid API key in settings.)"
                    .to_string()
            }
            ErrorCategory::Safety => {
                "নিরাপত্তা নীতির কারণে এই অনুরোধটি প্রত্যাখ্যাত হয়েছে। \
                 (The request was blocked by the safety filters. Try rephrasing.)"
                    .to_string()
            }
            ErrorCategory::Transient => match self {
                Self::Timeout { .. } => "ভিডিও তৈরি করতে অনেক সময় লাগছে। পরে আবার চেষ্টা করুন। \
                     (Video generation timed out. Please try again later.)"
                    .to_string(),
                _ => "AI তৈরি ব্যর্থ হয়েছে। আপনার সংযোগ পরীক্ষা করুন। \
                      (AI generation failed. Please check your connection.)"
                    .to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            GatewayError::MissingCredential.category(),
            ErrorCategory::Credential
        );
        assert_eq!(
            GatewayError::InvalidCredential("x".into()).category(),
            ErrorCategory::Credential
        );
        assert_eq!(
            GatewayError::Blocked {
                reason: "SAFETY".into()
            }
            .category(),
            ErrorCategory::Safety
        );
        assert_eq!(GatewayError::Empty("text").category(), ErrorCategory::Transient);
        assert_eq!(
            GatewayError::Timeout { attempts: 3 }.category(),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn display_includes_status_when_known() {
        let e = GatewayError::Request {
            status: Some(500),
            message: "boom".into(),
        };
        assert_eq!(e.to_string(), "request failed (HTTP 500): boom");
        assert_eq!(GatewayError::request("x").to_string(), "request failed: x");
    }

    #[test]
    fn user_messages_are_bilingual() {
        let msg = GatewayError::MissingCredential.user_message();
        assert!(msg.contains("API কী"));
        assert!(msg.contains("valid API key"));
        assert!(
            GatewayError::Timeout { attempts: 1 }
                .user_message()
                .contains("timed out")
        );
    }
}

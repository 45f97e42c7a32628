pub mod error;
pub mod gateway;
pub mod traits;
pub mod transcript;
pub mod voice;

pub use error::{ErrorCategory, GatewayError};
pub use gateway::{GatewayConfig, GeminiGateway};
pub use traits::{SpeechAudio, StoryAi, TextRequest};

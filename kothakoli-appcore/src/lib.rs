pub mod busy;
pub mod error;
pub mod service;
pub mod voice;

pub use busy::{BusyFlags, BusyGuard, Panel};
pub use error::StudioError;
pub use service::StudioService;
pub use service::generation_maturity;
pub use voice::VoiceOutcome;

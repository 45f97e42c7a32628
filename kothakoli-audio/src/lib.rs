pub mod frames;
pub mod mixer;
pub mod pcm;
pub mod resample;
pub mod scheduler;

#[cfg(any(windows, target_os = "macos"))]
pub mod device;

pub use frames::{CAPTURE_FRAME_SAMPLES, FrameChunker};
pub use mixer::{AudioOutput, HeadlessClock, Mixer, SharedMixer};
pub use scheduler::{PlaybackScheduler, ScheduledSource, SourceId};

#[cfg(any(windows, target_os = "macos"))]
pub use device::{AudioDeviceError, MicCapture, SpeakerOutput};

pub const CAPTURE_SAMPLE_RATE_HZ: u32 = 16_000;
pub const PLAYBACK_SAMPLE_RATE_HZ: u32 = 24_000;

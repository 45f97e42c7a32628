//! Live voice co-writer session state: transcript accumulation and gapless
//! playback of the model's speech. Socket and capture plumbing live in the
//! caller; this type only reacts to [`LiveEvent`]s.

use kothakoli_audio::pcm::{decode_pcm16_le, duration_secs};
use kothakoli_audio::resample::StreamResampler;
use kothakoli_audio::{AudioOutput, PlaybackScheduler};
use kothakoli_providers::gemini_live::LiveEvent;
use serde::Serialize;
use thiserror::Error;

use crate::transcript::TranscriptAccumulator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum VoiceState {
    Idle,
    Connecting,
    Active,
    Closed,
    Error(String),
}

impl VoiceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Error(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("cannot {action} while {from:?}")]
    InvalidTransition { from: VoiceState, action: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceUpdate {
    /// A model turn finished; carries the `"AI: ..."` line.
    Utterance(String),
    State(VoiceState),
    Warning(String),
}

pub struct VoiceSession<O: AudioOutput> {
    state: VoiceState,
    transcript: TranscriptAccumulator,
    scheduler: PlaybackScheduler,
    output: O,
    // Speech of the current model turn.
    speech: Option<StreamResampler>,
}

impl<O: AudioOutput> VoiceSession<O> {
    pub fn new(output: O) -> Self {
        Self {
            state: VoiceState::Idle,
            transcript: TranscriptAccumulator::new(),
            scheduler: PlaybackScheduler::new(),
            output,
            speech: None,
        }
    }

    pub fn state(&self) -> &VoiceState {
        &self.state
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn utterances(&self) -> &[String] {
        self.transcript.utterances()
    }

    pub fn scheduled_sources(&self) -> usize {
        self.scheduler.active_count()
    }

    pub fn next_start_time(&self) -> f64 {
        self.scheduler.next_start_time()
    }

    pub fn begin_connect(&mut self) -> Result<(), VoiceError> {
        if self.state != VoiceState::Idle {
            return Err(VoiceError::InvalidTransition {
                from: self.state.clone(),
                action: "connect",
            });
        }
        self.set_state(VoiceState::Connecting);
        Ok(())
    }

    pub fn connected(&mut self) -> Result<(), VoiceError> {
        if self.state != VoiceState::Connecting {
            return Err(VoiceError::InvalidTransition {
                from: self.state.clone(),
                action: "activate",
            });
        }
        self.set_state(VoiceState::Active);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("voice session failed: {message}");
        self.stop_playback();
        self.set_state(VoiceState::Error(message));
    }

    /// PCM for one capture frame, or `None` when audio should not be sent.
    pub fn encode_frame(&self, frame: &[f32]) -> Option<Vec<u8>> {
        if self.state != VoiceState::Active {
            return None;
        }
        Some(kothakoli_audio::pcm::encode_pcm16_le(frame))
    }

    pub fn handle_event(&mut self, event: LiveEvent) -> Option<VoiceUpdate> {
        self.reap_finished();
        match event {
            LiveEvent::SetupComplete => {
                log::info!("live session setup complete");
                None
            }
            LiveEvent::Transcript { text } => {
                self.transcript.push_fragment(&text);
                None
            }
            LiveEvent::Audio {
                pcm_s16le,
                sample_rate_hz,
            } => {
                if self.state.is_terminal() {
                    return None;
                }
                self.schedule_audio(&pcm_s16le, sample_rate_hz)
            }
            LiveEvent::Interrupted => {
                let stopped = self.stop_playback();
                log::debug!("model interrupted; stopped {stopped} sources");
                None
            }
            LiveEvent::TurnComplete => {
                let warning = self.flush_speech();
                self.transcript
                    .complete_turn()
                    .map(|u| VoiceUpdate::Utterance(u.to_string()))
                    .or(warning)
            }
            LiveEvent::Warning { message } => {
                log::warn!("voice session: {message}");
                Some(VoiceUpdate::Warning(message))
            }
            LiveEvent::Error { message } => {
                self.fail(message.clone());
                Some(VoiceUpdate::State(VoiceState::Error(message)))
            }
            LiveEvent::Closed { reason } => {
                if self.state.is_terminal() {
                    return None;
                }
                let next = match reason {
                    // The server refusing the handshake never got us going.
                    Some(r) if self.state == VoiceState::Connecting => VoiceState::Error(r),
                    _ => VoiceState::Closed,
                };
                self.set_state(next.clone());
                Some(VoiceUpdate::State(next))
            }
        }
    }

    /// Marks sources the output finished playing as no longer active.
    pub fn reap_finished(&mut self) {
        for id in self.output.drain_finished() {
            self.scheduler.finish(id);
        }
    }

    /// Stops playback and returns the whole transcript, newline-joined.
    pub fn close(mut self) -> String {
        self.stop_playback();
        if !self.state.is_terminal() {
            self.set_state(VoiceState::Closed);
        }
        self.transcript.finish()
    }

    fn schedule_audio(&mut self, pcm_s16le: &[u8], sample_rate_hz: u32) -> Option<VoiceUpdate> {
        let samples = decode_pcm16_le(pcm_s16le);
        if samples.is_empty() {
            return None;
        }

        let out_rate = self.output.sample_rate_hz();
        let rate_changed = self
            .speech
            .as_ref()
            .is_some_and(|r| r.input_rate_hz() != sample_rate_hz || r.output_rate_hz() != out_rate);
        if rate_changed {
            self.flush_speech();
        }
        if self.speech.is_none() {
            match StreamResampler::new(sample_rate_hz, out_rate) {
                Ok(r) => self.speech = Some(r),
                Err(e) => return Some(audio_warning(e)),
            }
        }
        let Some(speech) = self.speech.as_mut() else {
            return None;
        };

        match speech.push(&samples) {
            Ok(resampled) => {
                self.start_source(resampled);
                None
            }
            Err(e) => Some(audio_warning(e)),
        }
    }

    /// Plays out what the resampler still holds for the turn.
    fn flush_speech(&mut self) -> Option<VoiceUpdate> {
        let speech = self.speech.take()?;
        match speech.finish() {
            Ok(tail) => {
                self.start_source(tail);
                None
            }
            Err(e) => Some(audio_warning(e)),
        }
    }

    fn start_source(&mut self, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }
        let rate = self.output.sample_rate_hz();
        let now = self.output.current_time();
        let scheduled = self
            .scheduler
            .schedule(duration_secs(samples.len(), rate), now);
        self.output
            .start_source(scheduled.id, samples, scheduled.start_at);
    }

    fn stop_playback(&mut self) -> usize {
        self.speech = None;
        let stopped = self.scheduler.interrupt();
        for id in &stopped {
            self.output.stop_source(*id);
        }
        stopped.len()
    }

    fn set_state(&mut self, next: VoiceState) {
        log::info!("voice session: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn audio_warning(e: impl std::fmt::Display) -> VoiceUpdate {
    let message = format!("dropping audio fragment: {e:#}");
    log::warn!("{message}");
    VoiceUpdate::Warning(message)
}

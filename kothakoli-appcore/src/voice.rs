//! Drives one live co-writer session: capture frames out, model audio and
//! transcript in, transcript applied to the library on close.

use std::sync::PoisonError;
use std::time::Duration;

use kothakoli_audio::AudioOutput;
use kothakoli_core::StoryId;
use kothakoli_core::prompts::co_writer_instruction;
use kothakoli_engine::voice::{VoiceSession, VoiceState, VoiceUpdate};
use kothakoli_providers::gemini_live::{LiveConfig, spawn_live_session};
use tokio::sync::{mpsc, oneshot};

use crate::busy::Panel;
use crate::error::StudioError;
use crate::service::StudioService;

// How often finished playback sources are reaped while idle.
const REAP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOutcome {
    pub transcript: String,
    pub final_state: VoiceState,
    /// Story that received the transcript; `None` when nothing was said.
    pub story: Option<StoryId>,
}

impl StudioService {
    /// System instruction for a session started with the current settings.
    pub fn voice_instruction(&self) -> String {
        let settings = self.settings();
        co_writer_instruction(settings.effective_maturity(), settings.dialect)
    }

    /// Runs until `stop_voice`, the capture channel closing, or the server ending
    /// the session. `frames` carries 16 kHz mono capture frames.
    pub async fn run_voice_session<O, F>(
        &self,
        cfg: LiveConfig,
        mut frames: mpsc::Receiver<Vec<f32>>,
        output: O,
        mut on_update: F,
    ) -> Result<VoiceOutcome, StudioError>
    where
        O: AudioOutput,
        F: FnMut(&VoiceUpdate) + Send,
    {
        let _guard = self.busy().try_acquire(Panel::VoiceStudio)?;
        let mut stop_rx = self.install_stop();

        let mut session = VoiceSession::new(output);
        session
            .begin_connect()
            .map_err(|e| StudioError::Voice(e.to_string()))?;
        on_update(&VoiceUpdate::State(VoiceState::Connecting));

        let (handle, mut events) = match spawn_live_session(cfg).await {
            Ok(v) => v,
            Err(e) => {
                let message = format!("{e:#}");
                session.fail(message.clone());
                on_update(&VoiceUpdate::State(VoiceState::Error(message.clone())));
                self.clear_stop();
                return Err(StudioError::Voice(message));
            }
        };
        session
            .connected()
            .map_err(|e| StudioError::Voice(e.to_string()))?;
        on_update(&VoiceUpdate::State(VoiceState::Active));
        log::info!("voice session active");

        let mut reap = tokio::time::interval(REAP_INTERVAL);
        let mut dropped_frames = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    log::info!("voice session stop requested");
                    break;
                }

                ev = events.recv() => {
                    let Some(ev) = ev else { break };
                    if let Some(update) = session.handle_event(ev) {
                        on_update(&update);
                    }
                    if session.state().is_terminal() {
                        break;
                    }
                }

                frame = frames.recv() => {
                    let Some(frame) = frame else {
                        log::info!("capture ended");
                        break;
                    };
                    let Some(pcm) = session.encode_frame(&frame) else { continue };
                    if !handle.try_send_audio_chunk(pcm) {
                        dropped_frames += 1;
                        if dropped_frames.is_power_of_two() {
                            log::warn!("voice uplink is backed up; dropped {dropped_frames} frames");
                        }
                    }
                }

                _ = reap.tick() => session.reap_finished(),
            }
        }

        handle.shutdown().await;
        self.clear_stop();

        let final_state = match session.state() {
            VoiceState::Error(m) => VoiceState::Error(m.clone()),
            _ => VoiceState::Closed,
        };
        let transcript = session.close();
        on_update(&VoiceUpdate::State(final_state.clone()));

        let story = self.apply_voice_transcript(&transcript);
        if let Some(id) = story {
            log::info!("voice transcript applied to story {id}");
        }

        Ok(VoiceOutcome {
            transcript,
            final_state,
            story,
        })
    }

    /// Asks a running voice session to wind down. Returns false if none is running.
    pub fn stop_voice(&self) -> bool {
        let tx = self
            .voice_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match tx {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    fn install_stop(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self
            .voice_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    fn clear_stop(&self) {
        self.voice_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

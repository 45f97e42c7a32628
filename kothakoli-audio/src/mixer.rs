//! Output clock and mixing of scheduled sources.

use std::sync::{Arc, Mutex, PoisonError};

use crate::scheduler::SourceId;

/// A playback target that exposes its own monotonic clock.
pub trait AudioOutput: Send + Sync {
    fn sample_rate_hz(&self) -> u32;

    /// Seconds of audio rendered so far.
    fn current_time(&self) -> f64;

    /// `samples` must already be at [`AudioOutput::sample_rate_hz`].
    fn start_source(&self, id: SourceId, samples: Vec<f32>, start_at: f64);

    fn stop_source(&self, id: SourceId);

    /// Sources that played to the end since the last call.
    fn drain_finished(&self) -> Vec<SourceId>;
}

#[derive(Debug)]
struct Voice {
    id: SourceId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Mono software mixer. The clock only advances when [`Mixer::render`] runs,
/// so it doubles as the output clock for whatever drives it.
#[derive(Debug)]
pub struct Mixer {
    sample_rate_hz: u32,
    frames_rendered: u64,
    voices: Vec<Voice>,
    finished: Vec<SourceId>,
}

impl Mixer {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1),
            frames_rendered: 0,
            voices: Vec::new(),
            finished: Vec::new(),
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate_hz as f64
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn start(&mut self, id: SourceId, samples: Vec<f32>, start_at: f64) {
        let requested = (start_at.max(0.0) * self.sample_rate_hz as f64).round() as u64;
        // A start in the past plays immediately.
        let start_frame = requested.max(self.frames_rendered);
        self.voices.push(Voice {
            id,
            start_frame,
            samples,
        });
    }

    pub fn stop(&mut self, id: SourceId) {
        self.voices.retain(|v| v.id != id);
    }

    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    /// Fills `out` with the mix of all voices and advances the clock.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let block_start = self.frames_rendered;
        let block_end = block_start + out.len() as u64;

        for voice in &self.voices {
            let from = voice.start_frame.max(block_start);
            let to = voice.end_frame().min(block_end);
            for frame in from..to {
                let src = (frame - voice.start_frame) as usize;
                let dst = (frame - block_start) as usize;
                out[dst] += voice.samples[src];
            }
        }

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }

        self.frames_rendered = block_end;

        let finished = &mut self.finished;
        self.voices.retain(|v| {
            let done = v.end_frame() <= block_end;
            if done {
                finished.push(v.id);
            }
            !done
        });
    }

    pub fn drain_finished(&mut self) -> Vec<SourceId> {
        std::mem::take(&mut self.finished)
    }
}

/// A [`Mixer`] shared between a device callback and the session.
#[derive(Debug, Clone)]
pub struct SharedMixer {
    inner: Arc<Mutex<Mixer>>,
}

impl SharedMixer {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Mixer::new(sample_rate_hz))),
        }
    }

    pub fn render(&self, out: &mut [f32]) {
        self.lock().render(out);
    }

    pub fn stop_all(&self) {
        self.lock().stop_all();
    }

    pub fn voice_count(&self) -> usize {
        self.lock().voice_count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Mixer> {
        // A panicking audio callback must not take playback down with it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioOutput for SharedMixer {
    fn sample_rate_hz(&self) -> u32 {
        self.lock().sample_rate_hz()
    }

    fn current_time(&self) -> f64 {
        self.lock().current_time()
    }

    fn start_source(&self, id: SourceId, samples: Vec<f32>, start_at: f64) {
        self.lock().start(id, samples, start_at);
    }

    fn stop_source(&self, id: SourceId) {
        self.lock().stop(id);
    }

    fn drain_finished(&self) -> Vec<SourceId> {
        self.lock().drain_finished()
    }
}

/// Keeps a [`SharedMixer`]'s clock on wall time when no device pulls from it.
///
/// Rendering into a scratch buffer is what lets finished sources drain.
#[derive(Debug)]
pub struct HeadlessClock {
    mixer: SharedMixer,
    scratch: Vec<f32>,
}

impl HeadlessClock {
    const BLOCK_FRAMES: usize = 4096;

    pub fn new(mixer: SharedMixer) -> Self {
        Self {
            mixer,
            scratch: vec![0.0; Self::BLOCK_FRAMES],
        }
    }

    /// Renders until the mixer clock reaches `elapsed_secs`. Never moves it back.
    pub fn advance_to(&mut self, elapsed_secs: f64) {
        let mut mixer = self.mixer.lock();
        let target = (elapsed_secs.max(0.0) * mixer.sample_rate_hz as f64).round() as u64;
        while mixer.frames_rendered < target {
            let n = ((target - mixer.frames_rendered) as usize).min(Self::BLOCK_FRAMES);
            mixer.render(&mut self.scratch[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn clock_tracks_rendered_frames() {
        let mut m = Mixer::new(10);
        let mut buf = [0.0f32; 5];
        m.render(&mut buf);
        assert_abs_diff_eq!(m.current_time(), 0.5);
        m.render(&mut buf);
        assert_abs_diff_eq!(m.current_time(), 1.0);
    }

    #[test]
    fn sources_play_at_their_start_time_gaplessly() {
        let mut m = Mixer::new(10);
        m.start(SourceId(0), vec![0.1; 3], 0.0);
        m.start(SourceId(1), vec![0.2; 3], 0.3);

        let mut buf = [0.0f32; 8];
        m.render(&mut buf);
        let expected = [0.1, 0.1, 0.1, 0.2, 0.2, 0.2, 0.0, 0.0];
        for (a, b) in buf.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
        assert_eq!(m.drain_finished(), vec![SourceId(0), SourceId(1)]);
        assert!(m.drain_finished().is_empty());
    }

    #[test]
    fn source_spanning_blocks_continues() {
        let mut m = Mixer::new(10);
        m.start(SourceId(7), vec![0.5; 6], 0.0);
        let mut buf = [0.0f32; 4];
        m.render(&mut buf);
        assert!(m.drain_finished().is_empty());
        m.render(&mut buf);
        assert_abs_diff_eq!(buf[1], 0.5);
        assert_abs_diff_eq!(buf[2], 0.0);
        assert_eq!(m.drain_finished(), vec![SourceId(7)]);
    }

    #[test]
    fn late_start_plays_immediately() {
        let mut m = Mixer::new(10);
        let mut buf = [0.0f32; 10];
        m.render(&mut buf);
        m.start(SourceId(1), vec![0.3; 2], 0.2);
        let mut buf = [0.0f32; 2];
        m.render(&mut buf);
        assert_abs_diff_eq!(buf[0], 0.3);
    }

    #[test]
    fn headless_clock_finishes_sources_on_time() {
        let shared = SharedMixer::new(10);
        shared.start_source(SourceId(1), vec![0.5; 20], 0.0);
        let mut clock = HeadlessClock::new(shared.clone());

        clock.advance_to(1.0);
        assert!(shared.drain_finished().is_empty());
        clock.advance_to(0.5);
        assert_abs_diff_eq!(shared.current_time(), 1.0);

        clock.advance_to(2.0);
        assert_eq!(shared.drain_finished(), vec![SourceId(1)]);
        assert_eq!(shared.voice_count(), 0);
    }

    #[test]
    fn stop_silences_source_without_reporting_it() {
        let shared = SharedMixer::new(10);
        shared.start_source(SourceId(1), vec![0.5; 10], 0.0);
        shared.start_source(SourceId(2), vec![0.5; 10], 0.0);
        shared.stop_source(SourceId(1));
        assert_eq!(shared.voice_count(), 1);
        shared.stop_all();

        let mut buf = [1.0f32; 4];
        shared.render(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.0));
        assert!(shared.drain_finished().is_empty());
        assert_abs_diff_eq!(shared.current_time(), 0.4);
    }
}

//! cpal microphone capture and speaker playback for the live session.
//!
//! Supported platforms: Windows and macOS. cpal streams are not `Send` on
//! every host, so each stream lives on its own worker thread.

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream};

use crate::frames::FrameChunker;
use crate::mixer::SharedMixer;
use crate::resample::StreamResampler;
use crate::CAPTURE_SAMPLE_RATE_HZ;

#[derive(Debug, thiserror::Error)]
pub enum AudioDeviceError {
    #[error("no input device found")]
    NoInputDevice,

    #[error("no output device found")]
    NoOutputDevice,

    #[error("failed to get default config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(SampleFormat),

    #[error("audio worker failed: {0}")]
    Worker(String),

    #[error("audio worker startup timeout")]
    WorkerTimeout,
}

enum WorkerMsg {
    Ready(u32),
    Error(String),
}

/// Microphone stream delivering fixed 16 kHz mono frames to a callback.
pub struct MicCapture {
    stop_tx: mpsc::Sender<()>,
    worker: Option<std::thread::JoinHandle<()>>,
    device_rate_hz: u32,
}

impl MicCapture {
    pub fn start<F>(on_frame: F) -> Result<Self, AudioDeviceError>
    where
        F: FnMut(Vec<f32>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<WorkerMsg>();

        let worker = std::thread::spawn(move || {
            let (sample_tx, sample_rx) = mpsc::channel::<Vec<f32>>();
            let stream = match open_input(sample_tx) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("microphone stream failed: {e}");
                    let _ = ready_tx.send(WorkerMsg::Error(e.to_string()));
                    return;
                }
            };
            let (stream, rate) = stream;
            let _ = ready_tx.send(WorkerMsg::Ready(rate));
            run_capture_consumer(rate, sample_rx, stop_rx, on_frame);
            drop(stream);
        });

        let device_rate_hz = wait_ready(&ready_rx)?;
        log::info!("microphone capture started at {device_rate_hz} Hz");
        Ok(Self {
            stop_tx,
            worker: Some(worker),
            device_rate_hz,
        })
    }

    pub fn device_rate_hz(&self) -> u32 {
        self.device_rate_hz
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(h) = self.worker.take() {
            let _ = h.join();
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Default output device rendering from a [`SharedMixer`].
pub struct SpeakerOutput {
    mixer: SharedMixer,
    stop_tx: mpsc::Sender<()>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl SpeakerOutput {
    pub fn open_default() -> Result<Self, AudioDeviceError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<WorkerMsg>();
        let (mixer_tx, mixer_rx) = mpsc::channel::<SharedMixer>();

        let worker = std::thread::spawn(move || {
            let opened = open_output();
            let (device, config) = match opened {
                Ok(v) => v,
                Err(e) => {
                    let _ = ready_tx.send(WorkerMsg::Error(e.to_string()));
                    return;
                }
            };
            let rate = config.sample_rate().0;
            let mixer = SharedMixer::new(rate);
            let _ = mixer_tx.send(mixer.clone());

            let stream = match build_output_stream(&device, &config, mixer) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("speaker stream failed: {e}");
                    let _ = ready_tx.send(WorkerMsg::Error(e.to_string()));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(WorkerMsg::Error(format!("play stream: {e}")));
                return;
            }
            let _ = ready_tx.send(WorkerMsg::Ready(rate));
            let _ = stop_rx.recv();
            drop(stream);
        });

        let rate = wait_ready(&ready_rx)?;
        let mixer = mixer_rx
            .recv_timeout(Duration::from_millis(100))
            .map_err(|_| AudioDeviceError::WorkerTimeout)?;
        log::info!("speaker output started at {rate} Hz");

        Ok(Self {
            mixer,
            stop_tx,
            worker: Some(worker),
        })
    }

    pub fn mixer(&self) -> SharedMixer {
        self.mixer.clone()
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.mixer.stop_all();
        let _ = self.stop_tx.send(());
        if let Some(h) = self.worker.take() {
            let _ = h.join();
        }
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wait_ready(rx: &mpsc::Receiver<WorkerMsg>) -> Result<u32, AudioDeviceError> {
    match rx.recv_timeout(Duration::from_secs(2)) {
        Ok(WorkerMsg::Ready(rate)) => Ok(rate),
        Ok(WorkerMsg::Error(e)) => Err(AudioDeviceError::Worker(e)),
        Err(_) => Err(AudioDeviceError::WorkerTimeout),
    }
}

fn open_input(sample_tx: mpsc::Sender<Vec<f32>>) -> Result<(Stream, u32), AudioDeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioDeviceError::NoInputDevice)?;
    let config = device.default_input_config()?;
    let rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_cfg: cpal::StreamConfig = config.clone().into();

    let stream = match config.sample_format() {
        SampleFormat::F32 => build_input_stream::<f32>(&device, &stream_cfg, channels, sample_tx)?,
        SampleFormat::I16 => build_input_stream::<i16>(&device, &stream_cfg, channels, sample_tx)?,
        SampleFormat::U16 => build_input_stream::<u16>(&device, &stream_cfg, channels, sample_tx)?,
        SampleFormat::I32 => build_input_stream::<i32>(&device, &stream_cfg, channels, sample_tx)?,
        other => return Err(AudioDeviceError::UnsupportedFormat(other)),
    };
    stream.play()?;
    Ok((stream, rate))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sample_tx: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let cb = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let mono: Vec<f32> = if channels <= 1 {
            data.iter().map(|&s| s.to_sample::<f32>()).collect()
        } else {
            data.chunks_exact(channels)
                .map(|f| f.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32)
                .collect()
        };
        let _ = sample_tx.send(mono);
    };

    device.build_input_stream(
        config,
        cb,
        |err| log::error!("microphone stream error: {err}"),
        None,
    )
}

fn run_capture_consumer<F>(
    device_rate_hz: u32,
    sample_rx: mpsc::Receiver<Vec<f32>>,
    stop_rx: mpsc::Receiver<()>,
    mut on_frame: F,
) where
    F: FnMut(Vec<f32>),
{
    // Filter state spans callback blocks for the life of the capture.
    let mut resampler = match StreamResampler::new(device_rate_hz, CAPTURE_SAMPLE_RATE_HZ) {
        Ok(r) => r,
        Err(e) => {
            log::error!("microphone capture stopped: {e:#}");
            return;
        }
    };
    let mut frame_chunker = FrameChunker::default();

    loop {
        if stop_rx.try_recv().is_ok() {
            return;
        }
        match sample_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(samples) => {
                let resampled = match resampler.push(&samples) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("dropping capture block: {e:#}");
                        continue;
                    }
                };
                for frame in frame_chunker.push(&resampled) {
                    on_frame(frame);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn open_output() -> Result<(cpal::Device, cpal::SupportedStreamConfig), AudioDeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioDeviceError::NoOutputDevice)?;
    let config = device.default_output_config()?;
    Ok((device, config))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    mixer: SharedMixer,
) -> Result<Stream, AudioDeviceError> {
    let channels = config.channels() as usize;
    let stream_cfg: cpal::StreamConfig = config.clone().into();
    let stream = match config.sample_format() {
        SampleFormat::F32 => build_output::<f32>(device, &stream_cfg, channels, mixer)?,
        SampleFormat::I16 => build_output::<i16>(device, &stream_cfg, channels, mixer)?,
        SampleFormat::U16 => build_output::<u16>(device, &stream_cfg, channels, mixer)?,
        other => return Err(AudioDeviceError::UnsupportedFormat(other)),
    };
    Ok(stream)
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mixer: SharedMixer,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = channels.max(1);
    let mut mono: Vec<f32> = Vec::new();
    let cb = move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        let frames = data.len() / channels;
        mono.resize(frames, 0.0);
        mixer.render(&mut mono);
        for (frame, s) in data.chunks_exact_mut(channels).zip(mono.iter()) {
            for out in frame.iter_mut() {
                *out = T::from_sample(*s);
            }
        }
    };

    device.build_output_stream(
        config,
        cb,
        |err| log::error!("speaker stream error: {err}"),
        None,
    )
}

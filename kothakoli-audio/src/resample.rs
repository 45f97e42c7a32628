use anyhow::Context;
use rubato::{Resampler, SincFixedIn};

// Input frames per rubato call.
const CHUNK_FRAMES: usize = 1024;

/// Resamples one continuous mono stream that arrives in arbitrary pieces.
///
/// Filter state and leftover input carry over between [`StreamResampler::push`]
/// calls, so block boundaries are seamless. The filter delay is trimmed from the
/// front; [`StreamResampler::finish`] drains the tail so the whole stream comes
/// out at exactly [`resampled_len`] samples.
///
/// Used for microphone input (device rate to 16 kHz) and for model speech
/// (24 kHz to the output device rate).
pub struct StreamResampler {
    inner: Option<SincFixedIn<f32>>,
    input_rate_hz: u32,
    output_rate_hz: u32,
    pending: Vec<f32>,
    skip: usize,
    consumed: usize,
    produced: usize,
}

impl StreamResampler {
    pub fn new(input_rate_hz: u32, output_rate_hz: u32) -> anyhow::Result<Self> {
        anyhow::ensure!(
            input_rate_hz > 0 && output_rate_hz > 0,
            "invalid sample rates {input_rate_hz} -> {output_rate_hz}"
        );

        let inner = if input_rate_hz == output_rate_hz {
            None
        } else {
            let params = rubato::SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: rubato::WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::<f32>::new(
                f64::from(output_rate_hz) / f64::from(input_rate_hz),
                2.0,
                params,
                CHUNK_FRAMES,
                1,
            )
            .context("create resampler")?;
            Some(resampler)
        };
        let skip = inner.as_ref().map_or(0, |r| r.output_delay());

        Ok(Self {
            inner,
            input_rate_hz,
            output_rate_hz,
            pending: Vec::with_capacity(CHUNK_FRAMES),
            skip,
            consumed: 0,
            produced: 0,
        })
    }

    pub fn input_rate_hz(&self) -> u32 {
        self.input_rate_hz
    }

    pub fn output_rate_hz(&self) -> u32 {
        self.output_rate_hz
    }

    /// Feeds `samples` and returns whatever output is ready. Short pushes may
    /// return nothing until a full chunk has accumulated.
    pub fn push(&mut self, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
        let Self {
            inner,
            pending,
            skip,
            consumed,
            produced,
            ..
        } = self;
        let Some(inner) = inner.as_mut() else {
            return Ok(samples.to_vec());
        };

        pending.extend_from_slice(samples);
        *consumed += samples.len();

        let mut out = Vec::new();
        while pending.len() >= CHUNK_FRAMES {
            let input = vec![pending.drain(..CHUNK_FRAMES).collect::<Vec<f32>>()];
            let block = inner.process(&input, None).context("resample")?;
            emit(skip, produced, block, &mut out);
        }
        Ok(out)
    }

    /// Ends the stream and returns the remaining output.
    pub fn finish(mut self) -> anyhow::Result<Vec<f32>> {
        let target = resampled_len(self.consumed, self.input_rate_hz, self.output_rate_hz);
        let Self {
            inner,
            pending,
            skip,
            produced,
            ..
        } = &mut self;
        let Some(inner) = inner.as_mut() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        if !pending.is_empty() {
            let input = vec![std::mem::take(pending)];
            let block = inner
                .process_partial(Some(input.as_slice()), None)
                .context("resample tail")?;
            emit(skip, produced, block, &mut out);
        }
        // The delay is shorter than a chunk, so a couple of zero chunks drain it.
        for _ in 0..4 {
            if *produced >= target {
                break;
            }
            let block = inner
                .process_partial(None::<&[Vec<f32>]>, None)
                .context("resample tail")?;
            emit(skip, produced, block, &mut out);
        }

        let excess = produced.saturating_sub(target);
        out.truncate(out.len().saturating_sub(excess));
        Ok(out)
    }
}

fn emit(skip: &mut usize, produced: &mut usize, block: Vec<Vec<f32>>, out: &mut Vec<f32>) {
    let Some(mut samples) = block.into_iter().next() else {
        return;
    };
    let dropped = (*skip).min(samples.len());
    samples.drain(..dropped);
    *skip -= dropped;
    *produced += samples.len();
    out.extend(samples);
}

/// Number of samples a buffer of `len` at `from_hz` occupies at `to_hz`.
pub fn resampled_len(len: usize, from_hz: u32, to_hz: u32) -> usize {
    if from_hz == 0 {
        return 0;
    }
    ((len as u64 * to_hz as u64) / from_hz as u64) as usize
}

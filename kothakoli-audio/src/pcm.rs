//! 16-bit little-endian PCM conversion for the live session wire format.

use anyhow::Context;
use base64::Engine;

/// Scales `[-1, 1]` floats to i16 with saturation and packs them little-endian.
///
/// The output is always exactly `2 * samples.len()` bytes.
pub fn encode_pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s * 32768.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Inverse of [`encode_pcm16_le`]. A trailing odd byte is ignored.
pub fn decode_pcm16_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect()
}

pub fn encode_pcm16_base64(samples: &[f32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(encode_pcm16_le(samples))
}

pub fn decode_pcm16_base64(data: &str) -> anyhow::Result<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("decode base64 pcm")?;
    Ok(decode_pcm16_le(&bytes))
}

pub fn duration_secs(sample_count: usize, sample_rate_hz: u32) -> f64 {
    if sample_rate_hz == 0 {
        return 0.0;
    }
    sample_count as f64 / sample_rate_hz as f64
}

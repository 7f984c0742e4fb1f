//! Track mixing
//!
//! Combines an instrumental buffer and a vocal buffer into one
//! peak-normalized master. Length mismatches are resolved by truncating
//! to the shorter track rather than time-stretching.

use tracing::debug;

use crate::audio::{resampler, AudioBuffer};
use crate::error::{Error, Result};

/// Instrumental contribution to the mix.
pub const INSTRUMENTAL_WEIGHT: f32 = 0.7;

/// Vocal contribution to the mix; above the instrumental weight to lift
/// vocal presence over the backing track.
pub const VOCAL_WEIGHT: f32 = 0.8;

/// Peak level the mix is normalized to, leaving clipping headroom.
pub const NORMALIZE_PEAK: f32 = 0.95;

/// Mix vocals over an instrumental track.
///
/// Vocals are resampled to the instrumental's rate if needed, both
/// tracks are truncated to the shorter length, combined as a weighted
/// sum, and the result is normalized to [`NORMALIZE_PEAK`].
pub fn mix(instrumental: &AudioBuffer, vocals: &AudioBuffer) -> Result<AudioBuffer> {
    if instrumental.is_empty() {
        return Err(Error::EmptyInput(
            "instrumental track has no samples".to_string(),
        ));
    }
    if vocals.is_empty() {
        return Err(Error::EmptyInput("vocal track has no samples".to_string()));
    }

    let vocal_samples = if vocals.sample_rate != instrumental.sample_rate {
        resampler::resample(
            &vocals.samples,
            vocals.sample_rate,
            instrumental.sample_rate,
        )
        .map_err(|e| Error::Mix(format!("vocal resample failed: {}", e)))?
    } else {
        vocals.samples.clone()
    };

    let length = instrumental.len().min(vocal_samples.len());
    debug!(
        "Mixing {} instrumental + {} vocal samples down to {}",
        instrumental.len(),
        vocal_samples.len(),
        length
    );

    let mut mixed: Vec<f32> = (0..length)
        .map(|i| instrumental.samples[i] * INSTRUMENTAL_WEIGHT + vocal_samples[i] * VOCAL_WEIGHT)
        .collect();

    let peak = mixed.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    if peak > 0.0 {
        let scale = NORMALIZE_PEAK / peak;
        for sample in &mut mixed {
            *sample *= scale;
        }
    }

    Ok(AudioBuffer::new(mixed, instrumental.sample_rate))
}

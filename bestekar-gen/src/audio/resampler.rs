//! Audio resampling using rubato
//!
//! Converts vocal buffers to the instrumental's sample rate before
//! mixing.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use crate::error::{Error, Result};

/// Resample mono audio from `input_rate` to `output_rate`.
///
/// If input is already at the target rate, returns a copy without
/// resampling. The whole buffer is processed as one chunk; output length
/// is `input.len() * output_rate / input_rate` within resampler rounding.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        debug!("Sample rate already at {}Hz, skipping resample", output_rate);
        return Ok(input.to_vec());
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }

    debug!("Resampling from {}Hz to {}Hz", input_rate, output_rate);

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0, // no runtime ratio changes
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| Error::Audio(format!("Failed to create resampler: {}", e)))?;

    let mut output = resampler
        .process(&[input], None)
        .map_err(|e| Error::Audio(format!("Resampling failed: {}", e)))?;

    let channel = output
        .pop()
        .ok_or_else(|| Error::Audio("Resampler returned no channels".to_string()))?;

    debug!(
        "Resampled {} input samples to {} output samples",
        input.len(),
        channel.len()
    );

    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let input = vec![0.5f32; 1000];
        let output = resample(&input, 44100, 44100).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_empty_input() {
        let output = resample(&[], 22050, 44100).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_upsample_doubles_length_approximately() {
        let input = vec![0.25f32; 22050];
        let output = resample(&input, 22050, 44100).unwrap();
        let expected = 44100.0;
        let ratio = output.len() as f64 / expected;
        assert!(
            (0.95..=1.05).contains(&ratio),
            "unexpected output length {}",
            output.len()
        );
    }

    #[test]
    fn test_downsample_halves_length_approximately() {
        let input = vec![0.25f32; 48000];
        let output = resample(&input, 48000, 24000).unwrap();
        let ratio = output.len() as f64 / 24000.0;
        assert!(
            (0.95..=1.05).contains(&ratio),
            "unexpected output length {}",
            output.len()
        );
    }
}

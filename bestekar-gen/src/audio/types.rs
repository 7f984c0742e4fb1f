//! Core audio buffer type
//!
//! The whole pipeline works on mono float buffers; stereo sources are
//! downmixed at the WAV boundary.

/// A mono audio buffer: float samples plus the rate they were produced at.
///
/// Buffers are treated as immutable once a generation call returns them;
/// stitching and mixing build new buffers instead of editing in place.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaving-free mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Samples per second
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from samples and a sample rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    /// Copy of the trailing `secs` seconds, or None when the buffer is
    /// shorter than requested.
    pub fn tail(&self, secs: u32) -> Option<AudioBuffer> {
        let n = secs as usize * self.sample_rate as usize;
        if n > self.samples.len() {
            return None;
        }
        Some(AudioBuffer::new(
            self.samples[self.samples.len() - n..].to_vec(),
            self.sample_rate,
        ))
    }
}

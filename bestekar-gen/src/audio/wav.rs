//! WAV persistence for audio buffers
//!
//! Segment files and final outputs are 32-bit float mono WAV; reading
//! accepts integer and multi-channel files (downmixed by averaging).

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Read};
use std::path::Path;

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};

/// Write a buffer to `path` as 32-bit float mono WAV.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| Error::Audio(format!("Failed to create {}: {}", path.display(), e)))?;
    for &sample in &buffer.samples {
        writer
            .write_sample(sample)
            .map_err(|e| Error::Audio(format!("Failed to write {}: {}", path.display(), e)))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Audio(format!("Failed to finalize {}: {}", path.display(), e)))?;
    Ok(())
}

/// Read a WAV file into a mono buffer.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)
        .map_err(|e| Error::Audio(format!("Failed to open {}: {}", path.display(), e)))?;
    decode(reader).map_err(|e| Error::Audio(format!("{}: {}", path.display(), e)))
}

/// Read WAV data held in memory into a mono buffer.
pub fn read_wav_bytes(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::Audio(format!("Invalid WAV data: {}", e)))?;
    decode(reader).map_err(Error::Audio)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> std::result::Result<AudioBuffer, String> {
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| e.to_string())?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    let mono = if spec.channels <= 1 {
        samples
    } else {
        let channels = spec.channels as usize;
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(AudioBuffer::new(mono, spec.sample_rate))
}

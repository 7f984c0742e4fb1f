//! Chunked long-form generation
//!
//! The music model is only trained for bounded single-call durations;
//! asking for much longer output in one forward pass is unreliable. This
//! module slices a long request into capped segments, feeds the tail of
//! the accumulated audio back in as a continuation seed so the seam stays
//! musically coherent, and stitches the results.
//!
//! Every segment is written to disk under `{base}_part{NN}.wav` before it
//! is stitched, so a failure after segment N still leaves N usable files
//! on disk for recovery.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::audio::{wav, AudioBuffer};
use crate::engine::model::ModelPool;
use crate::error::{Error, Result};

/// One persisted generation segment.
#[derive(Debug, Clone)]
pub struct Segment {
    /// 1-based segment index
    pub index: usize,

    /// Where the segment WAV was written
    pub path: PathBuf,

    /// Duration of the segment buffer in seconds
    pub duration_secs: f64,
}

/// Result of a chunked generation run: the stitched buffer plus the
/// segment records in generation order.
#[derive(Debug)]
pub struct ChunkedAudio {
    pub buffer: AudioBuffer,
    pub segments: Vec<Segment>,
}

/// Generate `total_duration` seconds of audio for `description`, in
/// segments of at most `segment_cap` seconds with `overlap` seconds of
/// continuation seed between adjacent segments.
///
/// The stitched buffer is at least `total_duration` seconds long and may
/// run up to one segment past it; no trimming is performed. Segment
/// files land at `{base}_part{NN}.wav`.
pub async fn chunked_generate(
    model: &ModelPool,
    description: &str,
    total_duration: u32,
    overlap: u32,
    segment_cap: u32,
    base: &Path,
) -> Result<ChunkedAudio> {
    if total_duration == 0 {
        return Err(Error::InvalidDuration(total_duration));
    }
    if overlap >= segment_cap {
        return Err(Error::Config(format!(
            "overlap ({}s) must be smaller than the segment cap ({}s)",
            overlap, segment_cap
        )));
    }

    let first_len = total_duration.min(segment_cap);
    debug!(
        "Chunked generation: {}s total, {}s cap, {}s overlap",
        total_duration, segment_cap, overlap
    );

    let mut accumulated = model.generate(description, first_len).await?;
    let mut segments = vec![persist_segment(base, 1, &accumulated)?];

    while accumulated.duration_secs() < total_duration as f64 {
        let remaining = total_duration as f64 - accumulated.duration_secs();
        debug!(
            "Continuing generation: {:.1}s accumulated, {:.1}s remaining",
            accumulated.duration_secs(),
            remaining
        );

        // The continuation buffer begins with the seed material, so the
        // call must ask for overlap + new content, capped per segment.
        let next_len = (remaining + overlap as f64)
            .min(segment_cap as f64)
            .ceil() as u32;

        let seed = accumulated.tail(overlap).ok_or_else(|| {
            Error::Config(format!(
                "accumulated audio ({:.1}s) is shorter than the {}s continuation overlap",
                accumulated.duration_secs(),
                overlap
            ))
        })?;

        let continuation = model
            .generate_continuation(seed, description, next_len)
            .await?;

        if continuation.sample_rate != accumulated.sample_rate {
            return Err(Error::Generation(format!(
                "model changed sample rate mid-run ({} -> {})",
                accumulated.sample_rate, continuation.sample_rate
            )));
        }
        if continuation.duration_secs() <= overlap as f64 {
            return Err(Error::Generation(format!(
                "continuation returned {:.1}s of audio, no longer than the {}s seed",
                continuation.duration_secs(),
                overlap
            )));
        }

        let index = segments.len() + 1;
        segments.push(persist_segment(base, index, &continuation)?);

        // Stitch: drop the trailing overlap from the accumulated audio,
        // then append the full continuation (which starts with that same
        // material), removing the duplicated region exactly once.
        let overlap_samples = overlap as usize * accumulated.sample_rate as usize;
        let keep = accumulated.len().saturating_sub(overlap_samples);
        accumulated.samples.truncate(keep);
        accumulated.samples.extend_from_slice(&continuation.samples);
    }

    info!(
        "Chunked generation complete: {:.1}s in {} segment(s)",
        accumulated.duration_secs(),
        segments.len()
    );

    Ok(ChunkedAudio {
        buffer: accumulated,
        segments,
    })
}

/// Path of segment `index` under `base`.
pub fn segment_path(base: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}_part{:02}.wav", base.display(), index))
}

fn persist_segment(base: &Path, index: usize, buffer: &AudioBuffer) -> Result<Segment> {
    let path = segment_path(base, index);
    wav::write_wav(&path, buffer)?;
    info!("Segment saved: {}", path.display());
    Ok(Segment {
        index,
        path,
        duration_secs: buffer.duration_secs(),
    })
}

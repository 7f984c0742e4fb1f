//! Song assembly
//!
//! Sequences the pipeline stages for one request: instrumental
//! generation, optional vocal synthesis, and mixing. Only an
//! instrumental-stage failure fails the job; the instrumental is the
//! mandatory deliverable and every later stage degrades to the best
//! available output instead of failing.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use bestekar_common::fallback::FallbackChain;
use bestekar_common::types::{GenerationMode, GenerationRequest, JobResult};

use crate::audio::wav;
use crate::config::GenConfig;
use crate::engine::chunker;
use crate::engine::mixer;
use crate::engine::model::ModelPool;
use crate::engine::vocal::VoicePipeline;
use crate::error::{Error, Result};

/// One progress milestone emitted by the assembler.
#[derive(Debug, Clone)]
pub struct StageUpdate {
    pub percent: u8,
    pub stage: String,
}

/// Sending half of the assembler's progress channel.
///
/// Send never blocks and a closed receiver is ignored, so stages can
/// report from blocking contexts without caring who is listening.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<StageUpdate>,
}

impl ProgressSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StageUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, percent: u8, stage: impl Into<String>) {
        let _ = self.tx.send(StageUpdate {
            percent,
            stage: stage.into(),
        });
    }
}

/// Assembles complete songs from generation requests.
pub struct SongAssembler {
    model: ModelPool,
    vocal: Arc<VoicePipeline>,
    music_folder: PathBuf,
    segment_cap_secs: u32,
    overlap_secs: u32,
}

impl SongAssembler {
    pub fn new(model: ModelPool, vocal: Arc<VoicePipeline>, config: &GenConfig) -> Self {
        Self {
            model,
            vocal,
            music_folder: config.music_folder.clone(),
            segment_cap_secs: config.segment_cap_secs,
            overlap_secs: config.overlap_secs,
        }
    }

    /// Run the full pipeline for one request.
    pub async fn assemble(
        &self,
        request: &GenerationRequest,
        progress: &ProgressSender,
    ) -> Result<JobResult> {
        let started = Instant::now();
        std::fs::create_dir_all(&self.music_folder)?;

        let base = self.output_base();
        info!(
            "Assembling song: mode={}, duration={}s, lyrics={} chars",
            request.mode,
            request.duration_secs,
            request.lyrics_text.len()
        );

        match request.mode {
            GenerationMode::InstrumentalOnly => {
                progress.report(10, "Preparing generation pipeline");
                progress.report(20, "Generating instrumental track");
                let output = self.generate_instrumental(request, &base).await?;
                progress.report(95, "Finalizing output");
                self.finish(request, output, started, false)
            }

            GenerationMode::CompleteSong => {
                progress.report(5, "Initializing generation pipeline");
                progress.report(15, "Generating instrumental backing track");
                let instrumental_path = self.generate_instrumental(request, &base).await?;

                progress.report(55, "Generating singing vocals");
                let vocals_path = PathBuf::from(format!("{}_vocals.wav", base.display()));
                let vocal_outcome = self
                    .run_vocal_stage(request, vocals_path)
                    .await;

                let (output, degraded) = match vocal_outcome {
                    Ok(vocals_path) => {
                        progress.report(80, "Mixing vocals with instrumental");
                        self.mix_master(&base, &instrumental_path, &vocals_path)?
                    }
                    Err(e) => {
                        warn!("Vocal synthesis failed ({}), delivering instrumental only", e);
                        (instrumental_path, true)
                    }
                };

                progress.report(95, "Finalizing output");
                self.finish(request, output, started, degraded)
            }

            GenerationMode::VocalsOnly => {
                progress.report(10, "Preparing vocal synthesis");
                progress.report(30, "Generating vocals");
                let vocals_path = PathBuf::from(format!("{}_vocals.wav", base.display()));
                let output = self.run_vocal_stage(request, vocals_path).await?;
                progress.report(95, "Finalizing output");
                self.finish(request, output, started, false)
            }
        }
    }

    /// Generate and persist the instrumental track, returning its path.
    async fn generate_instrumental(
        &self,
        request: &GenerationRequest,
        base: &Path,
    ) -> Result<PathBuf> {
        let description = instrumental_description(&request.style_text);
        let instrumental_base = PathBuf::from(format!("{}_instrumental", base.display()));

        let chunked = chunker::chunked_generate(
            &self.model,
            &description,
            request.duration_secs,
            self.overlap_secs,
            self.segment_cap_secs,
            &instrumental_base,
        )
        .await?;

        let output = PathBuf::from(format!("{}.wav", instrumental_base.display()));
        wav::write_wav(&output, &chunked.buffer)?;
        info!(
            "Instrumental ready: {} ({} segments)",
            output.display(),
            chunked.segments.len()
        );
        Ok(output)
    }

    /// Run the blocking vocal pipeline off the async worker.
    async fn run_vocal_stage(
        &self,
        request: &GenerationRequest,
        output: PathBuf,
    ) -> Result<PathBuf> {
        let pipeline = Arc::clone(&self.vocal);
        let lyrics = request.lyrics_text.clone();
        let explicit_model = request.rvc_model_path.clone();

        tokio::task::spawn_blocking(move || {
            pipeline.synthesize_singing(&lyrics, explicit_model.as_deref(), &output)
        })
        .await
        .map_err(|e| Error::Internal(format!("vocal stage task failed: {}", e)))?
    }

    /// Mix the master, falling back to the bare instrumental when the
    /// mix cannot be produced.
    fn mix_master(
        &self,
        base: &Path,
        instrumental_path: &Path,
        vocals_path: &Path,
    ) -> Result<(PathBuf, bool)> {
        let complete_path = PathBuf::from(format!("{}_complete.wav", base.display()));

        let chosen = FallbackChain::new("complete song master")
            .attempt("mixed master", || {
                let instrumental = wav::read_wav(instrumental_path)?;
                let vocals = wav::read_wav(vocals_path)?;
                let mixed = mixer::mix(&instrumental, &vocals)?;
                wav::write_wav(&complete_path, &mixed)?;
                Ok((complete_path.clone(), false))
            })
            .attempt("instrumental only", || Ok((instrumental_path.to_path_buf(), true)))
            .run()
            .map_err(|e| Error::Mix(e.to_string()))?;

        if chosen.value.1 {
            warn!("Mixing failed, delivering instrumental only");
        }
        Ok(chosen.value)
    }

    fn output_base(&self) -> PathBuf {
        // Timestamp for human-sortable names, uuid fragment for
        // uniqueness when submissions land in the same second.
        let stamp = Utc::now().timestamp();
        let unique = Uuid::new_v4().simple().to_string();
        self.music_folder
            .join(format!("bestekar_{}_{}", stamp, &unique[..8]))
    }

    fn finish(
        &self,
        request: &GenerationRequest,
        output: PathBuf,
        started: Instant,
        degraded: bool,
    ) -> Result<JobResult> {
        let metadata = std::fs::metadata(&output)?;
        let file_size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        let generation_time_seconds = started.elapsed().as_secs_f64();

        info!(
            "Song ready: {} ({:.2} MB in {:.1}s, degraded={})",
            output.display(),
            file_size_mb,
            generation_time_seconds,
            degraded
        );

        Ok(JobResult {
            filename: output
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            output_file: output.to_string_lossy().to_string(),
            file_size_mb,
            generation_time_seconds,
            mode: request.mode,
            duration_secs: request.duration_secs,
            degraded,
        })
    }
}

/// Instrumental-flavored description: the style with an explicit
/// no-vocals qualifier so the model does not add vocal-like sounds.
fn instrumental_description(style: &str) -> String {
    format!("{}, instrumental, no vocals, beautiful Turkish melody", style)
}

//! Singing voice synthesis pipeline
//!
//! Two stages: text-to-speech at a fixed default voice, then voice
//! conversion toward a target singing profile. TTS failure ends the
//! pipeline (no vocals are possible without speech); conversion failure
//! falls back to the raw speech so a generation attempt is never lost to
//! the optional stage.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

use bestekar_common::fallback::FallbackChain;

use crate::engine::profile::{ProfileLibrary, ProfileMirror, VoiceProfile};
use crate::error::{Error, Result};

/// Voice conversion parameters.
///
/// Fixed configuration constants, not derived: pitch is preserved
/// (0 semitone shift) because the speech already carries the lyric
/// cadence the conversion should keep.
#[derive(Debug, Clone)]
pub struct ConversionParams {
    pub f0_up_key: i32,
    pub f0_method: String,
    pub filter_radius: u32,
    pub index_rate: f32,
    pub volume_envelope: f32,
    pub protect: f32,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            f0_up_key: 0,
            f0_method: "harvest".to_string(),
            filter_radius: 3,
            index_rate: 0.75,
            volume_envelope: 1.0,
            protect: 0.33,
        }
    }
}

/// Text-to-speech capability: render `text` as speech into `output`.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<()>;
}

/// Voice conversion capability: convert `input` speech toward the
/// profile's voice, writing the result to `output`.
pub trait VoiceConverter: Send + Sync {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        profile: &VoiceProfile,
        params: &ConversionParams,
    ) -> Result<()>;
}

/// The two-stage singing voice pipeline.
pub struct VoicePipeline {
    synthesizer: Box<dyn SpeechSynthesizer>,
    converter: Box<dyn VoiceConverter>,
    library: ProfileLibrary,
    mirrors: Vec<ProfileMirror>,
    voice: String,
    params: ConversionParams,
}

impl fmt::Debug for VoicePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePipeline")
            .field("voice", &self.voice)
            .finish()
    }
}

impl VoicePipeline {
    pub fn new(
        synthesizer: Box<dyn SpeechSynthesizer>,
        converter: Box<dyn VoiceConverter>,
        library: ProfileLibrary,
        mirrors: Vec<ProfileMirror>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            converter,
            library,
            mirrors,
            voice: voice.into(),
            params: ConversionParams::default(),
        }
    }

    /// Produce singing vocals for `lyrics` at `output`.
    ///
    /// Blocking; callers run this on a blocking-capable thread. Returns
    /// the output path on success. The output holds converted singing
    /// when a usable profile exists and conversion succeeds, raw speech
    /// otherwise.
    pub fn synthesize_singing(
        &self,
        lyrics: &str,
        explicit_model: Option<&Path>,
        output: &Path,
    ) -> Result<PathBuf> {
        // Stage 1: text-to-speech. Failure here is terminal.
        let tts_file = tempfile::Builder::new()
            .prefix("bestekar_tts_")
            .suffix(".wav")
            .tempfile()?;
        self.synthesizer
            .synthesize(lyrics, &self.voice, tts_file.path())?;
        info!("Speech synthesized ({} characters)", lyrics.len());

        // Stage 2: voice conversion, with raw speech as the fallback.
        let profile = self.resolve_profile(explicit_model)?;

        let tts_path = tts_file.path().to_path_buf();
        let result = match &profile {
            Some(profile) => FallbackChain::new("singing vocals")
                .attempt("voice conversion", || {
                    self.converter
                        .convert(&tts_path, output, profile, &self.params)?;
                    if !output.exists() {
                        anyhow::bail!("converter produced no output file");
                    }
                    Ok(output.to_path_buf())
                })
                .attempt("raw speech", || {
                    std::fs::copy(&tts_path, output)?;
                    Ok(output.to_path_buf())
                })
                .run()
                .map_err(|e| Error::Tts(e.to_string()))?
                .value,
            None => {
                info!("Voice conversion unavailable, delivering raw speech");
                std::fs::copy(&tts_path, output)?;
                output.to_path_buf()
            }
        };

        // The TTS temp file is removed when `tts_file` drops here.
        Ok(result)
    }

    /// Resolve the conversion profile: an explicitly supplied model wins,
    /// otherwise the default profile is discovered or acquired. Returns
    /// None when conversion is unavailable for this run.
    fn resolve_profile(&self, explicit_model: Option<&Path>) -> Result<Option<VoiceProfile>> {
        if let Some(path) = explicit_model {
            if path.exists() {
                return Ok(Some(VoiceProfile::from_model_path(path.to_path_buf())));
            }
            warn!(
                "Requested voice model {} does not exist, falling back to default profile",
                path.display()
            );
        }

        let profile = self.library.acquire_default(&self.mirrors)?;
        if profile.is_usable() {
            Ok(Some(profile))
        } else {
            Ok(None)
        }
    }
}

// ============================================================================
// Command-line backed capability implementations
// ============================================================================

/// TTS through an external synthesizer command (edge-tts compatible
/// invocation: `--voice <voice> --text <text> --write-media <path>`).
pub struct CommandSynthesizer {
    program: String,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new("edge-tts")
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, voice: &str, output: &Path) -> Result<()> {
        let result = Command::new(&self.program)
            .arg("--voice")
            .arg(voice)
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(output)
            .output()
            .map_err(|e| Error::Tts(format!("failed to run {}: {}", self.program, e)))?;

        if !result.status.success() {
            return Err(Error::Tts(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.exists() {
            return Err(Error::Tts("synthesizer produced no output file".to_string()));
        }
        Ok(())
    }
}

/// Voice conversion through an external RVC command.
pub struct CommandVoiceConverter {
    program: String,
}

impl CommandVoiceConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CommandVoiceConverter {
    fn default() -> Self {
        Self::new("rvc")
    }
}

impl VoiceConverter for CommandVoiceConverter {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        profile: &VoiceProfile,
        params: &ConversionParams,
    ) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-mp")
            .arg(&profile.model_path)
            .arg("--f0method")
            .arg(&params.f0_method)
            .arg("--f0up_key")
            .arg(params.f0_up_key.to_string())
            .arg("--filter_radius")
            .arg(params.filter_radius.to_string())
            .arg("--index_rate")
            .arg(params.index_rate.to_string())
            .arg("--protect")
            .arg(params.protect.to_string());
        if let Some(index) = &profile.index_path {
            command.arg("-ip").arg(index);
        }

        let result = command
            .output()
            .map_err(|e| Error::Conversion(format!("failed to run {}: {}", self.program, e)))?;

        if !result.status.success() {
            return Err(Error::Conversion(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

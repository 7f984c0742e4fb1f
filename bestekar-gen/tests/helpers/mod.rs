//! Test helper modules for generation service integration tests
//!
//! Provides deterministic stand-ins for the external capabilities: the
//! music model, the speech synthesizer, and the voice converter.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};

use bestekar_gen::audio::{wav, AudioBuffer};
use bestekar_gen::config::GenConfig;
use bestekar_gen::engine::assembler::SongAssembler;
use bestekar_gen::engine::model::{ModelPool, MusicModel};
use bestekar_gen::engine::profile::{ProfileLibrary, VoiceProfile};
use bestekar_gen::engine::vocal::{
    ConversionParams, SpeechSynthesizer, VoiceConverter, VoicePipeline,
};
use bestekar_gen::error::{Error, Result};

/// Small sample rate so test buffers stay tiny.
pub const TEST_SAMPLE_RATE: u32 = 100;

/// Call counters shared between a stub model and the test body.
#[derive(Clone, Default)]
pub struct ModelCalls {
    pub generate: Arc<AtomicUsize>,
    pub continuation: Arc<AtomicUsize>,
}

impl ModelCalls {
    pub fn generate_count(&self) -> usize {
        self.generate.load(Ordering::SeqCst)
    }

    pub fn continuation_count(&self) -> usize {
        self.continuation.load(Ordering::SeqCst)
    }
}

/// Deterministic model: fresh buffers are constant 0.25, continuations
/// keep the seed and extend with 0.5 up to the requested duration.
pub struct StubModel {
    pub calls: ModelCalls,
}

impl MusicModel for StubModel {
    fn generate(&mut self, _description: &str, duration_secs: u32) -> Result<AudioBuffer> {
        self.calls.generate.fetch_add(1, Ordering::SeqCst);
        let samples = vec![0.25; duration_secs as usize * TEST_SAMPLE_RATE as usize];
        Ok(AudioBuffer::new(samples, TEST_SAMPLE_RATE))
    }

    fn generate_continuation(
        &mut self,
        seed: &AudioBuffer,
        _description: &str,
        duration_secs: u32,
    ) -> Result<AudioBuffer> {
        self.calls.continuation.fetch_add(1, Ordering::SeqCst);
        let total = duration_secs as usize * TEST_SAMPLE_RATE as usize;
        let mut samples = seed.samples.clone();
        samples.extend(std::iter::repeat(0.5).take(total.saturating_sub(samples.len())));
        Ok(AudioBuffer::new(samples, TEST_SAMPLE_RATE))
    }
}

/// Pool running a [`StubModel`], plus its call counters.
pub fn stub_pool() -> (ModelPool, ModelCalls) {
    let calls = ModelCalls::default();
    let model_calls = calls.clone();
    let pool = ModelPool::spawn(Box::new(move || {
        Ok(Box::new(StubModel { calls: model_calls }) as Box<dyn MusicModel>)
    }));
    (pool, calls)
}

/// Model that always fails with a non-transient generation error.
pub struct FailingModel;

impl MusicModel for FailingModel {
    fn generate(&mut self, _description: &str, _duration_secs: u32) -> Result<AudioBuffer> {
        Err(Error::Generation("model exploded".to_string()))
    }

    fn generate_continuation(
        &mut self,
        _seed: &AudioBuffer,
        _description: &str,
        _duration_secs: u32,
    ) -> Result<AudioBuffer> {
        Err(Error::Generation("model exploded".to_string()))
    }
}

pub fn failing_pool() -> ModelPool {
    ModelPool::spawn(Box::new(|| Ok(Box::new(FailingModel) as Box<dyn MusicModel>)))
}

/// Model that fails with a transient transport error a fixed number of
/// times before behaving like [`StubModel`].
pub struct FlakyModel {
    pub failures_left: Arc<AtomicUsize>,
    pub inner: StubModel,
}

impl MusicModel for FlakyModel {
    fn generate(&mut self, description: &str, duration_secs: u32) -> Result<AudioBuffer> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Http("daemon connection reset".to_string()));
        }
        self.inner.generate(description, duration_secs)
    }

    fn generate_continuation(
        &mut self,
        seed: &AudioBuffer,
        description: &str,
        duration_secs: u32,
    ) -> Result<AudioBuffer> {
        self.inner.generate_continuation(seed, description, duration_secs)
    }
}

pub fn flaky_pool(failures: usize) -> (ModelPool, ModelCalls, Arc<AtomicUsize>) {
    let calls = ModelCalls::default();
    let failures_left = Arc::new(AtomicUsize::new(failures));
    let model_calls = calls.clone();
    let model_failures = Arc::clone(&failures_left);
    let pool = ModelPool::spawn(Box::new(move || {
        Ok(Box::new(FlakyModel {
            failures_left: model_failures,
            inner: StubModel { calls: model_calls },
        }) as Box<dyn MusicModel>)
    }));
    (pool, calls, failures_left)
}

/// Model that blocks on a channel until the test releases it; lets tests
/// hold a job in PROGRESS deterministically.
pub struct GatedModel {
    pub gate: Mutex<std_mpsc::Receiver<()>>,
    pub inner: StubModel,
}

impl MusicModel for GatedModel {
    fn generate(&mut self, description: &str, duration_secs: u32) -> Result<AudioBuffer> {
        let gate = self.gate.lock().map_err(|_| {
            Error::Internal("gated model lock poisoned".to_string())
        })?;
        let _ = gate.recv();
        drop(gate);
        self.inner.generate(description, duration_secs)
    }

    fn generate_continuation(
        &mut self,
        seed: &AudioBuffer,
        description: &str,
        duration_secs: u32,
    ) -> Result<AudioBuffer> {
        self.inner.generate_continuation(seed, description, duration_secs)
    }
}

/// Pool whose first model call blocks until a `()` is sent on the
/// returned sender (or the sender is dropped).
pub fn gated_pool() -> (ModelPool, std_mpsc::Sender<()>, ModelCalls) {
    let calls = ModelCalls::default();
    let (gate_tx, gate_rx) = std_mpsc::channel();
    let model_calls = calls.clone();
    let pool = ModelPool::spawn(Box::new(move || {
        Ok(Box::new(GatedModel {
            gate: Mutex::new(gate_rx),
            inner: StubModel { calls: model_calls },
        }) as Box<dyn MusicModel>)
    }));
    (pool, gate_tx, calls)
}

// ============================================================================
// Vocal capability stubs
// ============================================================================

/// TTS stub writing one second of quiet speech-shaped samples.
pub struct StubSynthesizer;

impl SpeechSynthesizer for StubSynthesizer {
    fn synthesize(&self, _text: &str, _voice: &str, output: &Path) -> Result<()> {
        let samples = vec![0.3; TEST_SAMPLE_RATE as usize];
        wav::write_wav(output, &AudioBuffer::new(samples, TEST_SAMPLE_RATE))
    }
}

/// TTS stub that always fails (speech service unreachable).
pub struct FailingSynthesizer;

impl SpeechSynthesizer for FailingSynthesizer {
    fn synthesize(&self, _text: &str, _voice: &str, _output: &Path) -> Result<()> {
        Err(Error::Tts("speech service unreachable".to_string()))
    }
}

/// Converter stub that copies its input (a successful conversion).
pub struct CopyConverter;

impl VoiceConverter for CopyConverter {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        _profile: &VoiceProfile,
        _params: &ConversionParams,
    ) -> Result<()> {
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Converter stub that always fails.
pub struct FailingConverter;

impl VoiceConverter for FailingConverter {
    fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _profile: &VoiceProfile,
        _params: &ConversionParams,
    ) -> Result<()> {
        Err(Error::Conversion("model incompatible".to_string()))
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Config pointing all folders below `root` with fast test timings.
pub fn test_config(root: &Path) -> GenConfig {
    GenConfig {
        music_folder: root.join("music"),
        profiles_folder: root.join("rvc"),
        retry_delay_secs: 0,
        ..GenConfig::default()
    }
}

/// Vocal pipeline backed by the given stubs, with an empty mirror list
/// so profile acquisition never touches the network.
pub fn stub_vocal_pipeline(
    config: &GenConfig,
    synthesizer: Box<dyn SpeechSynthesizer>,
    converter: Box<dyn VoiceConverter>,
) -> Arc<VoicePipeline> {
    Arc::new(VoicePipeline::new(
        synthesizer,
        converter,
        ProfileLibrary::new(&config.profiles_folder),
        Vec::new(),
        config.tts_voice.clone(),
    ))
}

/// Write a usable (non-placeholder) voice profile into the config's
/// profile folder.
pub fn install_test_profile(config: &GenConfig) {
    let library = ProfileLibrary::new(&config.profiles_folder);
    library.ensure_layout().expect("profile layout");
    std::fs::write(config.profiles_folder.join("models/test.pth"), b"weights")
        .expect("profile model");
    std::fs::write(config.profiles_folder.join("indices/test.index"), b"index")
        .expect("profile index");
}

/// Assembler over the given pool with a working vocal pipeline.
pub fn assembler_with_vocals(config: &GenConfig, pool: ModelPool) -> Arc<SongAssembler> {
    install_test_profile(config);
    let vocal = stub_vocal_pipeline(config, Box::new(StubSynthesizer), Box::new(CopyConverter));
    Arc::new(SongAssembler::new(pool, vocal, config))
}

/// Assembler whose vocal stage always fails.
pub fn assembler_without_vocals(config: &GenConfig, pool: ModelPool) -> Arc<SongAssembler> {
    let vocal = stub_vocal_pipeline(
        config,
        Box::new(FailingSynthesizer),
        Box::new(FailingConverter),
    );
    Arc::new(SongAssembler::new(pool, vocal, config))
}

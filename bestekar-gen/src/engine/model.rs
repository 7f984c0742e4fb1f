//! Music model seam
//!
//! The underlying generative model is an opaque capability: given a text
//! description and a duration it produces an audio buffer, optionally
//! continuing from a seed. Model invocation is heavyweight and not
//! reentrant-safe, so all calls are funneled through a single dedicated
//! worker thread that owns the model instance and loads it lazily,
//! at most once. Handles are cheap clones that submit requests over a
//! channel and await the reply.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::audio::{wav, AudioBuffer};
use crate::error::{Error, Result};

/// Blocking interface to a loaded music generation model.
///
/// Implementations run on the pool's worker thread and may block freely.
pub trait MusicModel: Send {
    /// Produce a fresh buffer from a text description.
    fn generate(&mut self, description: &str, duration_secs: u32) -> Result<AudioBuffer>;

    /// Produce a buffer that continues `seed`. The returned buffer spans
    /// `duration_secs` total and begins with the seed material, which
    /// keeps the seam musically coherent.
    fn generate_continuation(
        &mut self,
        seed: &AudioBuffer,
        description: &str,
        duration_secs: u32,
    ) -> Result<AudioBuffer>;
}

/// Factory invoked on the worker thread for the at-most-once model load.
pub type ModelFactory = Box<dyn FnOnce() -> Result<Box<dyn MusicModel>> + Send + 'static>;

enum ModelRequest {
    Generate {
        description: String,
        duration_secs: u32,
        reply: oneshot::Sender<Result<AudioBuffer>>,
    },
    Continue {
        seed: AudioBuffer,
        description: String,
        duration_secs: u32,
        reply: oneshot::Sender<Result<AudioBuffer>>,
    },
}

/// Handle to the model worker thread.
///
/// Cloning is cheap; all clones share the single serialized model.
#[derive(Clone)]
pub struct ModelPool {
    tx: mpsc::Sender<ModelRequest>,
}

impl ModelPool {
    /// Spawn the model worker thread. The factory runs on the worker on
    /// first request; a failed load is reported to that request and the
    /// load is not reattempted.
    pub fn spawn(factory: ModelFactory) -> Self {
        let (tx, mut rx) = mpsc::channel::<ModelRequest>(8);

        let builder = std::thread::Builder::new().name("model-pool".to_string());
        let spawned = builder.spawn(move || {
            let mut model: Option<Box<dyn MusicModel>> = None;
            let mut factory = Some(factory);

            while let Some(request) = rx.blocking_recv() {
                match request {
                    ModelRequest::Generate {
                        description,
                        duration_secs,
                        reply,
                    } => {
                        let result = ensure_model(&mut model, &mut factory)
                            .and_then(|m| m.generate(&description, duration_secs));
                        let _ = reply.send(result);
                    }
                    ModelRequest::Continue {
                        seed,
                        description,
                        duration_secs,
                        reply,
                    } => {
                        let result = ensure_model(&mut model, &mut factory)
                            .and_then(|m| m.generate_continuation(&seed, &description, duration_secs));
                        let _ = reply.send(result);
                    }
                }
            }
            debug!("Model pool thread exiting");
        });
        if let Err(e) = spawned {
            error!("Failed to spawn model pool thread: {}", e);
        }

        Self { tx }
    }

    /// Generate a fresh buffer.
    pub async fn generate(&self, description: &str, duration_secs: u32) -> Result<AudioBuffer> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ModelRequest::Generate {
                description: description.to_string(),
                duration_secs,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Generation("model pool is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Generation("model pool dropped the request".to_string()))?
    }

    /// Generate a continuation of `seed`.
    pub async fn generate_continuation(
        &self,
        seed: AudioBuffer,
        description: &str,
        duration_secs: u32,
    ) -> Result<AudioBuffer> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ModelRequest::Continue {
                seed,
                description: description.to_string(),
                duration_secs,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::Generation("model pool is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Generation("model pool dropped the request".to_string()))?
    }
}

fn ensure_model<'a>(
    model: &'a mut Option<Box<dyn MusicModel>>,
    factory: &mut Option<ModelFactory>,
) -> Result<&'a mut Box<dyn MusicModel>> {
    match model {
        Some(m) => Ok(m),
        None => {
            let f = factory.take().ok_or_else(|| {
                Error::Generation("music model failed to load previously".to_string())
            })?;
            info!("Loading music model");
            let loaded = f()?;
            info!("Music model loaded");
            Ok(model.insert(loaded))
        }
    }
}

// ============================================================================
// Remote daemon implementation
// ============================================================================

#[derive(Serialize)]
struct DaemonRequest<'a> {
    description: &'a str,
    duration_secs: u32,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<String>,
}

#[derive(Deserialize)]
struct DaemonResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Music model backed by an external generation daemon.
///
/// The daemon receives a JSON request naming an output path (and a seed
/// WAV path for continuations), renders the audio to that path, and
/// replies with a status object; the rendered file is read back into
/// memory. Connectivity failures are transport errors and eligible for
/// retry; daemon-reported failures are generation errors and are not.
pub struct RemoteMusicModel {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl RemoteMusicModel {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    fn request(&self, request: &DaemonRequest<'_>, output: &Path) -> Result<AudioBuffer> {
        let response = self
            .client
            .post(format!("{}/generate", self.endpoint))
            .json(request)
            .send()
            .map_err(|e| Error::Http(format!("generation daemon unreachable: {}", e)))?;

        let response: DaemonResponse = response
            .json()
            .map_err(|e| Error::Http(format!("invalid daemon response: {}", e)))?;

        if response.status != "ok" {
            return Err(Error::Generation(
                response
                    .error
                    .unwrap_or_else(|| "daemon reported failure".to_string()),
            ));
        }

        wav::read_wav(output)
    }
}

impl MusicModel for RemoteMusicModel {
    fn generate(&mut self, description: &str, duration_secs: u32) -> Result<AudioBuffer> {
        let output = tempfile::Builder::new()
            .prefix("bestekar_gen_")
            .suffix(".wav")
            .tempfile()?;
        let request = DaemonRequest {
            description,
            duration_secs,
            output: output.path().to_string_lossy().to_string(),
            seed: None,
        };
        self.request(&request, output.path())
    }

    fn generate_continuation(
        &mut self,
        seed: &AudioBuffer,
        description: &str,
        duration_secs: u32,
    ) -> Result<AudioBuffer> {
        let seed_file = tempfile::Builder::new()
            .prefix("bestekar_seed_")
            .suffix(".wav")
            .tempfile()?;
        wav::write_wav(seed_file.path(), seed)?;

        let output = tempfile::Builder::new()
            .prefix("bestekar_gen_")
            .suffix(".wav")
            .tempfile()?;
        let request = DaemonRequest {
            description,
            duration_secs,
            output: output.path().to_string_lossy().to_string(),
            seed: Some(seed_file.path().to_string_lossy().to_string()),
        };
        self.request(&request, output.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingModel {
        calls: Arc<AtomicUsize>,
    }

    impl MusicModel for CountingModel {
        fn generate(&mut self, _description: &str, duration_secs: u32) -> Result<AudioBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AudioBuffer::new(vec![0.1; duration_secs as usize * 100], 100))
        }

        fn generate_continuation(
            &mut self,
            seed: &AudioBuffer,
            _description: &str,
            duration_secs: u32,
        ) -> Result<AudioBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut samples = seed.samples.clone();
            let new = (duration_secs as usize * 100).saturating_sub(samples.len());
            samples.extend(std::iter::repeat(0.2).take(new));
            Ok(AudioBuffer::new(samples, 100))
        }
    }

    #[tokio::test]
    async fn test_model_loads_once_across_calls() {
        let loads = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let loads_clone = Arc::clone(&loads);
        let calls_clone = Arc::clone(&calls);

        let pool = ModelPool::spawn(Box::new(move || {
            loads_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingModel { calls: calls_clone }) as Box<dyn MusicModel>)
        }));

        let first = pool.generate("ballad", 2).await.unwrap();
        assert_eq!(first.len(), 200);
        let second = pool.generate("ballad", 1).await.unwrap();
        assert_eq!(second.len(), 100);

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_reattempted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let pool = ModelPool::spawn(Box::new(move || {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err(Error::Generation("weights missing".to_string()))
        }));

        let first = pool.generate("ballad", 1).await.unwrap_err();
        assert!(matches!(first, Error::Generation(_)));
        let second = pool.generate("ballad", 1).await.unwrap_err();
        assert!(second.to_string().contains("failed to load previously"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

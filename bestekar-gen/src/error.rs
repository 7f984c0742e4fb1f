//! Error types for bestekar-gen
//!
//! Defines service-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the generation service
#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive requested duration
    #[error("Invalid duration: {0} seconds (must be > 0)")]
    InvalidDuration(u32),

    /// Underlying music model call failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// A mixing input had zero samples
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Track mixing failed
    #[error("Mix error: {0}")]
    Mix(String),

    /// Text-to-speech synthesis failed
    #[error("Speech synthesis error: {0}")]
    Tts(String),

    /// Voice conversion failed
    #[error("Voice conversion error: {0}")]
    Conversion(String),

    /// No usable voice conversion profile and all acquisition attempts failed
    #[error("Voice profile unavailable: {0}")]
    VoiceProfileUnavailable(String),

    /// Poll or cancel on an unknown or expired job id
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// Job exceeded its hard wall-clock limit
    #[error("Task timed out after {0} seconds")]
    TaskTimeout(u64),

    /// Audio file or sample processing errors
    #[error("Audio error: {0}")]
    Audio(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors (remote model, profile mirrors)
    #[error("HTTP error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry could plausibly help.
    ///
    /// Only infrastructure-level failures (transport, filesystem) count;
    /// generation-logic failures are deterministic enough that retrying
    /// them wastes a model run.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Io(_))
    }
}

/// Convenience Result type using bestekar-gen Error
pub type Result<T> = std::result::Result<T, Error>;

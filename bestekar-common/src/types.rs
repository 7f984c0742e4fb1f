//! Generation request and job snapshot types
//!
//! These types form the submission and status boundary between the
//! generation service and its clients (GUI, CLI, HTTP callers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{Error, Result};

/// What kind of output a generation request asks for.
///
/// The wire strings match the mode selector of the desktop client, so a
/// request round-trips unchanged through JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Instrumental backing track plus synthesized singing vocals, mixed.
    #[serde(rename = "Complete Song (RVC)")]
    CompleteSong,

    /// Instrumental backing track only.
    #[serde(rename = "Instrumental Only")]
    InstrumentalOnly,

    /// Synthesized singing vocals only, no backing track.
    #[serde(rename = "Vocals Only (RVC)")]
    VocalsOnly,
}

impl GenerationMode {
    /// Suffix appended to the output file base name for this mode.
    pub fn output_suffix(&self) -> &'static str {
        match self {
            GenerationMode::CompleteSong => "_complete",
            GenerationMode::InstrumentalOnly => "_instrumental",
            GenerationMode::VocalsOnly => "_vocals",
        }
    }

    /// Whether this mode requires the vocal synthesis stage.
    pub fn wants_vocals(&self) -> bool {
        !matches!(self, GenerationMode::InstrumentalOnly)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationMode::CompleteSong => "Complete Song (RVC)",
            GenerationMode::InstrumentalOnly => "Instrumental Only",
            GenerationMode::VocalsOnly => "Vocals Only (RVC)",
        };
        write!(f, "{}", s)
    }
}

/// A song generation request as submitted by a client.
///
/// Immutable value object; consumed once at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Lyrics text (used as TTS input for vocal modes)
    pub lyrics_text: String,

    /// Musical style description fed to the music model
    pub style_text: String,

    /// Requested duration in seconds (must be > 0)
    pub duration_secs: u32,

    /// Generation mode
    pub mode: GenerationMode,

    /// Optional explicit voice conversion model path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rvc_model_path: Option<PathBuf>,
}

impl GenerationRequest {
    /// Validate the request fields.
    ///
    /// Duration validation is deliberately NOT performed at submission
    /// time; a zero-duration request is accepted and fails inside the
    /// pipeline so the failure surfaces as a FAILURE job state with a
    /// message, like every other generation error.
    pub fn validate(&self) -> Result<()> {
        if self.lyrics_text.trim().is_empty() && self.mode.wants_vocals() {
            return Err(Error::InvalidInput(
                "lyrics text is required for vocal modes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Accepted, waiting for a worker
    Pending,
    /// Running; snapshot carries stage message and percent
    Progress,
    /// Terminal: finished with a result payload
    Success,
    /// Terminal: finished with an error message
    Failure,
    /// Terminal: cancelled before or during execution
    Revoked,
}

impl JobState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failure | JobState::Revoked
        )
    }

    /// Active states are visible in `list_active` queries.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Progress)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Progress => "PROGRESS",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
            JobState::Revoked => "REVOKED",
        };
        write!(f, "{}", s)
    }
}

/// Result payload of a successfully completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Full path of the delivered audio file
    pub output_file: String,

    /// File name component of `output_file`
    pub filename: String,

    /// Size of the delivered file in megabytes
    pub file_size_mb: f64,

    /// Wall-clock time the generation took, in seconds
    pub generation_time_seconds: f64,

    /// Mode the job was submitted with
    pub mode: GenerationMode,

    /// Requested duration in seconds
    pub duration_secs: u32,

    /// True when a non-fatal stage failure reduced the delivered
    /// feature set (e.g. instrumental-only instead of a complete song)
    pub degraded: bool,
}

/// Point-in-time snapshot of a generation job.
///
/// Snapshots are published whole by the worker side; readers never see a
/// partially updated record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job id assigned at submission
    pub id: Uuid,

    /// Current lifecycle state
    pub state: JobState,

    /// Progress percent, 0-100, non-decreasing while running
    pub progress: u8,

    /// Human-readable stage message
    pub message: String,

    /// Result payload, present only in SUCCESS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,

    /// Error message, present only in FAILURE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the job was accepted
    pub submitted_at: DateTime<Utc>,

    /// When a worker started the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// Create the initial PENDING snapshot for a freshly submitted job.
    pub fn queued(id: Uuid) -> Self {
        Self {
            id,
            state: JobState::Pending,
            progress: 0,
            message: "Task queued".to_string(),
            result: None,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

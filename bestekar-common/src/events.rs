//! Event types for the Bestekar event system
//!
//! Every job lifecycle transition is broadcast as a `GenEvent` so that
//! SSE clients and in-process observers see the same stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::GenerationMode;

/// Bestekar event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GenEvent {
    /// Job accepted into the queue
    JobQueued {
        job_id: Uuid,
        mode: GenerationMode,
        timestamp: DateTime<Utc>,
    },

    /// Worker picked the job up and started the pipeline
    JobStarted {
        job_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Stage progress update (sent on every milestone)
    JobProgress {
        job_id: Uuid,
        stage: String,
        percent: u8,
        timestamp: DateTime<Utc>,
    },

    /// Job finished successfully
    JobCompleted {
        job_id: Uuid,
        output_file: String,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// Job finished with an error
    JobFailed {
        job_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Job was cancelled before or during execution
    JobRevoked {
        job_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Job exceeded its soft wall-clock limit and is being wound down
    SoftLimitExceeded {
        job_id: Uuid,
        elapsed_secs: u64,
        timestamp: DateTime<Utc>,
    },
}

impl GenEvent {
    /// Event type name, used as the SSE `event:` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            GenEvent::JobQueued { .. } => "JobQueued",
            GenEvent::JobStarted { .. } => "JobStarted",
            GenEvent::JobProgress { .. } => "JobProgress",
            GenEvent::JobCompleted { .. } => "JobCompleted",
            GenEvent::JobFailed { .. } => "JobFailed",
            GenEvent::JobRevoked { .. } => "JobRevoked",
            GenEvent::SoftLimitExceeded { .. } => "SoftLimitExceeded",
        }
    }

    /// Job id the event refers to.
    pub fn job_id(&self) -> Uuid {
        match self {
            GenEvent::JobQueued { job_id, .. }
            | GenEvent::JobStarted { job_id, .. }
            | GenEvent::JobProgress { job_id, .. }
            | GenEvent::JobCompleted { job_id, .. }
            | GenEvent::JobFailed { job_id, .. }
            | GenEvent::JobRevoked { job_id, .. }
            | GenEvent::SoftLimitExceeded { job_id, .. } => *job_id,
        }
    }
}

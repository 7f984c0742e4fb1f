//! Job snapshot store
//!
//! The single point of coordination between the worker side and the
//! polling side. Writers publish whole snapshots under a lock; readers
//! always see a consistent, fully-formed record. Every transition is
//! also broadcast as a `GenEvent` for SSE listeners.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use bestekar_common::events::GenEvent;
use bestekar_common::types::{GenerationMode, JobResult, JobSnapshot, JobState};

/// Thread-safe store of job snapshots with bounded retention for
/// terminal jobs.
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobSnapshot>>,
    event_tx: broadcast::Sender<GenEvent>,
    retention_secs: u64,
}

impl JobStore {
    /// Create a store; terminal snapshots are evicted `retention_secs`
    /// after finishing.
    pub fn new(retention_secs: u64) -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            jobs: RwLock::new(HashMap::new()),
            event_tx,
            retention_secs,
        }
    }

    /// Subscribe to the event stream for SSE.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GenEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event to all listeners.
    pub fn broadcast_event(&self, event: GenEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Register a freshly submitted job in PENDING state.
    pub async fn create(&self, id: Uuid, mode: GenerationMode) {
        let snapshot = JobSnapshot::queued(id);
        self.jobs.write().await.insert(id, snapshot);
        self.broadcast_event(GenEvent::JobQueued {
            job_id: id,
            mode,
            timestamp: Utc::now(),
        });
    }

    /// Transition a PENDING job to PROGRESS. Returns false when the job
    /// is unknown or no longer pending (e.g. revoked while queued), in
    /// which case the worker must skip it.
    pub async fn mark_started(&self, id: Uuid) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        if job.state != JobState::Pending {
            return false;
        }
        job.state = JobState::Progress;
        job.progress = 5;
        job.message = "Starting music generation".to_string();
        job.started_at = Some(Utc::now());
        drop(jobs);

        self.broadcast_event(GenEvent::JobStarted {
            job_id: id,
            timestamp: Utc::now(),
        });
        true
    }

    /// Publish a progress milestone. Percent is clamped to be
    /// non-decreasing; updates against non-running jobs are dropped so a
    /// late stage report cannot resurrect a revoked job.
    pub async fn update_progress(&self, id: Uuid, percent: u8, stage: &str) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return;
        };
        if job.state != JobState::Progress {
            return;
        }
        job.progress = job.progress.max(percent.min(100));
        job.message = stage.to_string();
        let percent = job.progress;
        drop(jobs);

        self.broadcast_event(GenEvent::JobProgress {
            job_id: id,
            stage: stage.to_string(),
            percent,
            timestamp: Utc::now(),
        });
    }

    /// Transition to SUCCESS with the result payload.
    pub async fn complete(&self, id: Uuid, result: JobResult) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return;
        };
        if job.state.is_terminal() {
            return;
        }
        job.state = JobState::Success;
        job.progress = 100;
        job.message = "Generation completed successfully".to_string();
        job.finished_at = Some(Utc::now());
        let output_file = result.output_file.clone();
        let degraded = result.degraded;
        job.result = Some(result);
        drop(jobs);

        self.broadcast_event(GenEvent::JobCompleted {
            job_id: id,
            output_file,
            degraded,
            timestamp: Utc::now(),
        });
    }

    /// Transition to FAILURE, capturing the error message verbatim.
    pub async fn fail(&self, id: Uuid, error: &str) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return;
        };
        if job.state.is_terminal() {
            return;
        }
        job.state = JobState::Failure;
        job.progress = 0;
        job.message = format!("Generation failed: {}", error);
        job.error = Some(error.to_string());
        job.finished_at = Some(Utc::now());
        drop(jobs);

        self.broadcast_event(GenEvent::JobFailed {
            job_id: id,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Transition to REVOKED. Revoking an already-terminal job is a
    /// no-op that returns the unchanged snapshot; None means the job id
    /// is unknown.
    pub async fn revoke(&self, id: Uuid) -> Option<JobSnapshot> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id)?;
        if job.state.is_terminal() {
            return Some(job.clone());
        }
        job.state = JobState::Revoked;
        job.progress = 0;
        job.message = "Generation cancelled".to_string();
        job.finished_at = Some(Utc::now());
        let snapshot = job.clone();
        drop(jobs);

        self.broadcast_event(GenEvent::JobRevoked {
            job_id: id,
            timestamp: Utc::now(),
        });
        Some(snapshot)
    }

    /// Current snapshot of a job.
    pub async fn get(&self, id: Uuid) -> Option<JobSnapshot> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// All PENDING and PROGRESS jobs, oldest submission first.
    pub async fn list_active(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let mut active: Vec<JobSnapshot> = jobs
            .values()
            .filter(|j| j.state.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|j| j.submitted_at);
        active
    }

    /// Drop terminal jobs past their retention window. Returns how many
    /// were evicted.
    pub async fn evict_expired(&self) -> usize {
        let cutoff = Utc::now() - ChronoDuration::seconds(self.retention_secs as i64);
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| match (job.state.is_terminal(), job.finished_at) {
            (true, Some(finished)) => finished > cutoff,
            _ => true,
        });
        before - jobs.len()
    }
}

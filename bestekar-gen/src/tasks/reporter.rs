//! Progress reporter
//!
//! Consumer-side poller that turns job snapshots into display updates on
//! a fixed interval: percentage, stage message, and an estimated
//! remaining time once real progress is visible. Polling stops at the
//! first terminal snapshot, and a job jumping straight from PENDING to a
//! terminal state is handled without ever observing PROGRESS.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use bestekar_common::human_time::format_remaining;
use bestekar_common::types::{JobSnapshot, JobState};

use crate::error::{Error, Result};
use crate::tasks::store::JobStore;

/// One display update derived from a job snapshot.
#[derive(Debug, Clone)]
pub struct DisplayUpdate {
    pub state: JobState,
    pub percent: u8,
    pub message: String,
    /// Formatted remaining-time estimate, present once progress > 0
    pub remaining: Option<String>,
}

/// Polls job snapshots and emits display updates.
pub struct ProgressReporter {
    store: Arc<JobStore>,
    poll_interval: Duration,
}

impl ProgressReporter {
    /// Reporter polling once per second, matching the reference UI.
    pub fn new(store: Arc<JobStore>) -> Self {
        Self::with_interval(store, Duration::from_secs(1))
    }

    pub fn with_interval(store: Arc<JobStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// Poll `job_id` until it reaches a terminal state, sending a
    /// display update for every observation. Returns the terminal
    /// snapshot.
    pub async fn watch(
        &self,
        job_id: Uuid,
        updates: mpsc::UnboundedSender<DisplayUpdate>,
    ) -> Result<JobSnapshot> {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            ticker.tick().await;
            let snapshot = self
                .store
                .get(job_id)
                .await
                .ok_or(Error::TaskNotFound(job_id))?;

            let update = self.display_for(&snapshot, started.elapsed());
            let terminal = snapshot.state.is_terminal();
            let _ = updates.send(update);

            if terminal {
                return Ok(snapshot);
            }
        }
    }

    fn display_for(&self, snapshot: &JobSnapshot, elapsed: Duration) -> DisplayUpdate {
        match snapshot.state {
            JobState::Pending => DisplayUpdate {
                state: JobState::Pending,
                percent: 5,
                message: "Task queued".to_string(),
                remaining: None,
            },
            JobState::Progress => {
                let remaining = (snapshot.progress > 0).then(|| {
                    let percent = snapshot.progress as f64;
                    format_remaining(elapsed.as_secs_f64() * (100.0 / percent - 1.0))
                });
                DisplayUpdate {
                    state: JobState::Progress,
                    percent: snapshot.progress,
                    message: snapshot.message.clone(),
                    remaining,
                }
            }
            JobState::Success => DisplayUpdate {
                state: JobState::Success,
                percent: 100,
                message: "Generation completed!".to_string(),
                remaining: Some("0s".to_string()),
            },
            JobState::Failure => DisplayUpdate {
                state: JobState::Failure,
                percent: 0,
                message: snapshot.message.clone(),
                remaining: None,
            },
            JobState::Revoked => DisplayUpdate {
                state: JobState::Revoked,
                percent: 0,
                message: "Generation cancelled".to_string(),
                remaining: None,
            },
        }
    }
}

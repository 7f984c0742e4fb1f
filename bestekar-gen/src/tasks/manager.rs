//! Task manager
//!
//! Accepts generation requests into a bounded queue drained by a single
//! worker (generation is resource-heavy and deliberately not
//! parallelized). Supports forceful cancellation through task abort,
//! soft/hard wall-clock limits, and bounded retries for transient
//! infrastructure failures.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use bestekar_common::events::GenEvent;
use bestekar_common::types::{GenerationRequest, JobResult, JobSnapshot};

use crate::config::GenConfig;
use crate::engine::assembler::{ProgressSender, SongAssembler};
use crate::error::{Error, Result};
use crate::tasks::store::JobStore;

struct QueuedJob {
    id: Uuid,
    request: GenerationRequest,
}

enum ExecOutcome {
    Finished(Result<JobResult>),
    Cancelled,
    TimedOut,
}

/// Coordinates the lifecycle of generation jobs.
pub struct TaskManager {
    store: Arc<JobStore>,
    assembler: Arc<SongAssembler>,
    queue_tx: mpsc::Sender<QueuedJob>,
    running: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
    soft_time_limit_secs: u64,
    hard_time_limit_secs: u64,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl TaskManager {
    /// Create the manager and start its background loops: the single
    /// job worker and the periodic retention sweep.
    pub fn spawn(
        config: &GenConfig,
        store: Arc<JobStore>,
        assembler: Arc<SongAssembler>,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);

        let manager = Arc::new(Self {
            store,
            assembler,
            queue_tx,
            running: Arc::new(Mutex::new(HashMap::new())),
            soft_time_limit_secs: config.soft_time_limit_secs,
            hard_time_limit_secs: config.hard_time_limit_secs,
            max_retries: config.max_retries,
            retry_delay_secs: config.retry_delay_secs,
        });

        let worker = manager.clone_handles();
        tokio::spawn(async move {
            worker.worker_loop(queue_rx).await;
        });

        let sweep_store = Arc::clone(&manager.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                let evicted = sweep_store.evict_expired().await;
                if evicted > 0 {
                    debug!("Evicted {} expired job snapshot(s)", evicted);
                }
            }
        });

        manager
    }

    /// Cheap copy sharing the same store, queue, and running-job map.
    fn clone_handles(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            assembler: Arc::clone(&self.assembler),
            queue_tx: self.queue_tx.clone(),
            running: Arc::clone(&self.running),
            soft_time_limit_secs: self.soft_time_limit_secs,
            hard_time_limit_secs: self.hard_time_limit_secs,
            max_retries: self.max_retries,
            retry_delay_secs: self.retry_delay_secs,
        }
    }

    /// Submit a request; returns the job id for polling.
    ///
    /// If the queue cannot accept the job the request is executed
    /// in-process instead of failing the submission.
    pub async fn submit(&self, request: GenerationRequest) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.store.create(id, request.mode).await;

        let job = QueuedJob { id, request };
        if let Err(send_error) = self.queue_tx.try_send(job) {
            warn!(
                "Generation queue unavailable ({}), executing job inline",
                send_error
            );
            let job = match send_error {
                mpsc::error::TrySendError::Full(job) => job,
                mpsc::error::TrySendError::Closed(job) => job,
            };
            let runner = self.clone_handles();
            tokio::spawn(async move {
                runner.execute(job).await;
            });
        }

        info!("Submitted generation job {}", id);
        Ok(id)
    }

    /// Current snapshot of a job.
    pub async fn poll(&self, id: Uuid) -> Result<JobSnapshot> {
        self.store.get(id).await.ok_or(Error::TaskNotFound(id))
    }

    /// Cancel a job. A queued job is revoked before it starts; a
    /// running job's task is aborted outright. Cancelling a terminal
    /// job is a no-op returning the unchanged snapshot.
    pub async fn cancel(&self, id: Uuid) -> Result<JobSnapshot> {
        let snapshot = self.store.revoke(id).await.ok_or(Error::TaskNotFound(id))?;
        if let Some(handle) = self.running.lock().await.remove(&id) {
            handle.abort();
            info!("Aborted running job {}", id);
        }
        Ok(snapshot)
    }

    /// All jobs in PENDING or PROGRESS state, including queued ones.
    pub async fn list_active(&self) -> Vec<JobSnapshot> {
        self.store.list_active().await
    }

    async fn worker_loop(self, mut queue_rx: mpsc::Receiver<QueuedJob>) {
        info!("Generation worker started");
        while let Some(job) = queue_rx.recv().await {
            self.execute(job).await;
        }
        info!("Generation worker stopped");
    }

    async fn execute(&self, job: QueuedJob) {
        if !self.store.mark_started(job.id).await {
            debug!("Skipping job {} (revoked or unknown)", job.id);
            return;
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let (progress, mut progress_rx) = ProgressSender::channel();
            let store = Arc::clone(&self.store);
            let id = job.id;
            tokio::spawn(async move {
                while let Some(update) = progress_rx.recv().await {
                    store.update_progress(id, update.percent, &update.stage).await;
                }
            });

            let assembler = Arc::clone(&self.assembler);
            let request = job.request.clone();
            let handle =
                tokio::spawn(async move { assembler.assemble(&request, &progress).await });
            self.running
                .lock()
                .await
                .insert(job.id, handle.abort_handle());

            let outcome = self.await_with_limits(job.id, handle).await;
            self.running.lock().await.remove(&job.id);

            match outcome {
                ExecOutcome::Finished(Ok(result)) => {
                    self.store.complete(job.id, result).await;
                    return;
                }
                ExecOutcome::Finished(Err(e)) => {
                    if e.is_transient() && attempt <= self.max_retries {
                        warn!(
                            "Job {} attempt {} failed with transient error ({}), retrying",
                            job.id, attempt, e
                        );
                        sleep(Duration::from_secs(self.retry_delay_secs)).await;
                        continue;
                    }
                    error!("Job {} failed: {}", job.id, e);
                    self.store.fail(job.id, &e.to_string()).await;
                    return;
                }
                ExecOutcome::Cancelled => {
                    // Revocation already published the terminal snapshot
                    debug!("Job {} cancelled mid-run", job.id);
                    return;
                }
                ExecOutcome::TimedOut => {
                    let e = Error::TaskTimeout(self.hard_time_limit_secs);
                    error!("Job {}: {}", job.id, e);
                    self.store.fail(job.id, &e.to_string()).await;
                    return;
                }
            }
        }
    }

    /// Await the job task under the soft/hard wall-clock limits.
    async fn await_with_limits(
        &self,
        id: Uuid,
        mut handle: JoinHandle<Result<JobResult>>,
    ) -> ExecOutcome {
        let soft = sleep(Duration::from_secs(self.soft_time_limit_secs));
        let hard = sleep(Duration::from_secs(self.hard_time_limit_secs));
        tokio::pin!(soft);
        tokio::pin!(hard);
        let mut soft_fired = false;

        loop {
            tokio::select! {
                joined = &mut handle => {
                    return match joined {
                        Ok(result) => ExecOutcome::Finished(result),
                        Err(join_error) if join_error.is_cancelled() => ExecOutcome::Cancelled,
                        Err(join_error) => ExecOutcome::Finished(Err(Error::Internal(format!(
                            "job task failed: {}",
                            join_error
                        )))),
                    };
                }
                _ = &mut soft, if !soft_fired => {
                    soft_fired = true;
                    warn!(
                        "Job {} exceeded the soft time limit ({}s), winding down",
                        id, self.soft_time_limit_secs
                    );
                    self.store.broadcast_event(GenEvent::SoftLimitExceeded {
                        job_id: id,
                        elapsed_secs: self.soft_time_limit_secs,
                        timestamp: Utc::now(),
                    });
                }
                _ = &mut hard => {
                    handle.abort();
                    return ExecOutcome::TimedOut;
                }
            }
        }
    }
}

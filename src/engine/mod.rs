//! Recurring job engine
//!
//! Ties the scheduler core to its collaborators: the durable store, the
//! payload runner, and the callers that fire lifecycle events. The engine
//! owns the process-wide placement index, rebuilds it from the store at
//! startup, and is the only writer of `next_run_at` values back to the
//! store. The index itself never performs I/O.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{Job, JobCreateRequest, JobStatus, JobUpdateRequest};
use crate::scheduler::{
    slot_key, BucketMap, JobSnapshot, LoadReport, RebalanceReport, Rebalancer, SchedulerError,
};
use crate::storage::JobRepository;

/// Largest distribution window operators may request (one week).
pub const MAX_WINDOW_HOURS: u32 = 168;

// ============================================================================
// Job Runner
// ============================================================================

/// Executes a job's payload.
///
/// What a run actually does (fetch, classify, publish) is the pipeline's
/// business; the engine only cares whether it succeeded.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job) -> anyhow::Result<()>;
}

/// Runner that only logs the dispatch.
///
/// Stands in until the acquisition pipeline is wired to the engine.
pub struct LogRunner;

#[async_trait]
impl JobRunner for LogRunner {
    async fn run(&self, job: &Job) -> anyhow::Result<()> {
        tracing::info!(job_id = %job.id, url = %job.url, "Dispatching acquisition job");
        Ok(())
    }
}

// ============================================================================
// Job Engine
// ============================================================================

/// The scheduling engine for recurring acquisition jobs.
pub struct JobEngine {
    repo: Arc<dyn JobRepository>,
    runner: Arc<dyn JobRunner>,
    bucket: Arc<BucketMap>,
    rebalancer: Rebalancer,
    config: EngineConfig,
}

impl JobEngine {
    /// Create an engine over a store and a payload runner.
    pub fn new(
        repo: Arc<dyn JobRepository>,
        runner: Arc<dyn JobRunner>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repo,
            runner,
            bucket: Arc::new(BucketMap::new()),
            rebalancer: Rebalancer::default(),
            config,
        }
    }

    /// The engine's placement index.
    pub fn bucket(&self) -> &BucketMap {
        &self.bucket
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    /// Rebuild the placement index from the durable store.
    ///
    /// Must complete before the engine accepts traffic. A store failure
    /// here is fatal: an engine with a partially built index would place
    /// new jobs blind to existing load.
    pub async fn rebuild(&self) -> Result<usize> {
        let jobs = self
            .repo
            .list_scheduled()
            .await
            .map_err(|e| Error::Scheduler(SchedulerError::rebuild_failed(e.to_string())))?;

        for job in &jobs {
            if let Some(next_run) = job.next_run_at {
                self.bucket.add_job(&job.id, slot_key(next_run));
            }
        }

        tracing::info!(jobs = jobs.len(), "Placement index rebuilt from store");
        Ok(jobs.len())
    }

    // ------------------------------------------------------------------
    // Tick Loop
    // ------------------------------------------------------------------

    /// Run the periodic scheduler loop until `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(StdDuration::from_secs(self.config.check_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            check_interval_secs = self.config.check_interval_secs,
            "Job engine started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Job engine stopping");
                    break;
                }
            }
        }
    }

    /// Execute every job whose next-run time has arrived.
    ///
    /// Returns the number of jobs dispatched this tick.
    pub async fn tick(&self) -> usize {
        let due = match self.repo.due_jobs(Utc::now()).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query due jobs");
                return 0;
            }
        };

        if !due.is_empty() {
            tracing::debug!(count = due.len(), "Found jobs ready to run");
        }

        let count = due.len();
        for job in due {
            self.execute(job).await;
        }
        count
    }

    async fn execute(&self, mut job: Job) {
        tracing::info!(
            job_id = %job.id,
            source_id = %job.source_id,
            retry_attempt = job.retry_count,
            "Executing job"
        );

        job.status = JobStatus::Running;
        if let Err(e) = self.repo.update(&job).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to mark job running");
            return;
        }

        metrics::inc_jobs_running();
        let outcome = self.runner.run(&job).await;
        metrics::dec_jobs_running();

        match outcome {
            Ok(()) => self.handle_success(job).await,
            Err(e) => self.handle_failure(job, e).await,
        }
    }

    async fn handle_success(&self, mut job: Job) {
        job.retry_count = 0;
        job.error_message = None;

        if job.is_recurring() {
            let interval = job.interval().unwrap_or_else(Duration::zero);
            let next_run = self.bucket.next_run_preserve_rhythm(&job.id, interval);
            job.status = JobStatus::Scheduled;
            job.next_run_at = Some(next_run);
        } else {
            job.status = JobStatus::Completed;
            job.next_run_at = None;
            self.bucket.remove_job(&job.id);
        }

        if let Err(e) = self.repo.update(&job).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist job completion");
        }

        metrics::observe_execution("completed");
        tracing::info!(
            job_id = %job.id,
            next_run_at = ?job.next_run_at,
            "Job completed successfully"
        );
    }

    async fn handle_failure(&self, mut job: Job, err: anyhow::Error) {
        let message = err.to_string();
        job.error_message = Some(message.clone());

        if job.retry_count < job.max_retries {
            job.retry_count += 1;
            let backoff = self.backoff(&job);
            let next_run = Utc::now() + backoff;

            job.status = JobStatus::Scheduled;
            job.next_run_at = Some(next_run);
            // Keep the index aligned with the store's retry time.
            self.bucket.add_job(&job.id, slot_key(next_run));

            metrics::observe_execution("retried");
            tracing::warn!(
                job_id = %job.id,
                retry_attempt = job.retry_count,
                max_retries = job.max_retries,
                backoff_secs = backoff.num_seconds(),
                error = %message,
                "Scheduling retry"
            );
        } else {
            job.status = JobStatus::Failed;
            job.next_run_at = None;
            self.bucket.remove_job(&job.id);

            metrics::observe_execution("failed");
            tracing::error!(
                job_id = %job.id,
                retries = job.retry_count,
                error = %message,
                "Job failed after all retries"
            );
        }

        if let Err(e) = self.repo.update(&job).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist job failure");
        }
    }

    /// Exponential backoff: base x 2^(attempt-1), capped.
    fn backoff(&self, job: &Job) -> Duration {
        let base = job.retry_backoff_secs as u64;
        let exponent = job.retry_count.saturating_sub(1).min(16);
        let secs = base
            .saturating_mul(1u64 << exponent)
            .min(self.config.max_backoff_secs);
        Duration::seconds(secs as i64)
    }

    // ------------------------------------------------------------------
    // Lifecycle Events
    // ------------------------------------------------------------------

    /// Create a job and give it its first load-balanced placement.
    pub async fn create_job(&self, request: JobCreateRequest) -> Result<Job> {
        request.validate().map_err(Error::InvalidRequest)?;

        let mut job = request.into_job();

        if job.schedule_enabled {
            let interval = job.interval().unwrap_or_else(Duration::zero);
            let next_run = self.bucket.place_new_job(&job.id, interval);
            job.status = JobStatus::Scheduled;
            job.next_run_at = Some(next_run);
        }

        if let Err(e) = self.repo.create(&job).await {
            // Do not leave a phantom assignment behind.
            self.bucket.remove_job(&job.id);
            return Err(e);
        }

        tracing::info!(
            job_id = %job.id,
            source_id = %job.source_id,
            next_run_at = ?job.next_run_at,
            "Job created"
        );
        Ok(job)
    }

    /// Fetch a job by ID.
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.repo.get(id).await
    }

    /// Every job in the store.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.repo.list_all().await
    }

    /// Delete a job from the store and the index.
    pub async fn delete_job(&self, id: &str) -> Result<bool> {
        let existed = self.repo.delete(id).await?;
        self.bucket.remove_job(id);

        if existed {
            tracing::info!(job_id = %id, "Job deleted");
        }
        Ok(existed)
    }

    /// Pause a job. Its slot assignment stays in place so the index keeps
    /// counting it as load.
    pub async fn pause_job(&self, id: &str) -> Result<Job> {
        let mut job = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| Error::JobNotFound(id.to_string()))?;

        job.status = JobStatus::Paused;
        self.repo.update(&job).await?;

        tracing::info!(job_id = %id, "Job paused");
        Ok(job)
    }

    /// Resume a paused job with a fresh load-based placement; the old
    /// rhythm stopped meaning anything while the job slept.
    pub async fn resume_job(&self, id: &str) -> Result<Job> {
        let mut job = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| Error::JobNotFound(id.to_string()))?;

        self.bucket.remove_job(&job.id);
        let interval = job.interval().unwrap_or_else(Duration::zero);
        let next_run = self.bucket.place_new_job(&job.id, interval);

        job.status = JobStatus::Scheduled;
        job.next_run_at = Some(next_run);
        self.repo.update(&job).await?;

        tracing::info!(job_id = %id, next_run_at = %next_run, "Job resumed");
        Ok(job)
    }

    /// Apply a configuration update. An interval change re-places the job
    /// from scratch instead of preserving a rhythm derived from the old
    /// interval.
    pub async fn update_job(&self, id: &str, request: JobUpdateRequest) -> Result<Job> {
        let mut job = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| Error::JobNotFound(id.to_string()))?;

        if let Some(url) = request.url {
            job.url = url;
        }
        if let Some(max_retries) = request.max_retries {
            job.max_retries = max_retries;
        }
        if let Some(backoff) = request.retry_backoff_secs {
            job.retry_backoff_secs = backoff;
        }
        if let Some(enabled) = request.schedule_enabled {
            job.schedule_enabled = enabled;
        }

        let interval_changed = request.interval_minutes.is_some()
            && request.interval_minutes != job.interval_minutes;
        if interval_changed {
            job.interval_minutes = request.interval_minutes;
        }

        if !job.schedule_enabled {
            self.bucket.remove_job(&job.id);
            job.next_run_at = None;
        } else if interval_changed && job.status != JobStatus::Running {
            self.bucket.remove_job(&job.id);
            let interval = job.interval().unwrap_or_else(Duration::zero);
            let next_run = self.bucket.place_new_job(&job.id, interval);
            job.status = JobStatus::Scheduled;
            job.next_run_at = Some(next_run);
        }

        self.repo.update(&job).await?;
        tracing::info!(job_id = %id, "Job updated");
        Ok(job)
    }

    // ------------------------------------------------------------------
    // Rebalancing & Reporting
    // ------------------------------------------------------------------

    async fn job_snapshots(&self) -> Result<Vec<JobSnapshot>> {
        let jobs = self.repo.list_all().await?;
        Ok(jobs
            .iter()
            .filter(|j| self.bucket.job_slot(&j.id).is_some())
            .map(|j| JobSnapshot {
                id: j.id.clone(),
                interval: j.interval(),
                status: j.status,
                next_run_at: j.next_run_at,
            })
            .collect())
    }

    /// Rebalance every tracked job and persist the resulting moves.
    pub async fn rebalance(&self) -> Result<RebalanceReport> {
        let snapshots = self.job_snapshots().await?;
        let report = self.rebalancer.full_rebalance(&self.bucket, &snapshots);

        for job_move in &report.moves {
            if let Some(mut job) = self.repo.get(&job_move.job_id).await? {
                job.next_run_at = Some(job_move.new_time);
                self.repo.update(&job).await?;
            }
        }

        metrics::record_rebalance(&report);
        Ok(report)
    }

    /// Run the rebalance pass against a copy of the index. Nothing is
    /// moved and nothing is written to the store.
    pub async fn preview_rebalance(&self) -> Result<RebalanceReport> {
        let snapshots = self.job_snapshots().await?;
        Ok(self.rebalancer.preview(&self.bucket, &snapshots))
    }

    /// Distribution report over the requested window.
    pub async fn distribution(&self, window_hours: u32) -> Result<LoadReport> {
        if window_hours == 0 || window_hours > MAX_WINDOW_HOURS {
            return Err(SchedulerError::invalid_window(window_hours, MAX_WINDOW_HOURS).into());
        }

        let report = LoadReport::compute(&self.bucket, window_hours, Utc::now());
        metrics::set_evenness(report.evenness);
        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================

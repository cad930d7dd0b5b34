//! Core data structures for the job engine
//!
//! The [`Job`] struct mirrors the durable store's job row. The scheduler
//! core never owns these (it works on derived snapshots), but the engine,
//! storage, and API layers all speak this shape.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default number of retry attempts before a job is marked failed.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff between retries, in seconds.
const DEFAULT_RETRY_BACKOFF_SECS: u32 = 60;

// ============================================================================
// Job Status
// ============================================================================

/// Lifecycle status of a job, owned by the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created but not yet scheduled
    Pending,
    /// Waiting for its next run time
    Scheduled,
    /// Currently executing
    Running,
    /// Suspended by an operator; keeps its slot assignment
    Paused,
    /// One-shot job that finished
    Completed,
    /// Exhausted its retries
    Failed,
}

impl JobStatus {
    /// String form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Terminal statuses never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a job in this status belongs in the placement index.
    pub fn is_schedulable(&self) -> bool {
        !self.is_terminal() && *self != Self::Paused
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// A recurring acquisition job as stored in the durable store.
///
/// The engine holds these transiently; the store remains the source of
/// truth for configuration and status, and `next_run_at` is authoritative
/// once written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Stable identifier (UUID v4)
    pub id: String,

    /// Content source this job acquires from
    pub source_id: String,

    /// Entry URL for the acquisition run
    pub url: String,

    /// Lifecycle status
    pub status: JobStatus,

    /// Recurrence interval in minutes; absent for one-shot jobs
    pub interval_minutes: Option<i64>,

    /// Whether the job participates in scheduling at all
    pub schedule_enabled: bool,

    /// Next scheduled run, written back after every placement
    pub next_run_at: Option<DateTime<Utc>>,

    /// Retry budget for failed runs
    pub max_retries: u32,

    /// Consecutive failures so far
    pub retry_count: u32,

    /// Base backoff between retries, in seconds
    pub retry_backoff_secs: u32,

    /// Last execution error, if any
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        source_id: impl Into<String>,
        url: impl Into<String>,
        interval_minutes: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            url: url.into(),
            status: JobStatus::Pending,
            interval_minutes,
            schedule_enabled: true,
            next_run_at: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_count: 0,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recurrence interval as a duration, if the job is recurring.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_minutes.map(Duration::minutes)
    }

    /// Whether the job reschedules itself after a successful run.
    pub fn is_recurring(&self) -> bool {
        self.interval_minutes.is_some() && self.schedule_enabled
    }
}

// ============================================================================
// API Request Types
// ============================================================================

/// Request body for creating a job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobCreateRequest {
    pub source_id: String,
    pub url: String,

    /// Recurrence interval in minutes; omit for a one-shot job
    pub interval_minutes: Option<i64>,

    #[serde(default = "default_true")]
    pub schedule_enabled: bool,

    pub max_retries: Option<u32>,
    pub retry_backoff_secs: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl JobCreateRequest {
    /// Validate field ranges before a job is built from the request.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_id.trim().is_empty() {
            return Err("source_id must not be empty".to_string());
        }
        if self.url.trim().is_empty() {
            return Err("url must not be empty".to_string());
        }
        if let Some(minutes) = self.interval_minutes {
            if minutes <= 0 {
                return Err(format!("interval_minutes must be positive, got {minutes}"));
            }
        }
        Ok(())
    }

    /// Build a job from this request.
    pub fn into_job(self) -> Job {
        let mut job = Job::new(self.source_id, self.url, self.interval_minutes);
        job.schedule_enabled = self.schedule_enabled;
        if let Some(max_retries) = self.max_retries {
            job.max_retries = max_retries;
        }
        if let Some(backoff) = self.retry_backoff_secs {
            job.retry_backoff_secs = backoff;
        }
        job
    }
}

/// Request body for updating a job's configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdateRequest {
    pub url: Option<String>,
    pub interval_minutes: Option<i64>,
    pub schedule_enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_backoff_secs: Option<u32>,
}

// ============================================================================
// Tests
// ============================================================================

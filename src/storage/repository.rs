//! Repository pattern for the durable job store
//!
//! The durable store owns job configuration and status; the engine reads
//! it at startup to rebuild the placement index and writes back every
//! next-run timestamp the scheduler derives. Trait-based so tests and
//! embedded callers can swap the SQLite store for the in-memory one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Job, JobStatus};

// ============================================================================
// Repository Trait
// ============================================================================

/// Access to the durable job store.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job.
    async fn create(&self, job: &Job) -> Result<()>;

    /// Fetch a job by ID.
    async fn get(&self, id: &str) -> Result<Option<Job>>;

    /// Overwrite a job's row.
    async fn update(&self, job: &Job) -> Result<()>;

    /// Delete a job. Returns whether a row existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Every job, regardless of status.
    async fn list_all(&self) -> Result<Vec<Job>>;

    /// Jobs that belong in the placement index: schedule enabled, a
    /// next-run time set, and a non-paused, non-terminal status. This is
    /// the startup-rebuild contract.
    async fn list_scheduled(&self) -> Result<Vec<Job>>;

    /// Scheduled jobs whose next-run time has arrived.
    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite-backed job store.
pub struct SqliteJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobRepository {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory SQLite store, used by tests.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id                  TEXT PRIMARY KEY,
                source_id           TEXT NOT NULL,
                url                 TEXT NOT NULL,
                status              TEXT NOT NULL,
                interval_minutes    INTEGER,
                schedule_enabled    INTEGER NOT NULL DEFAULT 1,
                next_run_at         INTEGER,
                max_retries         INTEGER NOT NULL DEFAULT 3,
                retry_count         INTEGER NOT NULL DEFAULT 0,
                retry_backoff_secs  INTEGER NOT NULL DEFAULT 60,
                error_message       TEXT,
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs(next_run_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);",
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
        let status_str: String = row.get("status")?;
        let status = status_str.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(Job {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            url: row.get("url")?,
            status,
            interval_minutes: row.get("interval_minutes")?,
            schedule_enabled: row.get::<_, i64>("schedule_enabled")? != 0,
            next_run_at: row
                .get::<_, Option<i64>>("next_run_at")?
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            max_retries: row.get("max_retries")?,
            retry_count: row.get("retry_count")?,
            retry_backoff_secs: row.get("retry_backoff_secs")?,
            error_message: row.get("error_message")?,
            created_at: DateTime::from_timestamp(row.get("created_at")?, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(row.get("updated_at")?, 0).unwrap_or_default(),
        })
    }

    fn query_jobs(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_job)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }
}

const SELECT_COLUMNS: &str = "id, source_id, url, status, interval_minutes, schedule_enabled, \
     next_run_at, max_retries, retry_count, retry_backoff_secs, error_message, \
     created_at, updated_at";

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: &Job) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (id, source_id, url, status, interval_minutes, schedule_enabled, \
             next_run_at, max_retries, retry_count, retry_backoff_secs, error_message, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                job.id,
                job.source_id,
                job.url,
                job.status.as_str(),
                job.interval_minutes,
                job.schedule_enabled as i64,
                job.next_run_at.map(|t| t.timestamp()),
                job.max_retries,
                job.retry_count,
                job.retry_backoff_secs,
                job.error_message,
                job.created_at.timestamp(),
                job.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE jobs SET source_id = ?2, url = ?3, status = ?4, interval_minutes = ?5, \
             schedule_enabled = ?6, next_run_at = ?7, max_retries = ?8, retry_count = ?9, \
             retry_backoff_secs = ?10, error_message = ?11, updated_at = ?12 \
             WHERE id = ?1",
            params![
                job.id,
                job.source_id,
                job.url,
                job.status.as_str(),
                job.interval_minutes,
                job.schedule_enabled as i64,
                job.next_run_at.map(|t| t.timestamp()),
                job.max_retries,
                job.retry_count,
                job.retry_backoff_secs,
                job.error_message,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!("SELECT {SELECT_COLUMNS} FROM jobs ORDER BY created_at"),
            &[],
        )
    }

    async fn list_scheduled(&self) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM jobs \
                 WHERE next_run_at IS NOT NULL \
                   AND schedule_enabled = 1 \
                   AND status NOT IN ('paused', 'completed', 'failed') \
                 ORDER BY next_run_at"
            ),
            &[],
        )
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM jobs \
                 WHERE status = 'scheduled' \
                   AND schedule_enabled = 1 \
                   AND next_run_at IS NOT NULL \
                   AND next_run_at <= ?1 \
                 ORDER BY next_run_at"
            ),
            &[&now.timestamp()],
        )
    }
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// HashMap-backed store for tests and embedded use.
#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<()> {
        self.jobs
            .write()
            .unwrap()
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().unwrap().get(id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut updated = job.clone();
        updated.updated_at = Utc::now();
        self.jobs.write().unwrap().insert(job.id.clone(), updated);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.jobs.write().unwrap().remove(id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.read().unwrap().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn list_scheduled(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap()
            .values()
            .filter(|j| {
                j.next_run_at.is_some() && j.schedule_enabled && j.status.is_schedulable()
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.next_run_at);
        Ok(jobs)
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap()
            .values()
            .filter(|j| {
                j.status == JobStatus::Scheduled
                    && j.schedule_enabled
                    && j.next_run_at.is_some_and(|t| t <= now)
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.next_run_at);
        Ok(jobs)
    }
}

// ============================================================================
// Tests
// ============================================================================

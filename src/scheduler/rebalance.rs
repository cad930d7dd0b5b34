//! Bulk rebalancing of the placement index
//!
//! The rebalancer is the only component allowed to move jobs in bulk. It
//! walks every tracked job in a fixed order, asks the [`MoveGuard`] for
//! permission, and re-derives each allowed placement with load-based
//! search, deliberately *not* rhythm-preserving, since the whole point of
//! a full rebalance is to break an unhealthy rhythm.
//!
//! Jobs are processed longest interval first so that rarely running jobs,
//! which have the widest placement horizon, claim their slots before
//! frequent jobs fill in around them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::bucket::{slot_time, BucketMap};
use super::distribution::{LoadReport, DEFAULT_WINDOW_HOURS};
use super::guard::{MoveGuard, SkipReason};
use crate::models::JobStatus;

// ============================================================================
// Input Snapshot
// ============================================================================

/// The slice of job state the rebalancer needs.
///
/// Callers load jobs from the durable store and hand these in; the core
/// itself performs no I/O.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub id: String,
    pub interval: Option<Duration>,
    pub status: JobStatus,
    pub next_run_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Report Types
// ============================================================================

/// A job relocated during a rebalance pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMove {
    pub job_id: String,
    pub old_time: Option<DateTime<Utc>>,
    pub new_time: DateTime<Utc>,
}

/// A job the guard refused to move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSkip {
    pub job_id: String,
    pub reason: SkipReason,
}

/// Outcome of a rebalance pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub generated_at: DateTime<Utc>,

    /// Whether this report came from a preview (no state was touched)
    pub preview: bool,

    /// Jobs that changed slot
    pub moves: Vec<JobMove>,

    /// Jobs the guard left in place, with the blocking reason
    pub skips: Vec<JobSkip>,

    /// Jobs re-placed into the slot they already occupied
    pub unchanged: usize,

    /// Distribution over the default window, computed after the pass
    pub distribution: LoadReport,
}

impl RebalanceReport {
    /// Format as a display string for CLI output.
    pub fn display(&self) -> String {
        let mut output = format!(
            "Rebalance{}: {} moved, {} skipped, {} unchanged\n",
            if self.preview { " (preview)" } else { "" },
            self.moves.len(),
            self.skips.len(),
            self.unchanged,
        );

        for m in &self.moves {
            let old = m
                .old_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "  moved   {} : {} -> {}\n",
                m.job_id,
                old,
                m.new_time.format("%Y-%m-%d %H:%M"),
            ));
        }

        for s in &self.skips {
            output.push_str(&format!("  skipped {} : {}\n", s.job_id, s.reason));
        }

        output.push('\n');
        output.push_str(&self.distribution.display());
        output
    }
}

// ============================================================================
// Rebalancer
// ============================================================================

/// Guard-checked bulk mover over a bucket map.
#[derive(Debug, Clone, Default)]
pub struct Rebalancer {
    guard: MoveGuard,
}

impl Rebalancer {
    /// Rebalancer with a custom guard. Production uses [`Default`].
    pub fn new(guard: MoveGuard) -> Self {
        Self { guard }
    }

    /// Rebalance every tracked job on the live index.
    ///
    /// Jobs the guard blocks are reported as skips and left untouched; a
    /// stuck job never aborts the pass. Repeated runs against unchanged
    /// state produce identical reports.
    pub fn full_rebalance(&self, bucket: &BucketMap, jobs: &[JobSnapshot]) -> RebalanceReport {
        let report = self.run_pass(bucket, jobs, false);

        tracing::info!(
            moved = report.moves.len(),
            skipped = report.skips.len(),
            unchanged = report.unchanged,
            evenness = report.distribution.evenness,
            "Rebalance pass complete"
        );

        report
    }

    /// Run the identical pass against a disposable copy of the index.
    ///
    /// The live bucket map is never touched, so a subsequent lookup of any
    /// job's slot returns exactly what it did before the preview.
    pub fn preview(&self, bucket: &BucketMap, jobs: &[JobSnapshot]) -> RebalanceReport {
        let shadow = bucket.snapshot();
        self.run_pass(&shadow, jobs, true)
    }

    fn run_pass(&self, bucket: &BucketMap, jobs: &[JobSnapshot], preview: bool) -> RebalanceReport {
        let now = Utc::now();

        // Longest interval first; ties ordered by ID so the pass is
        // deterministic. `None` intervals (one-shots) sort last.
        let mut ordered: Vec<&JobSnapshot> = jobs.iter().collect();
        ordered.sort_by(|a, b| b.interval.cmp(&a.interval).then_with(|| a.id.cmp(&b.id)));

        let mut moves = Vec::new();
        let mut skips = Vec::new();
        let mut unchanged = 0;

        for job in ordered {
            if let Err(reason) =
                self.guard
                    .can_move(bucket, &job.id, job.status, job.next_run_at, now)
            {
                tracing::debug!(job_id = %job.id, %reason, "Rebalance skipping job");
                skips.push(JobSkip {
                    job_id: job.id.clone(),
                    reason,
                });
                continue;
            }

            let old_slot = bucket.job_slot(&job.id);

            bucket.remove_job(&job.id);
            let new_time = bucket.place_new_job(&job.id, job.interval.unwrap_or_else(Duration::zero));

            match old_slot {
                Some(slot) if slot_time(slot) == new_time => unchanged += 1,
                old => {
                    tracing::debug!(job_id = %job.id, new_time = %new_time, "Rebalance moved job");
                    moves.push(JobMove {
                        job_id: job.id.clone(),
                        old_time: old.map(slot_time),
                        new_time,
                    });
                }
            }
        }

        let distribution = LoadReport::compute(bucket, DEFAULT_WINDOW_HOURS, now);

        RebalanceReport {
            generated_at: now,
            preview,
            moves,
            skips,
            unchanged,
            distribution,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::bucket::slot_key;

    fn snapshot(id: &str, interval_hours: i64, due_hours: i64) -> JobSnapshot {
        JobSnapshot {
            id: id.to_string(),
            interval: Some(Duration::hours(interval_hours)),
            status: JobStatus::Scheduled,
            next_run_at: Some(Utc::now() + Duration::hours(due_hours)),
        }
    }

    /// Guard that allows everything, so passes can be exercised without
    /// waiting out the placement cooldown.
    fn permissive_rebalancer() -> Rebalancer {
        Rebalancer::new(MoveGuard::new(Duration::zero(), Duration::zero()))
    }

    #[test]
    fn test_skips_running_jobs() {
        let bucket = BucketMap::new();
        let rebalancer = Rebalancer::default();

        bucket.add_job("job-1", slot_key(Utc::now() + Duration::hours(2)));

        let jobs = vec![JobSnapshot {
            id: "job-1".to_string(),
            interval: Some(Duration::hours(1)),
            status: JobStatus::Running,
            next_run_at: Some(Utc::now() + Duration::hours(2)),
        }];

        let report = rebalancer.full_rebalance(&bucket, &jobs);
        assert!(report.moves.is_empty());
        assert_eq!(report.skips.len(), 1);
        assert_eq!(report.skips[0].reason, SkipReason::JobRunning);
    }

    #[test]
    fn test_freshly_placed_jobs_skipped_for_cooldown() {
        let bucket = BucketMap::new();
        let rebalancer = Rebalancer::default();

        bucket.add_job("job-1", slot_key(Utc::now() + Duration::hours(2)));

        let jobs = vec![snapshot("job-1", 1, 2)];
        let report = rebalancer.full_rebalance(&bucket, &jobs);

        assert_eq!(report.skips.len(), 1);
        assert_eq!(report.skips[0].reason, SkipReason::PlacementCooldown);
    }

    #[test]
    fn test_moves_spread_a_hotspot() {
        let bucket = BucketMap::new();
        let rebalancer = permissive_rebalancer();
        let hot = slot_key(Utc::now() + Duration::hours(2));

        for i in 0..6 {
            bucket.add_job(&format!("job-{i}"), hot);
        }
        let jobs: Vec<JobSnapshot> = (0..6).map(|i| snapshot(&format!("job-{i}"), 4, 2)).collect();

        let report = rebalancer.full_rebalance(&bucket, &jobs);

        assert!(report.skips.is_empty());
        assert!(report.moves.len() + report.unchanged == 6);
        // The hotspot must have been dissolved.
        assert!(bucket.slot_load(hot) <= 1);
        assert_eq!(bucket.job_count(), 6);
    }

    #[test]
    fn test_pass_order_is_interval_descending_then_id() {
        let bucket = BucketMap::new();
        let rebalancer = permissive_rebalancer();
        let key = slot_key(Utc::now() + Duration::hours(2));

        for id in ["b-daily", "a-daily", "c-hourly"] {
            bucket.add_job(id, key);
        }

        let jobs = vec![
            snapshot("c-hourly", 1, 2),
            snapshot("b-daily", 24, 2),
            snapshot("a-daily", 24, 2),
        ];

        let report = rebalancer.full_rebalance(&bucket, &jobs);
        let processed: Vec<&str> = report.moves.iter().map(|m| m.job_id.as_str()).collect();

        // All three land in distinct slots, so all three are moves, in
        // pass order: 24h jobs first (a before b by ID), then the hourly.
        assert_eq!(processed, vec!["a-daily", "b-daily", "c-hourly"]);
    }

    #[test]
    fn test_second_pass_has_zero_moves() {
        let bucket = BucketMap::new();
        let rebalancer = Rebalancer::default();
        let key = slot_key(Utc::now() + Duration::hours(2));

        for i in 0..4 {
            bucket.add_job(&format!("job-{i}"), key);
        }
        let jobs: Vec<JobSnapshot> = (0..4).map(|i| snapshot(&format!("job-{i}"), 6, 2)).collect();

        // Direct add_job already stamped a placement, so the first pass
        // runs with a permissive guard to get the jobs spread out.
        let first = permissive_rebalancer().full_rebalance(&bucket, &jobs);
        assert!(first.moves.len() + first.unchanged == 4);

        // Every job now carries a fresh placement stamp, so the guarded
        // second pass must not move anything.
        let second = rebalancer.full_rebalance(&bucket, &jobs);
        assert!(second.moves.is_empty());
        assert_eq!(second.skips.len(), 4);
        assert!(second
            .skips
            .iter()
            .all(|s| s.reason == SkipReason::PlacementCooldown));
    }

    #[test]
    fn test_preview_has_no_side_effects() {
        let bucket = BucketMap::new();
        let rebalancer = permissive_rebalancer();
        let hot = slot_key(Utc::now() + Duration::hours(2));

        for i in 0..5 {
            bucket.add_job(&format!("job-{i}"), hot);
        }
        let jobs: Vec<JobSnapshot> = (0..5).map(|i| snapshot(&format!("job-{i}"), 4, 2)).collect();

        let before: Vec<Option<i64>> = (0..5)
            .map(|i| bucket.job_slot(&format!("job-{i}")))
            .collect();

        let report = rebalancer.preview(&bucket, &jobs);
        assert!(report.preview);
        assert!(!report.moves.is_empty());

        let after: Vec<Option<i64>> = (0..5)
            .map(|i| bucket.job_slot(&format!("job-{i}")))
            .collect();

        assert_eq!(before, after);
        assert_eq!(bucket.slot_load(hot), 5);
    }

    #[test]
    fn test_one_stuck_job_does_not_block_the_rest() {
        let bucket = BucketMap::new();
        let rebalancer = permissive_rebalancer();
        let key = slot_key(Utc::now() + Duration::hours(2));

        bucket.add_job("stuck", key);
        bucket.add_job("movable", key);

        let jobs = vec![
            JobSnapshot {
                id: "stuck".to_string(),
                interval: Some(Duration::hours(4)),
                status: JobStatus::Running,
                next_run_at: None,
            },
            snapshot("movable", 4, 2),
        ];

        let report = rebalancer.full_rebalance(&bucket, &jobs);
        assert_eq!(report.skips.len(), 1);
        assert_eq!(report.moves.len() + report.unchanged, 1);
    }
}

//! Anti-thrashing guard for job moves
//!
//! Every path that moves a job, the rebalancer above all, consults this guard
//! first. It protects in-flight and imminent work and stops freshly placed
//! jobs from oscillating between slots.
//!
//! The guard only looks at the bucket map's last-placed stamp and the
//! status/next-run values the caller supplies; it never queries the
//! durable store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::bucket::{placement_cooldown, protection_window, BucketMap};
use crate::models::JobStatus;

// ============================================================================
// Skip Reasons
// ============================================================================

/// Why a job was left untouched by a move attempt.
///
/// Reasons are checked in this order; the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The job is executing right now; in-flight work is never disturbed.
    JobRunning,
    /// The job is due within the protection window and must not be
    /// preempted this close to its run.
    ProtectionWindow,
    /// The job was placed or moved too recently.
    PlacementCooldown,
}

impl SkipReason {
    /// Wire/reporting code for the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobRunning => "job_running",
            Self::ProtectionWindow => "protection_window",
            Self::PlacementCooldown => "placement_cooldown",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Move Guard
// ============================================================================

/// Precondition check consulted before any job is moved.
#[derive(Debug, Clone)]
pub struct MoveGuard {
    protection_window: Duration,
    placement_cooldown: Duration,
}

impl Default for MoveGuard {
    fn default() -> Self {
        Self {
            protection_window: protection_window(),
            placement_cooldown: placement_cooldown(),
        }
    }
}

impl MoveGuard {
    /// Guard with custom thresholds. Production uses [`Default`].
    pub fn new(protection_window: Duration, placement_cooldown: Duration) -> Self {
        Self {
            protection_window,
            placement_cooldown,
        }
    }

    /// Decide whether a job may be moved at `now`.
    ///
    /// Returns `Ok(())` if the job is movable, or the highest-priority
    /// [`SkipReason`] blocking it. A job due exactly at the protection
    /// boundary is blocked (the boundary is inclusive). A job whose last
    /// placement is exactly one cooldown old is movable again.
    pub fn can_move(
        &self,
        bucket: &BucketMap,
        job_id: &str,
        status: JobStatus,
        next_run_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), SkipReason> {
        if status == JobStatus::Running {
            return Err(SkipReason::JobRunning);
        }

        if let Some(due) = next_run_at {
            // Overdue jobs are about to start and count as imminent too.
            if due - now <= self.protection_window {
                return Err(SkipReason::ProtectionWindow);
            }
        }

        if let Some(placed) = bucket.last_placed(job_id) {
            if now - placed < self.placement_cooldown {
                return Err(SkipReason::PlacementCooldown);
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::bucket::slot_key;

    #[test]
    fn test_running_job_never_movable() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();
        let now = Utc::now();

        // Regardless of next_run_at
        for due in [None, Some(now + Duration::days(7))] {
            let verdict = guard.can_move(&bucket, "job-1", JobStatus::Running, due, now);
            assert_eq!(verdict, Err(SkipReason::JobRunning));
        }
    }

    #[test]
    fn test_imminent_job_protected() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();
        let now = Utc::now();

        let verdict = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::minutes(10)),
            now,
        );
        assert_eq!(verdict, Err(SkipReason::ProtectionWindow));
    }

    #[test]
    fn test_protection_boundary_is_inclusive() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();
        let now = Utc::now();

        // Due exactly 30 minutes out: still blocked.
        let at_boundary = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::minutes(30)),
            now,
        );
        assert_eq!(at_boundary, Err(SkipReason::ProtectionWindow));

        // One second past the boundary: no longer imminent.
        let past_boundary = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::minutes(30) + Duration::seconds(1)),
            now,
        );
        assert_eq!(past_boundary, Ok(()));
    }

    #[test]
    fn test_overdue_job_protected() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();
        let now = Utc::now();

        let verdict = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now - Duration::minutes(5)),
            now,
        );
        assert_eq!(verdict, Err(SkipReason::ProtectionWindow));
    }

    #[test]
    fn test_recent_placement_blocks_move() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();

        bucket.add_job("job-1", slot_key(Utc::now()));

        // Placed "10 minutes ago" relative to the probe time, due well
        // outside the protection window.
        let now = Utc::now() + Duration::minutes(10);
        let verdict = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::hours(3)),
            now,
        );
        assert_eq!(verdict, Err(SkipReason::PlacementCooldown));
    }

    #[test]
    fn test_cooldown_expires() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();

        bucket.add_job("job-1", slot_key(Utc::now()));

        let now = Utc::now() + Duration::hours(2);
        let verdict = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::hours(3)),
            now,
        );
        assert_eq!(verdict, Ok(()));
    }

    #[test]
    fn test_untracked_job_has_no_cooldown() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();
        let now = Utc::now();

        let verdict = guard.can_move(
            &bucket,
            "never-placed",
            JobStatus::Scheduled,
            Some(now + Duration::hours(3)),
            now,
        );
        assert_eq!(verdict, Ok(()));
    }

    #[test]
    fn test_running_outranks_other_reasons() {
        let bucket = BucketMap::new();
        let guard = MoveGuard::default();

        bucket.add_job("job-1", slot_key(Utc::now()));
        let now = Utc::now();

        // Running + imminent + in cooldown: report job_running.
        let verdict = guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Running,
            Some(now + Duration::minutes(5)),
            now,
        );
        assert_eq!(verdict, Err(SkipReason::JobRunning));
    }

    #[test]
    fn test_skip_reason_codes() {
        assert_eq!(SkipReason::JobRunning.as_str(), "job_running");
        assert_eq!(SkipReason::ProtectionWindow.as_str(), "protection_window");
        assert_eq!(SkipReason::PlacementCooldown.as_str(), "placement_cooldown");
    }
}

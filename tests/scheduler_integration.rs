//! Integration tests for the scheduling core
//!
//! These tests verify the complete placement workflow:
//! - Slot quantization boundaries
//! - Bucket map consistency under arbitrary operation sequences
//! - Anti-thrashing guard decisions
//! - Load-based placement and rhythm preservation
//! - Rebalancing determinism and preview purity

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use jangdan::models::JobStatus;
use jangdan::scheduler::{
    slot_key, slot_time, BucketMap, JobSnapshot, LoadReport, MoveGuard, Rebalancer, SkipReason,
};

// ============================================================================
// Quantizer Boundary Tests
// ============================================================================

#[test]
fn test_same_window_instants_share_a_key() {
    // 14:59 apart inside one window
    let t1 = Utc.with_ymd_and_hms(2026, 2, 4, 10, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2026, 2, 4, 10, 14, 59).unwrap();
    assert_eq!(slot_key(t1), slot_key(t2));
}

#[test]
fn test_straddling_instants_differ() {
    let before = Utc.with_ymd_and_hms(2026, 2, 4, 10, 14, 59).unwrap();
    let after = Utc.with_ymd_and_hms(2026, 2, 4, 10, 15, 0).unwrap();
    assert_ne!(slot_key(before), slot_key(after));
}

#[test]
fn test_slot_time_is_always_window_start() {
    let t = Utc.with_ymd_and_hms(2026, 2, 4, 23, 59, 59).unwrap();
    let start = slot_time(slot_key(t));
    assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 4, 23, 45, 0).unwrap());
}

// ============================================================================
// Concrete Placement Scenarios
// ============================================================================

#[test]
fn test_three_jobs_in_one_slot() {
    let bucket = BucketMap::new();
    let key = slot_key(Utc::now());

    bucket.add_job("job-1", key);
    bucket.add_job("job-2", key);
    bucket.add_job("job-3", key);

    assert_eq!(bucket.slot_load(key), 3);
}

#[test]
fn test_rhythm_advances_exactly_four_slots_for_an_hour() {
    let bucket = BucketMap::new();

    let first = bucket.place_new_job("job-1", Duration::hours(1));
    let next = bucket.next_run_preserve_rhythm("job-1", Duration::hours(1));

    // Four 15-minute slots from the *current* slot, not from "now".
    assert_eq!(slot_key(next), slot_key(first) + 4);
}

#[test]
fn test_new_job_avoids_crowded_slots() {
    let bucket = BucketMap::new();
    let now = Utc::now();

    // Four slots in the next hour occupied 3/3/3/3; everything later empty.
    for i in 0..4 {
        let key = slot_key(now + Duration::minutes(i * 15));
        for j in 0..3 {
            bucket.add_job(&format!("crowd-{i}-{j}"), key);
        }
    }

    let scheduled = bucket.place_new_job("new-job", Duration::hours(6));
    assert!(bucket.slot_load(slot_key(scheduled)) <= 1);
}

// ============================================================================
// Guard Scenarios
// ============================================================================

#[test]
fn test_running_job_blocked_regardless_of_next_run() {
    let bucket = BucketMap::new();
    let guard = MoveGuard::default();
    let now = Utc::now();

    for due in [
        None,
        Some(now + Duration::minutes(1)),
        Some(now + Duration::days(30)),
    ] {
        assert_eq!(
            guard.can_move(&bucket, "job-1", JobStatus::Running, due, now),
            Err(SkipReason::JobRunning)
        );
    }
}

#[test]
fn test_fresh_placement_blocked_by_cooldown() {
    let bucket = BucketMap::new();
    let guard = MoveGuard::default();

    bucket.add_job("job-1", slot_key(Utc::now()));

    // Placed ten minutes ago, due three hours out: only the cooldown bites.
    let now = Utc::now() + Duration::minutes(10);
    assert_eq!(
        guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::hours(3)),
            now,
        ),
        Err(SkipReason::PlacementCooldown)
    );
}

#[test]
fn test_thirty_minute_boundary_blocks() {
    let bucket = BucketMap::new();
    let guard = MoveGuard::default();
    let now = Utc::now();

    assert_eq!(
        guard.can_move(
            &bucket,
            "job-1",
            JobStatus::Scheduled,
            Some(now + Duration::minutes(30)),
            now,
        ),
        Err(SkipReason::ProtectionWindow)
    );
}

// ============================================================================
// Rebalance Scenarios
// ============================================================================

fn snapshots(ids: &[&str], interval_hours: i64) -> Vec<JobSnapshot> {
    ids.iter()
        .map(|id| JobSnapshot {
            id: id.to_string(),
            interval: Some(Duration::hours(interval_hours)),
            status: JobStatus::Scheduled,
            next_run_at: Some(Utc::now() + Duration::hours(2)),
        })
        .collect()
}

#[test]
fn test_double_rebalance_second_pass_moves_nothing() {
    let bucket = BucketMap::new();
    let hot = slot_key(Utc::now() + Duration::hours(2));

    let ids = ["job-a", "job-b", "job-c", "job-d"];
    for id in ids {
        bucket.add_job(id, hot);
    }
    let jobs = snapshots(&ids, 6);

    // First pass with a permissive guard so the hotspot can dissolve.
    let permissive = Rebalancer::new(MoveGuard::new(Duration::zero(), Duration::zero()));
    let first = permissive.full_rebalance(&bucket, &jobs);
    assert_eq!(first.moves.len() + first.unchanged, 4);

    // Second pass under the real rules: every job was just re-placed, so
    // nothing moves and every skip carries the same reason.
    let guarded = Rebalancer::default();
    let second = guarded.full_rebalance(&bucket, &jobs);
    assert!(second.moves.is_empty());
    assert_eq!(second.unchanged, 0);
    assert_eq!(second.skips.len(), 4);
    assert!(second
        .skips
        .iter()
        .all(|s| s.reason == SkipReason::PlacementCooldown));

    // And a third pass reports exactly the same outcome.
    let third = guarded.full_rebalance(&bucket, &jobs);
    assert_eq!(third.moves.len(), second.moves.len());
    assert_eq!(third.skips.len(), second.skips.len());
}

#[test]
fn test_preview_never_disturbs_assignments() {
    let bucket = BucketMap::new();
    let hot = slot_key(Utc::now() + Duration::hours(2));

    let ids = ["job-a", "job-b", "job-c"];
    for id in ids {
        bucket.add_job(id, hot);
    }

    let rebalancer = Rebalancer::new(MoveGuard::new(Duration::zero(), Duration::zero()));
    let report = rebalancer.preview(&bucket, &snapshots(&ids, 4));

    // The preview saw moves, the live index saw none of them.
    assert!(!report.moves.is_empty());
    for id in ids {
        assert_eq!(bucket.job_slot(id), Some(hot));
    }
    assert_eq!(bucket.slot_load(hot), 3);
}

#[test]
fn test_rebalance_improves_evenness() {
    let bucket = BucketMap::new();
    let hot = slot_key(Utc::now() + Duration::hours(2));

    let ids: Vec<String> = (0..12).map(|i| format!("job-{i}")).collect();
    for id in &ids {
        bucket.add_job(id, hot);
    }
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let before = LoadReport::compute(&bucket, 24, Utc::now());

    let rebalancer = Rebalancer::new(MoveGuard::new(Duration::zero(), Duration::zero()));
    let report = rebalancer.full_rebalance(&bucket, &snapshots(&id_refs, 4));

    assert!(report.distribution.evenness > before.evenness);
    assert!(bucket.slot_load(hot) <= 1);
}

// ============================================================================
// Property-Based Invariants
// ============================================================================

#[derive(Debug, Clone)]
enum IndexOp {
    Add { job: u8, slot_offset: i64 },
    Remove { job: u8 },
    Reschedule { job: u8, interval_minutes: i64 },
}

fn index_op() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        (0u8..24, 0i64..200).prop_map(|(job, slot_offset)| IndexOp::Add { job, slot_offset }),
        (0u8..24).prop_map(|job| IndexOp::Remove { job }),
        (0u8..24, 1i64..300).prop_map(|(job, interval_minutes)| IndexOp::Reschedule {
            job,
            interval_minutes
        }),
    ]
}

proptest! {
    /// The sum of all slot occupancy counts always equals the number of
    /// tracked jobs, and every tracked job has exactly one slot.
    #[test]
    fn prop_occupancy_sum_matches_tracked_jobs(ops in prop::collection::vec(index_op(), 0..80)) {
        let bucket = BucketMap::new();
        let base = slot_key(Utc::now());

        for op in ops {
            match op {
                IndexOp::Add { job, slot_offset } => {
                    bucket.add_job(&format!("job-{job}"), base + slot_offset);
                }
                IndexOp::Remove { job } => {
                    bucket.remove_job(&format!("job-{job}"));
                }
                IndexOp::Reschedule { job, interval_minutes } => {
                    bucket.next_run_preserve_rhythm(
                        &format!("job-{job}"),
                        Duration::minutes(interval_minutes),
                    );
                }
            }

            prop_assert_eq!(bucket.total_occupancy(), bucket.job_count());
        }
    }

    /// Every tracked job is counted in the slot the index claims for it.
    #[test]
    fn prop_job_slots_are_exclusive(ops in prop::collection::vec(index_op(), 0..60)) {
        let bucket = BucketMap::new();
        let base = slot_key(Utc::now());

        for op in ops {
            match op {
                IndexOp::Add { job, slot_offset } => {
                    bucket.add_job(&format!("job-{job}"), base + slot_offset);
                }
                IndexOp::Remove { job } => {
                    bucket.remove_job(&format!("job-{job}"));
                }
                IndexOp::Reschedule { job, interval_minutes } => {
                    bucket.next_run_preserve_rhythm(
                        &format!("job-{job}"),
                        Duration::minutes(interval_minutes),
                    );
                }
            }
        }

        for id in bucket.job_ids() {
            let slot = bucket.job_slot(&id);
            prop_assert!(slot.is_some());
            prop_assert!(bucket.slot_load(slot.unwrap()) >= 1);
        }
    }

    /// Quantization is idempotent under re-application.
    #[test]
    fn prop_slot_roundtrip_idempotent(secs in -10_000_000_000i64..10_000_000_000i64) {
        let t = chrono::DateTime::from_timestamp(secs, 0).unwrap();
        let key = slot_key(t);
        prop_assert_eq!(slot_key(slot_time(key)), key);
    }

    /// A preview pass never changes any subsequent slot lookup.
    #[test]
    fn prop_preview_is_pure(job_count in 1usize..12, interval_hours in 1i64..48) {
        let bucket = BucketMap::new();
        let key = slot_key(Utc::now() + Duration::hours(2));

        let ids: Vec<String> = (0..job_count).map(|i| format!("job-{i}")).collect();
        for id in &ids {
            bucket.add_job(id, key);
        }

        let jobs: Vec<JobSnapshot> = ids
            .iter()
            .map(|id| JobSnapshot {
                id: id.clone(),
                interval: Some(Duration::hours(interval_hours)),
                status: JobStatus::Scheduled,
                next_run_at: Some(Utc::now() + Duration::hours(2)),
            })
            .collect();

        let before: Vec<Option<i64>> = ids.iter().map(|id| bucket.job_slot(id)).collect();

        let rebalancer = Rebalancer::new(MoveGuard::new(Duration::zero(), Duration::zero()));
        rebalancer.preview(&bucket, &jobs);

        let after: Vec<Option<i64>> = ids.iter().map(|id| bucket.job_slot(id)).collect();
        prop_assert_eq!(before, after);
    }
}

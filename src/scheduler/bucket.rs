//! Time-bucketed placement index for recurring jobs
//!
//! This module implements the load-balancing heart of the scheduler: every
//! job is assigned to a fixed 15-minute wall-clock window ("slot"), and the
//! bucket map tracks how many jobs occupy each slot so that new placements
//! can be steered toward the least-loaded part of the horizon.
//!
//! The index is a pure in-memory structure. It never touches the durable
//! store; callers feed it timestamps and job IDs and persist whatever times
//! it hands back.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Slot Quantization
// ============================================================================

/// Width of a scheduling slot in seconds (15 minutes).
pub const SLOT_SECONDS: i64 = 900;

/// Width of a scheduling slot as a duration.
pub fn slot_duration() -> Duration {
    Duration::seconds(SLOT_SECONDS)
}

/// Minimum lead time before execution during which a job cannot be moved.
pub fn protection_window() -> Duration {
    Duration::minutes(30)
}

/// Minimum time between placements of the same job.
pub fn placement_cooldown() -> Duration {
    Duration::hours(1)
}

/// Default search window for new job placement.
pub fn default_search_window() -> Duration {
    Duration::hours(24)
}

/// Convert an instant to its 15-minute bucket key.
///
/// Two instants map to the same key iff they fall in the same half-open
/// window `[window_start, window_start + 15min)`.
pub fn slot_key(t: DateTime<Utc>) -> i64 {
    t.timestamp().div_euclid(SLOT_SECONDS)
}

/// Convert a slot key back to the window's start instant (UTC).
pub fn slot_time(key: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(key * SLOT_SECONDS, 0).unwrap_or_default()
}

// ============================================================================
// Bucket Map
// ============================================================================

/// Mutable index state, guarded as one unit so moves stay atomic.
#[derive(Debug, Default, Clone)]
struct BucketState {
    /// slot key -> number of jobs assigned to that slot
    slots: HashMap<i64, usize>,

    /// job id -> current slot key (at most one entry per job)
    job_to_slot: HashMap<String, i64>,

    /// job id -> most recent placement time (anti-thrashing input)
    last_placed: HashMap<String, DateTime<Utc>>,
}

impl BucketState {
    /// Decrement a slot's occupancy, dropping the entry at zero.
    fn release_slot(&mut self, key: i64) {
        if let Some(count) = self.slots.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.slots.remove(&key);
            }
        }
    }

    fn occupy_slot(&mut self, job_id: &str, key: i64, placed_at: DateTime<Utc>) {
        *self.slots.entry(key).or_insert(0) += 1;
        self.job_to_slot.insert(job_id.to_string(), key);
        self.last_placed.insert(job_id.to_string(), placed_at);
    }
}

/// In-memory schedule view for load-balanced placement.
///
/// Three associative structures share one reader/writer lock: slot
/// occupancy counts, job-to-slot assignments, and last-placement stamps.
/// Reads may run concurrently; every mutation (including the two-slot
/// update of a move) takes the lock exclusively, so a reader never
/// observes a job counted in two slots or in none.
#[derive(Debug, Default)]
pub struct BucketMap {
    inner: RwLock<BucketState>,
}

impl BucketMap {
    /// Create an empty bucket map.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BucketState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BucketState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a job placement in a slot.
    ///
    /// If the job already has an assignment it is moved: the old slot is
    /// decremented and the new one incremented inside a single locked
    /// step. This is the move primitive every other operation builds on.
    /// The current time is stamped as the job's last placement.
    pub fn add_job(&self, job_id: &str, key: i64) {
        let mut state = self.write();

        if let Some(old) = state.job_to_slot.get(job_id).copied() {
            state.release_slot(old);
        }

        state.occupy_slot(job_id, key, Utc::now());
    }

    /// Remove a job from its slot. Unknown jobs are a safe no-op.
    pub fn remove_job(&self, job_id: &str) {
        let mut state = self.write();

        if let Some(key) = state.job_to_slot.remove(job_id) {
            state.release_slot(key);
            state.last_placed.remove(job_id);
        }
    }

    /// Occupancy count for a slot; zero if the slot is empty.
    pub fn slot_load(&self, key: i64) -> usize {
        self.read().slots.get(&key).copied().unwrap_or(0)
    }

    /// The job's current slot key, if it is tracked.
    pub fn job_slot(&self, job_id: &str) -> Option<i64> {
        self.read().job_to_slot.get(job_id).copied()
    }

    /// When the job was last placed or moved, if it is tracked.
    pub fn last_placed(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.read().last_placed.get(job_id).copied()
    }

    /// Number of jobs currently tracked.
    pub fn job_count(&self) -> usize {
        self.read().job_to_slot.len()
    }

    /// IDs of all tracked jobs, in no particular order.
    pub fn job_ids(&self) -> Vec<String> {
        self.read().job_to_slot.keys().cloned().collect()
    }

    /// Sum of all slot occupancy counts. Equals [`Self::job_count`] when
    /// the index is consistent; exposed so tests can assert exactly that.
    pub fn total_occupancy(&self) -> usize {
        self.read().slots.values().sum()
    }

    /// Deep copy of the current index state.
    ///
    /// Rebalance preview runs against the copy so the live index stays
    /// untouched.
    pub fn snapshot(&self) -> BucketMap {
        BucketMap {
            inner: RwLock::new(self.read().clone()),
        }
    }

    /// Find the slot with the lowest occupancy in `[start, end)`.
    ///
    /// Steps through the range at slot width; ties break toward the
    /// earliest slot, which keeps placement deterministic and fills
    /// near-term slots before far-future ones. An empty range (or an
    /// entirely empty index) yields the range's first slot. Cost is
    /// linear in the number of slots scanned, not in the number of jobs.
    pub fn find_least_loaded(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let state = self.read();

        let mut best_slot = slot_key(start);
        let mut best_load = state.slots.get(&best_slot).copied().unwrap_or(0);

        let mut t = start;
        while t < end {
            let key = slot_key(t);
            let load = state.slots.get(&key).copied().unwrap_or(0);
            if load < best_load {
                best_load = load;
                best_slot = key;
            }
            t += slot_duration();
        }

        best_slot
    }

    /// Place a job with no prior assignment and return its scheduled time.
    ///
    /// Searches the next 24 hours or one interval, whichever is larger: a
    /// job that runs every three days may spread across three days' worth
    /// of slots instead of being squeezed into one.
    pub fn place_new_job(&self, job_id: &str, interval: Duration) -> DateTime<Utc> {
        let now = Utc::now();

        let search = if interval > default_search_window() {
            interval
        } else {
            default_search_window()
        };

        let best = self.find_least_loaded(now, now + search);
        self.add_job(job_id, best);

        slot_time(best)
    }

    /// Advance a tracked job by its interval while preserving slot phase.
    ///
    /// The interval is converted to a whole number of slot widths
    /// (minimum 1, so sub-slot intervals still advance) and added to the
    /// job's *current* slot, not to "now", so a job deliberately placed
    /// off-peak stays off-peak on every subsequent run. Untracked jobs
    /// have no rhythm to preserve and fall back to fresh placement.
    pub fn next_run_preserve_rhythm(&self, job_id: &str, interval: Duration) -> DateTime<Utc> {
        {
            let mut state = self.write();

            if let Some(current) = state.job_to_slot.get(job_id).copied() {
                let steps = (interval.num_seconds() / SLOT_SECONDS).max(1);
                let next = current + steps;

                state.release_slot(current);
                state.occupy_slot(job_id, next, Utc::now());

                return slot_time(next);
            }
        }

        self.place_new_job(job_id, interval)
    }
}

// ============================================================================
// Tests
// ============================================================================

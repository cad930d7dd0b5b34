//! Load-balanced, time-bucketed job scheduling
//!
//! This module is the algorithmic core of the engine. Every recurring
//! acquisition job is assigned to a fixed 15-minute wall-clock slot; the
//! placement index tracks per-slot occupancy so that new jobs land in the
//! emptiest part of the horizon while established jobs keep a stable
//! phase ("rhythm") across reschedules.
//!
//! # Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Rebalancer                          │
//! │   (bulk, guard-checked, deterministic, previewable)       │
//! └──────┬──────────────────────┬─────────────────────────────┘
//!        │                      │
//! ┌──────▼──────┐        ┌──────▼──────┐      ┌──────────────┐
//! │  MoveGuard  │        │  BucketMap  │◄─────│  LoadReport  │
//! │ (anti-      │───────►│  (slots,    │      │ (histogram,  │
//! │  thrashing) │        │   index)    │      │  evenness)   │
//! └─────────────┘        └─────────────┘      └──────────────┘
//! ```
//!
//! - [`bucket`] - Slot quantization and the occupancy index, including
//!   least-loaded placement and rhythm-preserving rescheduling
//! - [`guard`] - Anti-thrashing preconditions for moving a job
//! - [`distribution`] - Hourly occupancy reports and evenness scoring
//! - [`rebalance`] - Guard-checked bulk rebalancing with preview mode
//! - [`error`] - Scheduler error types
//!
//! # Placement model
//!
//! A slot key is `unix_seconds / 900`; all math happens on keys and the
//! bucket map is the single source of truth for "where is this job now".
//! Mutations take one writer lock for their whole atomic step, so readers
//! never observe a half-moved job. Nothing in this module performs I/O;
//! the engine feeds it store state and persists what it hands back.
//!
//! # Quick Start
//!
//! ```
//! use jangdan::scheduler::{BucketMap, LoadReport};
//! use chrono::{Duration, Utc};
//!
//! let bucket = BucketMap::new();
//!
//! // Place a job that runs hourly; it lands in the least-loaded slot
//! // of the next 24 hours.
//! let first_run = bucket.place_new_job("job-1", Duration::hours(1));
//!
//! // After a successful run, advance by exactly one interval so the
//! // job keeps its phase.
//! let next_run = bucket.next_run_preserve_rhythm("job-1", Duration::hours(1));
//! assert_eq!(next_run - first_run, Duration::hours(1));
//!
//! let report = LoadReport::compute(&bucket, 24, Utc::now());
//! assert_eq!(report.total_jobs, 1);
//! ```

pub mod bucket;
pub mod distribution;
pub mod error;
pub mod guard;
pub mod rebalance;

// Re-export main types
pub use bucket::{
    default_search_window, placement_cooldown, protection_window, slot_duration, slot_key,
    slot_time, BucketMap, SLOT_SECONDS,
};
pub use distribution::{HourlyLoad, LoadReport, DEFAULT_WINDOW_HOURS};
pub use error::{SchedulerError, SchedulerResult};
pub use guard::{MoveGuard, SkipReason};
pub use rebalance::{JobMove, JobSkip, JobSnapshot, RebalanceReport, Rebalancer};

//! Load distribution reporting
//!
//! Aggregates the bucket map into per-hour occupancy counts for operators:
//! which hours are crowded, where the peak sits, and how evenly the fleet
//! is spread. Reports are ephemeral: computed on demand, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::bucket::{slot_key, slot_time, BucketMap};

/// Slots per reporting hour (60 / 15).
const SLOTS_PER_HOUR: i64 = 4;

/// Default reporting window.
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

// ============================================================================
// Report Types
// ============================================================================

/// Occupancy of a single hour in the reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyLoad {
    /// Start of the hour (aligned to the slot grid, UTC)
    pub hour_start: DateTime<Utc>,

    /// Jobs assigned to the four slots of this hour
    pub job_count: usize,
}

/// Snapshot of how jobs are spread across the reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    /// Requested window size
    pub window_hours: u32,

    /// When the report was computed
    pub generated_at: DateTime<Utc>,

    /// Per-hour occupancy, earliest first
    pub hourly: Vec<HourlyLoad>,

    /// Jobs counted inside the window
    pub total_jobs: usize,

    /// Start of the most loaded hour (earliest wins ties)
    pub peak_hour: Option<DateTime<Utc>>,

    /// Occupancy of the peak hour
    pub peak_count: usize,

    /// Evenness score in `[0, 1]`; 1.0 is a perfectly uniform spread
    pub evenness: f64,
}

impl LoadReport {
    /// Build a report over `window_hours` hours starting at the slot
    /// containing `now`.
    ///
    /// Each hour sums its four 15-minute slots. The evenness score is
    /// `1 - variance / mean²` over the hourly counts, clamped at zero; an
    /// empty window is perfectly even (1.0) by convention.
    pub fn compute(bucket: &BucketMap, window_hours: u32, now: DateTime<Utc>) -> Self {
        let base = slot_key(now);
        let mut hourly = Vec::with_capacity(window_hours as usize);

        for hour in 0..window_hours as i64 {
            let first_slot = base + hour * SLOTS_PER_HOUR;
            let job_count = (0..SLOTS_PER_HOUR)
                .map(|offset| bucket.slot_load(first_slot + offset))
                .sum();

            hourly.push(HourlyLoad {
                hour_start: slot_time(first_slot),
                job_count,
            });
        }

        let total_jobs = hourly.iter().map(|h| h.job_count).sum();

        // Earliest hour wins ties, matching the placement tie-break.
        let mut peak_hour = None;
        let mut peak_count = 0;
        for hour in &hourly {
            if hour.job_count > peak_count {
                peak_count = hour.job_count;
                peak_hour = Some(hour.hour_start);
            }
        }

        let evenness = evenness_score(&hourly);

        Self {
            window_hours,
            generated_at: now,
            hourly,
            total_jobs,
            peak_hour,
            peak_count,
            evenness,
        }
    }

    /// Format as a display string for CLI output.
    pub fn display(&self) -> String {
        let mut output = format!("Load distribution ({}h window)\n", self.window_hours);
        output.push_str(&format!("{:-<48}\n", ""));

        for hour in &self.hourly {
            output.push_str(&format!(
                "{} | {:>4} | {}\n",
                hour.hour_start.format("%Y-%m-%d %H:%M"),
                hour.job_count,
                "#".repeat(hour.job_count.min(30)),
            ));
        }

        output.push_str(&format!("\nTotal jobs in window: {}\n", self.total_jobs));
        if let Some(peak) = self.peak_hour {
            output.push_str(&format!(
                "Peak hour: {} ({} jobs)\n",
                peak.format("%H:%M"),
                self.peak_count
            ));
        }
        output.push_str(&format!("Evenness: {:.3}\n", self.evenness));

        output
    }
}

/// Normalized evenness of the hourly histogram.
///
/// `max(0, 1 - population_variance / mean²)`. A window with no jobs at
/// all has no imbalance to report and scores 1.0.
fn evenness_score(hourly: &[HourlyLoad]) -> f64 {
    let counts: Vec<f64> = hourly.iter().map(|h| h.job_count as f64).collect();

    if counts.is_empty() || counts.iter().all(|&c| c == 0.0) {
        return 1.0;
    }

    let mean = counts.iter().mean();
    let variance = counts.iter().population_variance();

    (1.0 - variance / (mean * mean)).max(0.0)
}

// ============================================================================
// Tests
// ============================================================================

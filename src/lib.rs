//! jangdan - Rhythm-Preserving Job Scheduler
//!
//! A load-balanced scheduling engine for recurring content-acquisition
//! jobs. Every job is assigned a 15-minute wall-clock slot; placements
//! steer toward the least-loaded part of the horizon, reschedules keep a
//! job's phase stable across runs, and a guard-checked rebalancer spreads
//! hotspots without disturbing in-flight or imminent work.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scheduler`] - Slot quantization, the placement index, anti-thrashing
//!   guard, distribution reporting, and rebalancing (the algorithmic core)
//! - [`engine`] - Startup rebuild, the periodic tick loop, and job
//!   lifecycle handling over the core
//! - [`storage`] - The durable job store (SQLite and in-memory)
//! - [`server`] - REST API for lifecycle events, reports, and rebalancing
//! - [`models`] - Core data structures and types
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use jangdan::config::Config;
//! use jangdan::engine::{JobEngine, LogRunner};
//! use jangdan::storage::SqliteJobRepository;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repo = Arc::new(SqliteJobRepository::new(&config.database.sqlite_path)?);
//!     let engine = JobEngine::new(repo, Arc::new(LogRunner), config.engine);
//!
//!     // The index must be rebuilt before the engine takes traffic.
//!     engine.rebuild().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::engine::{JobEngine, JobRunner};
    pub use crate::error::{Error, Result, SchedulerError};
    pub use crate::models::{Job, JobStatus};
    pub use crate::scheduler::{BucketMap, LoadReport, MoveGuard, RebalanceReport, Rebalancer};
    pub use crate::storage::{JobRepository, SqliteJobRepository};
}

// Direct re-exports for convenience
pub use models::{Job, JobStatus};

//! Durable storage for job configuration
//!
//! The engine never trusts its in-memory index across restarts. The job
//! table here is the source of truth, and the placement index is rebuilt
//! from it on every boot.

pub mod repository;

pub use repository::{JobRepository, MemoryJobRepository, SqliteJobRepository};

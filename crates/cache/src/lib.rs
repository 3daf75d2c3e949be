//! SQLite persistence for the localization workflow.
//!
//! The database holds everything the commit orchestration needs to survive
//! restarts and to coordinate between independent workers:
//! - **Commits** and their derived state (`loading`, `ready`, aggregate counters),
//! - **Blobs**, deduplicated by content hash within a project,
//! - **Keys** and their per-locale **Translations**, scoped to a project and
//!   linked many-to-many with commits,
//! - The **worker registry**: outstanding extraction jobs per commit. Every
//!   registry mutation happens in a single transaction together with the
//!   `loading` flag, and SQLite's single-writer lock serialises those
//!   transactions across connections and processes.

mod blobs;
mod db;
pub mod error;
mod keys;
mod models;
mod repo;
mod stats;
mod workers;

pub use crate::db::Database;
pub use crate::models::{Blob, Commit, CommitStats, Key, NewCommit, Project, Translation};
pub use crate::keys::{ExtractionTarget, LocaleSet};
pub use crate::repo::Repository;
pub use crate::stats::Recalculation;
pub use crate::workers::WorkerChange;

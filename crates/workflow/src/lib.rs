//! Commit import orchestration and readiness tracking.
//!
//! Creating a commit schedules a walk of its source tree. Every blob found
//! under an allowed path is registered once per content hash and offered to
//! each extractor; units that will run in the background are registered as
//! workers of the commit before they are spawned. When the last worker of a
//! commit is removed, the commit's counters and `ready` flag are recomputed
//! and every other commit of the project is queued for the same, since
//! extraction may have touched keys they share.
//!
//! All background work runs on the [`Context`]'s task tracker;
//! [`Context::settle`] waits for it.

mod cascade;
mod commit;
mod context;
mod dispatch;
pub mod error;
mod import;
mod readiness;
mod workers;

pub use crate::cascade::{export_prefix, generate_export};
pub use crate::commit::{CommitRequest, MAX_MESSAGE_LEN, MAX_REVISION_LEN, create_commit, find_commit};
pub use crate::context::{Context, ContextBuilder, DEFAULT_CONCURRENCY, Project};
pub use crate::import::{ImportOptions, ImportSummary, import_strings};
pub use crate::readiness::{is_localized, recalculate, translation_changed};
pub use crate::workers::{add_worker, clear_workers, remove_worker};
pub use strand_cache::{Commit, CommitStats, Recalculation, WorkerChange};

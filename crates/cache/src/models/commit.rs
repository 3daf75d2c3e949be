use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::{Date, UtcDateTime};

/// Aggregate translation counters for a commit, scoped to the project's
/// required locales (base locale excluded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub translations_total: u64,
    pub translations_done: u64,
    pub translations_new: u64,
    pub translations_pending: u64,
    pub words_new: u64,
    pub words_pending: u64,
}

/// A tracked point in source history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: i64,
    pub project_id: i64,
    pub revision: String,
    pub message: String,
    pub committed_at: UtcDateTime,
    pub priority: Option<u8>,
    pub due_date: Option<Date>,
    pub description: Option<String>,
    /// `true` while extraction jobs are registered against this commit.
    pub loading: bool,
    /// Only trustworthy once `loading` is `false`.
    pub ready: bool,
    pub stats: CommitStats,
    pub created_at: UtcDateTime,
}

/// Already-validated values for inserting a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub project_id: i64,
    pub revision: String,
    pub message: String,
    pub committed_at: UtcDateTime,
    pub priority: Option<u8>,
    pub due_date: Option<Date>,
    pub description: Option<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct CommitRow {
    id: i64,
    project_id: i64,
    revision: String,
    message: String,
    committed_at: i64,
    priority: Option<i64>,
    due_date: Option<i64>,
    description: Option<String>,
    loading: bool,
    ready: bool,
    translations_total: i64,
    translations_done: i64,
    translations_new: i64,
    translations_pending: i64,
    words_new: i64,
    words_pending: i64,
    created_at: i64,
}

fn counter(value: i64, field: &'static str) -> Result<u64, Error> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}

pub(crate) fn timestamp(at: UtcDateTime) -> i64 {
    at.unix_timestamp()
}

pub(crate) fn date_timestamp(date: Date) -> i64 {
    date.midnight().as_utc().unix_timestamp()
}

impl TryFrom<CommitRow> for Commit {
    type Error = Error;
    fn try_from(row: CommitRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            revision: row.revision,
            message: row.message,
            committed_at: UtcDateTime::from_unix_timestamp(row.committed_at)
                .or_raise(|| ErrorKind::InvalidData("committed_at"))?,
            priority: row.priority.map(u8::try_from).transpose().or_raise(|| ErrorKind::InvalidData("priority"))?,
            due_date: row
                .due_date
                .map(|ts| UtcDateTime::from_unix_timestamp(ts).map(|at| at.date()))
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("due_date"))?,
            description: row.description,
            loading: row.loading,
            ready: row.ready,
            stats: CommitStats {
                translations_total: counter(row.translations_total, "translations_total")?,
                translations_done: counter(row.translations_done, "translations_done")?,
                translations_new: counter(row.translations_new, "translations_new")?,
                translations_pending: counter(row.translations_pending, "translations_pending")?,
                words_new: counter(row.words_new, "words_new")?,
                words_pending: counter(row.words_pending, "words_pending")?,
            },
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("created_at"))?,
        })
    }
}

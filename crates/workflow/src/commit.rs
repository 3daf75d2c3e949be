//! Commit creation.

use exn::ResultExt;
use strand_cache::{Commit, NewCommit};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::instrument;

use crate::context::Context;
use crate::error::{ErrorKind, Result, ValidationError, from_cache};
use crate::import::{ImportOptions, import_strings};

/// Longest accepted commit message, in characters.
pub const MAX_MESSAGE_LEN: usize = 256;
/// Longest accepted revision id (a full SHA-1 hex digest).
pub const MAX_REVISION_LEN: usize = 40;

/// An externally submitted commit, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRequest {
    /// Configured project name.
    pub project: String,
    pub revision: String,
    pub message: String,
    /// RFC 3339 timestamp.
    pub committed_at: String,
    /// 0 (lowest) to 3.
    pub priority: Option<i64>,
    /// `YYYY-MM-DD`.
    pub due_date: Option<String>,
    pub description: Option<String>,
    /// Create the commit without walking its tree.
    pub skip_import: bool,
}

impl CommitRequest {
    /// Check every field, converting it to its stored form.
    pub fn validate(&self, project_id: i64) -> std::result::Result<NewCommit, ValidationError> {
        let revision = self.revision.trim();
        if revision.is_empty() {
            return Err(ValidationError::MissingRevision);
        }
        if !is_revision(revision) {
            return Err(ValidationError::InvalidRevision(revision.to_string()));
        }
        let message = self.message.trim();
        if message.is_empty() {
            return Err(ValidationError::MissingMessage);
        }
        let length = message.chars().count();
        if length > MAX_MESSAGE_LEN {
            return Err(ValidationError::MessageTooLong(length));
        }
        let priority = match self.priority {
            None => None,
            Some(p @ 0..=3) => Some(p as u8),
            Some(p) => return Err(ValidationError::PriorityOutOfRange(p)),
        };
        let committed_at = OffsetDateTime::parse(self.committed_at.trim(), &Rfc3339)
            .map_err(|_| ValidationError::InvalidCommittedAt(self.committed_at.clone()))?
            .to_utc();
        let due_date = self
            .due_date
            .as_deref()
            .map(|raw| {
                Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
                    .map_err(|_| ValidationError::InvalidDueDate(raw.to_string()))
            })
            .transpose()?;
        Ok(NewCommit {
            project_id,
            revision: revision.to_string(),
            message: message.to_string(),
            committed_at,
            priority,
            due_date,
            description: self.description.as_deref().map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
        })
    }
}

fn is_revision(revision: &str) -> bool {
    revision.len() <= MAX_REVISION_LEN && revision.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Validate and store a commit, then schedule its import unless
/// `skip_import` is set.
///
/// Nothing is written or scheduled when validation fails.
#[instrument(skip(ctx, request), fields(project = %request.project, revision = %request.revision))]
pub async fn create_commit(ctx: &Context, request: CommitRequest) -> Result<Commit> {
    let project = ctx.project_by_name(&request.project)?;
    let new = request.validate(project.id()).map_err(ErrorKind::Validation)?;
    let repo = ctx.repository();
    if repo.get_commit_by_revision(project.id(), &new.revision).await.map_err(from_cache)?.is_some() {
        exn::bail!(ErrorKind::Validation(ValidationError::DuplicateRevision(new.revision)));
    }
    let commit = match repo.insert_commit(&new).await {
        Ok(commit) => commit,
        // Lost a race against a concurrent create of the same revision.
        Err(err) if matches!(&*err, strand_cache::error::ErrorKind::Constraint(_)) => {
            return Err(err).or_raise(|| ErrorKind::Validation(ValidationError::DuplicateRevision(new.revision)));
        }
        Err(err) => return Err(from_cache(err)),
    };
    tracing::info!(commit_id = commit.id, "Commit created");

    if !request.skip_import {
        let task_ctx = ctx.clone();
        let commit_id = commit.id;
        ctx.spawn("import", async move {
            import_strings(&task_ctx, commit_id, ImportOptions::default()).await.map(|_| ())
        });
    }
    Ok(commit)
}

/// Look up a commit of a configured project by revision.
pub async fn find_commit(ctx: &Context, project: &str, revision: &str) -> Result<Commit> {
    let project = ctx.project_by_name(project)?;
    match ctx.repository().get_commit_by_revision(project.id(), revision).await.map_err(from_cache)? {
        Some(commit) => Ok(commit),
        None => exn::bail!(ErrorKind::UnknownRevision(revision.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::harness;
    use rstest::rstest;
    use strand_source::MemorySource;
    use time::Month;

    fn request(revision: &str) -> CommitRequest {
        CommitRequest {
            project: "web".to_string(),
            revision: revision.to_string(),
            message: "Add greeting".to_string(),
            committed_at: "2026-03-01T12:00:00+01:00".to_string(),
            ..CommitRequest::default()
        }
    }

    #[test]
    fn test_valid_request() {
        let mut req = request("abc123");
        req.priority = Some(3);
        req.due_date = Some("2026-04-01".to_string());
        req.description = Some("  ".to_string());
        let new = req.validate(7).unwrap();
        assert_eq!(new.project_id, 7);
        assert_eq!(new.priority, Some(3));
        assert_eq!(new.due_date, Some(Date::from_calendar_date(2026, Month::April, 1).unwrap()));
        assert_eq!(new.committed_at.hour(), 11);
        assert_eq!(new.description, None);
    }

    #[rstest]
    #[case::missing_revision(CommitRequest { revision: " ".into(), ..request("") }, ValidationError::MissingRevision)]
    #[case::uppercase(request("ABC123"), ValidationError::InvalidRevision("ABC123".into()))]
    #[case::too_long(request(&"a".repeat(41)), ValidationError::InvalidRevision("a".repeat(41)))]
    #[case::missing_message(CommitRequest { message: "".into(), ..request("abc123") }, ValidationError::MissingMessage)]
    #[case::long_message(CommitRequest { message: "x".repeat(257), ..request("abc123") }, ValidationError::MessageTooLong(257))]
    #[case::priority(CommitRequest { priority: Some(4), ..request("abc123") }, ValidationError::PriorityOutOfRange(4))]
    #[case::negative_priority(CommitRequest { priority: Some(-1), ..request("abc123") }, ValidationError::PriorityOutOfRange(-1))]
    #[case::committed_at(CommitRequest { committed_at: "yesterday".into(), ..request("abc123") }, ValidationError::InvalidCommittedAt("yesterday".into()))]
    #[case::due_date(CommitRequest { due_date: Some("01/04/2026".into()), ..request("abc123") }, ValidationError::InvalidDueDate("01/04/2026".into()))]
    fn test_rejected_fields(#[case] req: CommitRequest, #[case] expected: ValidationError) {
        assert_eq!(req.validate(1).unwrap_err(), expected);
    }

    #[test]
    fn test_message_limit_counts_characters() {
        let req = CommitRequest { message: "é".repeat(256), ..request("abc123") };
        assert!(req.validate(1).is_ok());
    }

    #[tokio::test]
    async fn test_create_without_import() {
        let h = harness(MemorySource::new()).await;
        let commit = create_commit(&h.ctx, CommitRequest { skip_import: true, ..request("abc123") }).await.unwrap();
        assert_eq!(commit.revision, "abc123");
        assert!(!commit.loading);
        assert_eq!(h.ctx.pending_tasks(), 0);
        assert_eq!(find_commit(&h.ctx, "web", "abc123").await.unwrap().id, commit.id);
    }

    #[tokio::test]
    async fn test_duplicate_revision_rejected() {
        let h = harness(MemorySource::new()).await;
        create_commit(&h.ctx, CommitRequest { skip_import: true, ..request("abc123") }).await.unwrap();
        let err = create_commit(&h.ctx, request("abc123")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(ValidationError::DuplicateRevision(r)) if r == "abc123"));
        // Rejected before scheduling anything.
        assert_eq!(h.ctx.pending_tasks(), 0);

        // The same revision in another project is a different commit.
        let other = CommitRequest { project: "mobile".into(), skip_import: true, ..request("abc123") };
        create_commit(&h.ctx, other).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        let h = harness(MemorySource::new()).await;
        let err = create_commit(&h.ctx, CommitRequest { priority: Some(9), ..request("abc123") }).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(ValidationError::PriorityOutOfRange(9))));
        let project = h.ctx.project_by_name("web").unwrap();
        assert!(h.ctx.repository().list_commits_for_project(project.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let h = harness(MemorySource::new()).await;
        let err = create_commit(&h.ctx, CommitRequest { project: "desktop".into(), ..request("abc123") })
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::ProjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_schedules_import() {
        let source = MemorySource::new().with_revision("abc123", [("config/locales/en.json", r#"{"greeting": "Hello"}"#)]);
        let h = harness(source).await;
        let commit = create_commit(&h.ctx, request("abc123")).await.unwrap();
        h.ctx.settle().await;
        let keys = h.ctx.repository().list_keys_for_commit(commit.id).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "greeting");
        let commit = find_commit(&h.ctx, "web", "abc123").await.unwrap();
        assert!(!commit.loading);
        assert!(!commit.ready);
    }
}

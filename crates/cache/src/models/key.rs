use crate::error::{Error, ErrorKind};
use exn::ResultExt;

/// A translatable identifier, scoped to a project. The same key name with a
/// different source copy is a different key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub id: i64,
    pub project_id: i64,
    pub key: String,
    pub source_copy: String,
    pub context: Option<String>,
    pub word_count: u64,
    /// Identifier of the extractor that discovered the key.
    pub extractor: String,
    pub source_path: String,
}

/// Copy and review state of a key in one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub id: i64,
    pub key_id: i64,
    pub locale: String,
    /// `None` until someone translates it.
    pub copy: Option<String>,
    /// `None` until reviewed.
    pub approved: Option<bool>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct KeyRow {
    id: i64,
    project_id: i64,
    key: String,
    source_copy: String,
    context: Option<String>,
    word_count: i64,
    extractor: String,
    source_path: String,
}
impl TryFrom<KeyRow> for Key {
    type Error = Error;
    fn try_from(row: KeyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            key: row.key,
            source_copy: row.source_copy,
            context: row.context,
            word_count: u64::try_from(row.word_count).or_raise(|| ErrorKind::InvalidData("word_count"))?,
            extractor: row.extractor,
            source_path: row.source_path,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TranslationRow {
    id: i64,
    key_id: i64,
    locale: String,
    copy: Option<String>,
    approved: Option<bool>,
}
impl From<TranslationRow> for Translation {
    fn from(row: TranslationRow) -> Self {
        Self {
            id: row.id,
            key_id: row.key_id,
            locale: row.locale,
            copy: row.copy,
            approved: row.approved,
        }
    }
}

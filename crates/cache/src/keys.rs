//! Keys, translations and their links to blobs and commits.

use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{Key, KeyRow, Translation, TranslationRow};
use exn::ResultExt;
use strand_extract::Unit;
use tracing::instrument;

/// Where a batch of extracted units came from.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionTarget<'a> {
    pub project_id: i64,
    pub commit_id: i64,
    pub blob_id: i64,
    pub extractor: &'a str,
    pub source_path: &'a str,
}

/// Locales a new key needs translation rows for.
#[derive(Debug, Clone, Copy)]
pub struct LocaleSet<'a> {
    pub base: &'a str,
    /// Required locales, base locale excluded.
    pub targets: &'a [String],
}

fn word_count(copy: &str) -> i64 {
    // A string never has more than i64::MAX words.
    i64::try_from(copy.split_whitespace().count()).unwrap_or(i64::MAX)
}

impl Repository {
    /// Persist the base-locale units an extractor found in a blob.
    ///
    /// In one transaction: replaces the blob's key list for this extractor,
    /// finds or creates each key, makes sure a translation row exists for the
    /// base locale (approved self-translation) and every target locale
    /// (untranslated), links the keys to the commit, and records that the
    /// extractor has processed the blob.
    ///
    /// Returns the number of distinct keys linked.
    #[instrument(skip(self, units), fields(units = units.len()))]
    pub async fn record_extraction(
        &self,
        target: ExtractionTarget<'_>,
        locales: LocaleSet<'_>,
        units: &[Unit],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM blob_keys WHERE blob_id = ? AND extractor = ?")
            .bind(target.blob_id)
            .bind(target.extractor)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut linked = 0;
        for unit in units {
            let key_id: i64 = sqlx::query_scalar(include_str!("../queries/upsert_key.sql"))
                .bind(target.project_id)
                .bind(&unit.key)
                .bind(&unit.copy)
                .bind(unit.context.as_deref())
                .bind(word_count(&unit.copy))
                .bind(target.extractor)
                .bind(target.source_path)
                .fetch_one(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            sqlx::query(include_str!("../queries/ensure_translation.sql"))
                .bind(key_id)
                .bind(locales.base)
                .bind(&unit.copy)
                .bind(true)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            for locale in locales.targets {
                sqlx::query(include_str!("../queries/ensure_translation.sql"))
                    .bind(key_id)
                    .bind(locale)
                    .bind(None::<String>)
                    .bind(None::<bool>)
                    .execute(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
            }
            sqlx::query("INSERT OR IGNORE INTO blob_keys (blob_id, key_id, extractor) VALUES (?, ?, ?)")
                .bind(target.blob_id)
                .bind(key_id)
                .bind(target.extractor)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            let result = sqlx::query("INSERT OR IGNORE INTO commit_keys (commit_id, key_id) VALUES (?, ?)")
                .bind(target.commit_id)
                .bind(key_id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            linked += result.rows_affected();
        }
        Self::mark_extracted_in_tx(&mut tx, target.blob_id, target.extractor).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(linked)
    }

    /// Write units extracted in a non-base locale as approved translations of
    /// the project's existing keys with the same name.
    ///
    /// Units naming unknown keys are ignored. Returns the number of
    /// translation rows written.
    #[instrument(skip(self, units), fields(units = units.len()))]
    pub async fn record_locale_extraction(&self, project_id: i64, locale: &str, units: &[Unit]) -> Result<u64> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut written = 0;
        for unit in units {
            let result = sqlx::query(include_str!("../queries/import_translation.sql"))
                .bind(locale)
                .bind(&unit.copy)
                .bind(project_id)
                .bind(&unit.key)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            written += result.rows_affected();
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(written)
    }

    /// Link the keys previously recorded for `(blob, extractor)` to a commit,
    /// without extracting again.
    pub async fn link_blob_keys(&self, commit_id: i64, blob_id: i64, extractor: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/link_blob_keys.sql"))
            .bind(commit_id)
            .bind(blob_id)
            .bind(extractor)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Remove every key association of a commit (start of a full re-scan).
    pub async fn clear_commit_keys(&self, commit_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM commit_keys WHERE commit_id = ?")
            .bind(commit_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn list_keys_for_commit(&self, commit_id: i64) -> Result<Vec<Key>> {
        let rows: Vec<KeyRow> = sqlx::query_as(
            "SELECT k.* FROM keys k JOIN commit_keys ck ON ck.key_id = k.id WHERE ck.commit_id = ? ORDER BY k.key, k.id",
        )
        .bind(commit_id)
        .fetch_all(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Key::try_from).collect()
    }

    /// Keys with the given name in a project (one per distinct source copy).
    pub async fn find_keys(&self, project_id: i64, key: &str) -> Result<Vec<Key>> {
        let rows: Vec<KeyRow> = sqlx::query_as("SELECT * FROM keys WHERE project_id = ? AND key = ? ORDER BY id")
            .bind(project_id)
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Key::try_from).collect()
    }

    /// Ids of commits whose key set includes `key_id`.
    pub async fn list_commit_ids_for_key(&self, key_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT commit_id FROM commit_keys WHERE key_id = ? ORDER BY commit_id")
            .bind(key_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn list_translations_for_key(&self, key_id: i64) -> Result<Vec<Translation>> {
        let rows: Vec<TranslationRow> = sqlx::query_as(
            "SELECT id, key_id, locale, copy, approved FROM translations WHERE key_id = ? ORDER BY locale",
        )
        .bind(key_id)
        .fetch_all(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(Translation::from).collect())
    }

    /// Set the copy and review state of a key's translation, creating the row
    /// if the locale had none.
    pub async fn update_translation(
        &self,
        key_id: i64,
        locale: &str,
        copy: Option<&str>,
        approved: Option<bool>,
    ) -> Result<Translation> {
        let row: TranslationRow = sqlx::query_as(
            "INSERT INTO translations (key_id, locale, copy, approved) VALUES (?, ?, ?, ?) \
             ON CONFLICT (key_id, locale) DO UPDATE SET copy = excluded.copy, approved = excluded.approved \
             RETURNING id, key_id, locale, copy, approved",
        )
        .bind(key_id)
        .bind(locale)
        .bind(copy)
        .bind(approved)
        .fetch_one(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(row.into())
    }

    /// `(key, locale, copy)` for every translated key of a commit in `locales`,
    /// sorted by key then locale.
    pub async fn list_commit_translations(
        &self,
        commit_id: i64,
        locales: &[String],
    ) -> Result<Vec<(String, String, String)>> {
        let locales = serde_json::to_string(locales).or_raise(|| ErrorKind::InvalidData("locales"))?;
        sqlx::query_as(include_str!("../queries/list_translations_for_commit.sql"))
            .bind(commit_id)
            .bind(locales)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repo::tests::{new_commit, setup};

    pub(crate) fn unit(key: &str, copy: &str) -> Unit {
        Unit {
            key: key.to_string(),
            copy: copy.to_string(),
            context: None,
        }
    }

    pub(crate) fn targets() -> Vec<String> {
        vec!["de".to_string(), "fr".to_string()]
    }

    #[tokio::test]
    async fn test_record_extraction_creates_keys_and_translations() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        let blob = repo.find_or_create_blob(project.id, "b1").await.unwrap();
        let target = ExtractionTarget {
            project_id: project.id,
            commit_id: commit.id,
            blob_id: blob.id,
            extractor: "json",
            source_path: "config/locales/en.json",
        };
        let locales = LocaleSet { base: "en", targets: &targets() };
        let units = [unit("greeting", "Hello there"), unit("farewell", "Bye")];
        let linked = repo.record_extraction(target, locales, &units).await.unwrap();
        assert_eq!(linked, 2);
        assert!(repo.is_extracted(blob.id, "json").await.unwrap());

        let keys = repo.list_keys_for_commit(commit.id).await.unwrap();
        assert_eq!(keys.iter().map(|k| k.key.as_str()).collect::<Vec<_>>(), vec!["farewell", "greeting"]);
        let greeting = keys.iter().find(|k| k.key == "greeting").unwrap();
        assert_eq!(greeting.word_count, 2);

        let translations = repo.list_translations_for_key(greeting.id).await.unwrap();
        let locales: Vec<_> = translations.iter().map(|t| t.locale.as_str()).collect();
        assert_eq!(locales, vec!["de", "en", "fr"]);
        let en = translations.iter().find(|t| t.locale == "en").unwrap();
        assert_eq!(en.copy.as_deref(), Some("Hello there"));
        assert_eq!(en.approved, Some(true));
        let fr = translations.iter().find(|t| t.locale == "fr").unwrap();
        assert_eq!(fr.copy, None);
        assert_eq!(fr.approved, None);
    }

    #[tokio::test]
    async fn test_same_key_new_copy_is_new_key() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        let blob = repo.find_or_create_blob(project.id, "b1").await.unwrap();
        let target = ExtractionTarget {
            project_id: project.id,
            commit_id: commit.id,
            blob_id: blob.id,
            extractor: "json",
            source_path: "en.json",
        };
        let locales = LocaleSet { base: "en", targets: &[] };
        repo.record_extraction(target, locales, &[unit("title", "Welcome")]).await.unwrap();
        repo.record_extraction(target, locales, &[unit("title", "Welcome!")]).await.unwrap();
        assert_eq!(repo.find_keys(project.id, "title").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_link_blob_keys_reuses_previous_extraction() {
        let (repo, project) = setup().await;
        let first = repo.insert_commit(&new_commit(&project, "aaa")).await.unwrap();
        let second = repo.insert_commit(&new_commit(&project, "bbb")).await.unwrap();
        let blob = repo.find_or_create_blob(project.id, "b1").await.unwrap();
        let target = ExtractionTarget {
            project_id: project.id,
            commit_id: first.id,
            blob_id: blob.id,
            extractor: "json",
            source_path: "en.json",
        };
        let locales = LocaleSet { base: "en", targets: &targets() };
        repo.record_extraction(target, locales, &[unit("a", "A"), unit("b", "B")]).await.unwrap();

        assert_eq!(repo.link_blob_keys(second.id, blob.id, "json").await.unwrap(), 2);
        assert_eq!(repo.list_keys_for_commit(second.id).await.unwrap().len(), 2);
        // Another extractor never saw this blob.
        assert_eq!(repo.link_blob_keys(second.id, blob.id, "properties").await.unwrap(), 0);

        let key = &repo.find_keys(project.id, "a").await.unwrap()[0];
        assert_eq!(repo.list_commit_ids_for_key(key.id).await.unwrap(), vec![first.id, second.id]);
        assert_eq!(repo.clear_commit_keys(second.id).await.unwrap(), 2);
        assert_eq!(repo.list_commit_ids_for_key(key.id).await.unwrap(), vec![first.id]);
    }

    #[tokio::test]
    async fn test_record_locale_extraction_updates_known_keys_only() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        let blob = repo.find_or_create_blob(project.id, "b1").await.unwrap();
        let target = ExtractionTarget {
            project_id: project.id,
            commit_id: commit.id,
            blob_id: blob.id,
            extractor: "json",
            source_path: "en.json",
        };
        let locales = LocaleSet { base: "en", targets: &targets() };
        repo.record_extraction(target, locales, &[unit("greeting", "Hello")]).await.unwrap();

        let written = repo
            .record_locale_extraction(project.id, "fr", &[unit("greeting", "Bonjour"), unit("unknown", "Inconnu")])
            .await
            .unwrap();
        assert_eq!(written, 1);
        let key = &repo.find_keys(project.id, "greeting").await.unwrap()[0];
        let fr = repo
            .list_translations_for_key(key.id)
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.locale == "fr")
            .unwrap();
        assert_eq!(fr.copy.as_deref(), Some("Bonjour"));
        assert_eq!(fr.approved, Some(true));
    }

    #[tokio::test]
    async fn test_list_commit_translations_filters_locales() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        let blob = repo.find_or_create_blob(project.id, "b1").await.unwrap();
        let target = ExtractionTarget {
            project_id: project.id,
            commit_id: commit.id,
            blob_id: blob.id,
            extractor: "json",
            source_path: "en.json",
        };
        let locales = LocaleSet { base: "en", targets: &targets() };
        repo.record_extraction(target, locales, &[unit("greeting", "Hello")]).await.unwrap();
        let key = &repo.find_keys(project.id, "greeting").await.unwrap()[0];
        repo.update_translation(key.id, "fr", Some("Bonjour"), Some(true)).await.unwrap();

        let rows = repo.list_commit_translations(commit.id, &["en".to_string(), "fr".to_string()]).await.unwrap();
        assert_eq!(
            rows,
            vec![
                ("greeting".to_string(), "en".to_string(), "Hello".to_string()),
                ("greeting".to_string(), "fr".to_string(), "Bonjour".to_string()),
            ]
        );
    }
}

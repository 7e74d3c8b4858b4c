//! `SQLite` implementation of the `SegmentRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use pocketllm_core::{
    ArtifactId, ContentHash, RepositoryError, SegmentRepository, StoredSegment, ThinkingSegment,
};

use super::row_mappers::{format_timestamp, from_body, storage, to_body};

/// `SQLite` implementation of the `SegmentRepository` trait.
///
/// Rows are keyed by content hash and never updated.
pub struct SqliteSegmentRepository {
    pool: SqlitePool,
}

impl SqliteSegmentRepository {
    /// Create a new `SQLite` segment repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SegmentRepository for SqliteSegmentRepository {
    async fn put(&self, segment: &ThinkingSegment) -> Result<ContentHash, RepositoryError> {
        let mut hashes = self.put_all(std::slice::from_ref(segment)).await?;
        hashes
            .pop()
            .ok_or_else(|| RepositoryError::Storage("segment insert returned no hash".to_string()))
    }

    async fn put_all(
        &self,
        segments: &[ThinkingSegment],
    ) -> Result<Vec<ContentHash>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| storage(&e))?;
        let mut hashes = Vec::with_capacity(segments.len());

        for segment in segments {
            let hash = segment
                .content_hash()
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO thinking_segments (hash, model_id, created_at, seg_index, body)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(hash.as_str())
            .bind(segment.model_id.as_ref().map(ArtifactId::as_str))
            .bind(format_timestamp(&segment.created_at))
            .bind(i64::from(segment.index))
            .bind(to_body(segment)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage(&e))?;
            hashes.push(hash);
        }

        // Dropping an uncommitted transaction rolls every insert back
        tx.commit().await.map_err(|e| storage(&e))?;
        Ok(hashes)
    }

    async fn get(&self, hash: &ContentHash) -> Result<ThinkingSegment, RepositoryError> {
        let row = sqlx::query("SELECT body FROM thinking_segments WHERE hash = ?")
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage(&e))?
            .ok_or_else(|| RepositoryError::NotFound(format!("segment {hash}")))?;
        from_body(&row)
    }

    async fn list_for_model(
        &self,
        model_id: &ArtifactId,
    ) -> Result<Vec<StoredSegment>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT hash, body FROM thinking_segments
            WHERE model_id = ?
            ORDER BY created_at DESC, seg_index ASC
            "#,
        )
        .bind(model_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        rows.iter()
            .map(|row| {
                let hash: String = row.try_get("hash").map_err(|e| storage(&e))?;
                Ok(StoredSegment {
                    hash: ContentHash::from_hex(hash),
                    segment: from_body(row)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use chrono::{DateTime, Utc};
    use pocketllm_core::SegmentKind;

    fn segment(content: &str, index: u32, secs: i64, model: Option<&str>) -> ThinkingSegment {
        ThinkingSegment {
            kind: SegmentKind::Thinking,
            content: content.to_string(),
            index,
            created_at: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            model_id: model.map(ArtifactId::for_name),
            response_length: None,
        }
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let repo = SqliteSegmentRepository::new(setup_test_database().await.unwrap());
        let s = segment("plan the answer", 0, 1_700_000_000, Some("m"));
        let h1 = repo.put(&s).await.unwrap();
        let h2 = repo.put(&s).await.unwrap();
        assert_eq!(h1, h2);
        assert_eq!(repo.get(&h1).await.unwrap(), s);
        assert_eq!(
            repo.list_for_model(&ArtifactId::for_name("m"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_put_all_returns_hashes_in_order() {
        let repo = SqliteSegmentRepository::new(setup_test_database().await.unwrap());
        let first = segment("first", 0, 1_700_000_000, Some("m"));
        let second = segment("second", 1, 1_700_000_000, Some("m"));

        let hashes = repo.put_all(&[first.clone(), second.clone()]).await.unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(repo.get(&hashes[0]).await.unwrap(), first);
        assert_eq!(repo.get(&hashes[1]).await.unwrap(), second);
        assert!(repo.put_all(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = SqliteSegmentRepository::new(setup_test_database().await.unwrap());
        assert!(matches!(
            repo.get(&ContentHash::from_hex("00")).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_then_index() {
        let repo = SqliteSegmentRepository::new(setup_test_database().await.unwrap());
        repo.put(&segment("old", 0, 1_700_000_000, Some("m")))
            .await
            .unwrap();
        repo.put(&segment("new-1", 1, 1_700_000_100, Some("m")))
            .await
            .unwrap();
        repo.put(&segment("new-0", 0, 1_700_000_100, Some("m")))
            .await
            .unwrap();
        repo.put(&segment("other", 0, 1_700_000_200, Some("x")))
            .await
            .unwrap();
        repo.put(&segment("anon", 0, 1_700_000_300, None))
            .await
            .unwrap();

        let contents: Vec<_> = repo
            .list_for_model(&ArtifactId::for_name("m"))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.segment.content)
            .collect();
        assert_eq!(contents, vec!["new-0", "new-1", "old"]);
    }
}

//! `SQLite` implementation of the `ArtifactRepository` trait.
//!
//! Versions are append-only rows in `artifact_versions`; `artifact_heads`
//! points at the current version of each stable id. Both are written in one
//! transaction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use pocketllm_core::{
    ArtifactId, ArtifactRepository, ArtifactVersion, ContentHash, ModelArtifact, RepositoryError,
};

use super::row_mappers::{format_timestamp, from_body, parse_timestamp, storage, to_body};

/// `SQLite` implementation of the `ArtifactRepository` trait.
pub struct SqliteArtifactRepository {
    pool: SqlitePool,
}

impl SqliteArtifactRepository {
    /// Create a new `SQLite` artifact repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRepository for SqliteArtifactRepository {
    async fn list(&self) -> Result<Vec<ModelArtifact>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT v.body FROM artifact_heads h
            JOIN artifact_versions v
              ON v.artifact_id = h.artifact_id AND v.seq = h.head_seq
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        let mut artifacts = rows
            .iter()
            .map(from_body::<ModelArtifact>)
            .collect::<Result<Vec<_>, _>>()?;
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }

    async fn get(&self, id: &ArtifactId) -> Result<ModelArtifact, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT v.body FROM artifact_heads h
            JOIN artifact_versions v
              ON v.artifact_id = h.artifact_id AND v.seq = h.head_seq
            WHERE h.artifact_id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage(&e))?
        .ok_or_else(|| RepositoryError::NotFound(format!("artifact {id}")))?;

        from_body(&row)
    }

    async fn put_version(&self, artifact: &ModelArtifact) -> Result<ContentHash, RepositoryError> {
        let hash = artifact
            .version_hash()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let body = to_body(artifact)?;

        let mut tx = self.pool.begin().await.map_err(|e| storage(&e))?;

        let head = sqlx::query("SELECT head_seq, head_hash FROM artifact_heads WHERE artifact_id = ?")
            .bind(artifact.id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| storage(&e))?;

        let next_seq = match head {
            Some(row) => {
                let head_hash: String = row.try_get("head_hash").map_err(|e| storage(&e))?;
                if head_hash == hash.as_str() {
                    return Ok(hash);
                }
                row.try_get::<i64, _>("head_seq").map_err(|e| storage(&e))? + 1
            }
            None => 1,
        };

        sqlx::query(
            "INSERT INTO artifact_versions (artifact_id, seq, hash, body, recorded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(artifact.id.as_str())
        .bind(next_seq)
        .bind(hash.as_str())
        .bind(&body)
        .bind(format_timestamp(&Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(|e| storage(&e))?;

        sqlx::query(
            r#"
            INSERT INTO artifact_heads (artifact_id, head_seq, head_hash) VALUES (?, ?, ?)
            ON CONFLICT(artifact_id) DO UPDATE SET head_seq = excluded.head_seq, head_hash = excluded.head_hash
            "#,
        )
        .bind(artifact.id.as_str())
        .bind(next_seq)
        .bind(hash.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| storage(&e))?;

        tx.commit().await.map_err(|e| storage(&e))?;
        Ok(hash)
    }

    async fn history(&self, id: &ArtifactId) -> Result<Vec<ArtifactVersion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT seq, hash, body, recorded_at FROM artifact_versions WHERE artifact_id = ? ORDER BY seq ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage(&e))?;

        rows.iter()
            .map(|row| {
                let seq: i64 = row.try_get("seq").map_err(|e| storage(&e))?;
                let hash: String = row.try_get("hash").map_err(|e| storage(&e))?;
                let recorded_at: String = row.try_get("recorded_at").map_err(|e| storage(&e))?;
                Ok(ArtifactVersion {
                    hash: ContentHash::from_hex(hash),
                    seq: u32::try_from(seq)
                        .map_err(|_| RepositoryError::Constraint(format!("bad seq {seq}")))?,
                    artifact: from_body(row)?,
                    recorded_at: parse_timestamp(&recorded_at)?,
                })
            })
            .collect()
    }
}

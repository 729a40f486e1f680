//! Repository for the `commit_metadata` table.

use sqlx::PgExecutor;
use vidgit_core::commit::CommitMetadata;
use vidgit_core::types::CommitId;

use crate::models::commit::CommitMetadataRow;

/// Column list for commit_metadata queries.
const COLUMNS: &str = "commit_id, metadata, created_at, updated_at";

pub struct CommitMetadataRepo;

impl CommitMetadataRepo {
    /// Insert or replace a commit's metadata.
    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        commit_id: CommitId,
        metadata: &serde_json::Value,
    ) -> Result<CommitMetadata, sqlx::Error> {
        let query = format!(
            "INSERT INTO commit_metadata (commit_id, metadata)
             VALUES ($1, $2)
             ON CONFLICT (commit_id) DO UPDATE SET
                metadata = EXCLUDED.metadata,
                updated_at = CASE
                    WHEN commit_metadata.metadata IS DISTINCT FROM EXCLUDED.metadata
                    THEN now()
                    ELSE commit_metadata.updated_at
                END
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommitMetadataRow>(&query)
            .bind(commit_id)
            .bind(metadata)
            .fetch_one(executor)
            .await
            .map(Into::into)
    }

    pub async fn find_by_commit(
        executor: impl PgExecutor<'_>,
        commit_id: CommitId,
    ) -> Result<Option<CommitMetadata>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commit_metadata WHERE commit_id = $1");
        sqlx::query_as::<_, CommitMetadataRow>(&query)
            .bind(commit_id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }
}

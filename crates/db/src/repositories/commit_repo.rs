//! Repository for the `commits` table.

use sqlx::PgExecutor;
use vidgit_core::commit::{Commit, NewCommit};
use vidgit_core::types::{CommitId, DbId};

use crate::models::commit::CommitRow;

/// Column list for commits queries.
const COLUMNS: &str = "commit_id, description, change_set, branch_id, video_id, \
    parent_commit_id, playlist_url, duration, created_at, updated_at";

pub struct CommitRepo;

impl CommitRepo {
    /// Insert a commit with an already-resolved parent.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        commit_id: CommitId,
        parent_commit_id: Option<CommitId>,
        input: &NewCommit,
    ) -> Result<Commit, sqlx::Error> {
        let query = format!(
            "INSERT INTO commits
                (commit_id, description, change_set, branch_id, video_id, parent_commit_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommitRow>(&query)
            .bind(commit_id)
            .bind(&input.description)
            .bind(serde_json::Value::Array(input.change_set.clone()))
            .bind(input.branch_id)
            .bind(input.video_id)
            .bind(parent_commit_id)
            .fetch_one(executor)
            .await
            .map(Into::into)
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        commit_id: CommitId,
    ) -> Result<Option<Commit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM commits WHERE commit_id = $1");
        sqlx::query_as::<_, CommitRow>(&query)
            .bind(commit_id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    /// The id of the most recent commit for a video.
    pub async fn latest_id_for_video(
        executor: impl PgExecutor<'_>,
        video_id: DbId,
    ) -> Result<Option<CommitId>, sqlx::Error> {
        let row: Option<(CommitId,)> = sqlx::query_as(
            "SELECT commit_id FROM commits
             WHERE video_id = $1
             ORDER BY seq DESC
             LIMIT 1",
        )
        .bind(video_id)
        .fetch_optional(executor)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// A video's commit chain, newest first.
    pub async fn list_by_video(
        executor: impl PgExecutor<'_>,
        video_id: DbId,
    ) -> Result<Vec<Commit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM commits
             WHERE video_id = $1
             ORDER BY seq DESC"
        );
        let rows = sqlx::query_as::<_, CommitRow>(&query)
            .bind(video_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Record render output. `updated_at` only moves when a value changes,
    /// so a re-delivered result leaves the row untouched.
    ///
    /// Returns `None` if the commit does not exist.
    pub async fn update_playlist(
        executor: impl PgExecutor<'_>,
        commit_id: CommitId,
        playlist_url: &str,
        duration: f64,
    ) -> Result<Option<Commit>, sqlx::Error> {
        let query = format!(
            "UPDATE commits SET
                playlist_url = $2,
                duration = $3,
                updated_at = CASE
                    WHEN playlist_url IS DISTINCT FROM $2 OR duration IS DISTINCT FROM $3
                    THEN now()
                    ELSE updated_at
                END
             WHERE commit_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommitRow>(&query)
            .bind(commit_id)
            .bind(playlist_url)
            .bind(duration)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }
}

//! Repository for the `videos` table.

use sqlx::PgExecutor;
use vidgit_core::repository::{Video, INITIAL_VIDEO_VERSION};
use vidgit_core::types::DbId;

use crate::models::repository::VideoRow;

/// Column list for videos queries.
const COLUMNS: &str = "id, repository_id, title, description, file_name, version, created_at";

pub struct VideoRepo;

impl VideoRepo {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        repository_id: DbId,
        title: &str,
        description: Option<&str>,
        file_name: &str,
    ) -> Result<Video, sqlx::Error> {
        let query = format!(
            "INSERT INTO videos (repository_id, title, description, file_name, version)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(repository_id)
            .bind(title)
            .bind(description)
            .bind(file_name)
            .bind(INITIAL_VIDEO_VERSION)
            .fetch_one(executor)
            .await
            .map(Into::into)
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Video>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE id = $1");
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    /// Fetch a video and hold a row lock on it until the transaction ends.
    ///
    /// Every write to a video's segments, history or commits takes this lock
    /// first, so writers from different processes serialize per video.
    pub async fn lock(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Video>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM videos WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    pub async fn list_by_repository(
        executor: impl PgExecutor<'_>,
        repository_id: DbId,
    ) -> Result<Vec<Video>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM videos
             WHERE repository_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, VideoRow>(&query)
            .bind(repository_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

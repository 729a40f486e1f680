//! Repository for the `repositories` table.

use sqlx::PgExecutor;
use vidgit_core::repository::{NewRepository, Repository, INITIAL_REPOSITORY_STATUS};
use vidgit_core::types::DbId;

use crate::models::repository::RepositoryRow;

/// Column list for repositories queries.
const COLUMNS: &str = "id, name, description, status, author_id, created_at";

pub struct RepositoryRepo;

impl RepositoryRepo {
    /// Insert a repository in its initial status.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        input: &NewRepository,
    ) -> Result<Repository, sqlx::Error> {
        let query = format!(
            "INSERT INTO repositories (name, description, status, author_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RepositoryRow>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(INITIAL_REPOSITORY_STATUS)
            .bind(input.author_id)
            .fetch_one(executor)
            .await
            .map(Into::into)
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Repository>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM repositories WHERE id = $1");
        sqlx::query_as::<_, RepositoryRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    /// List all repositories, newest first.
    pub async fn list(executor: impl PgExecutor<'_>) -> Result<Vec<Repository>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM repositories ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, RepositoryRow>(&query)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Set a repository's status. Returns `None` if the repository does not exist.
    pub async fn update_status(
        executor: impl PgExecutor<'_>,
        id: DbId,
        status: &str,
    ) -> Result<Option<Repository>, sqlx::Error> {
        let query = format!(
            "UPDATE repositories SET status = $1 WHERE id = $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RepositoryRow>(&query)
            .bind(status)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }
}

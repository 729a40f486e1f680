//! Repository for the `branches` table.

use sqlx::PgExecutor;
use vidgit_core::repository::Branch;
use vidgit_core::types::DbId;

use crate::models::repository::BranchRow;

/// Column list for branches queries.
const COLUMNS: &str = "id, repository_id, name, created_at";

pub struct BranchRepo;

impl BranchRepo {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        repository_id: DbId,
        name: &str,
    ) -> Result<Branch, sqlx::Error> {
        let query = format!(
            "INSERT INTO branches (repository_id, name)
             VALUES ($1, $2)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BranchRow>(&query)
            .bind(repository_id)
            .bind(name)
            .fetch_one(executor)
            .await
            .map(Into::into)
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<Branch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM branches WHERE id = $1");
        sqlx::query_as::<_, BranchRow>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    /// List a repository's branches in creation order.
    pub async fn list_by_repository(
        executor: impl PgExecutor<'_>,
        repository_id: DbId,
    ) -> Result<Vec<Branch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM branches
             WHERE repository_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, BranchRow>(&query)
            .bind(repository_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

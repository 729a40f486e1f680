//! Repository for the `changes` table. Rows are never updated.

use sqlx::PgExecutor;
use vidgit_core::change::Change;
use vidgit_core::types::ChangeId;

use crate::error::StoreError;
use crate::models::timeline::ChangeRow;

/// Column list for changes queries.
const COLUMNS: &str =
    "change_id, video_id, operation, source_video_id, start_ms, end_ms, at_ms, created_at";

pub struct ChangeRepo;

impl ChangeRepo {
    pub async fn create(executor: impl PgExecutor<'_>, change: &Change) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO changes
                (change_id, video_id, operation, source_video_id, start_ms, end_ms, at_ms, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(change.change_id)
        .bind(change.video_id)
        .bind(change.operation.as_str())
        .bind(change.source_video_id)
        .bind(change.start.as_millis())
        .bind(change.end.as_millis())
        .bind(change.at.as_millis())
        .bind(change.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        change_id: ChangeId,
    ) -> Result<Option<Change>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM changes WHERE change_id = $1");
        let row = sqlx::query_as::<_, ChangeRow>(&query)
            .bind(change_id)
            .fetch_optional(executor)
            .await?;
        row.map(Change::try_from).transpose()
    }
}

//! Repository for the `history_nodes` table.
//!
//! The head of a video's chain is its node with the highest `seq`. Nodes are
//! only ever appended after the current head and removed from the head, so
//! `seq` order equals chain order.

use sqlx::types::Json;
use sqlx::PgExecutor;
use vidgit_core::history::HistoryNode;
use vidgit_core::types::{ChangeId, DbId};

use crate::models::timeline::HistoryNodeRow;

/// Column list for history_nodes queries.
const COLUMNS: &str =
    "change_id, video_id, timeline_snapshot, parent_change_id, base_snapshot, created_at";

pub struct HistoryRepo;

impl HistoryRepo {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        node: &HistoryNode,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO history_nodes
                (change_id, video_id, timeline_snapshot, parent_change_id, base_snapshot, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(node.change_id)
        .bind(node.video_id)
        .bind(Json(&node.timeline_snapshot))
        .bind(node.parent_change_id)
        .bind(node.base_snapshot.as_ref().map(Json))
        .bind(node.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        change_id: ChangeId,
    ) -> Result<Option<HistoryNode>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM history_nodes WHERE change_id = $1");
        sqlx::query_as::<_, HistoryNodeRow>(&query)
            .bind(change_id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    /// The current head of a video's chain.
    pub async fn head(
        executor: impl PgExecutor<'_>,
        video_id: DbId,
    ) -> Result<Option<HistoryNode>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM history_nodes
             WHERE video_id = $1
             ORDER BY seq DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, HistoryNodeRow>(&query)
            .bind(video_id)
            .fetch_optional(executor)
            .await
            .map(|row| row.map(Into::into))
    }

    /// A video's chain, head first.
    pub async fn list_by_video(
        executor: impl PgExecutor<'_>,
        video_id: DbId,
    ) -> Result<Vec<HistoryNode>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM history_nodes
             WHERE video_id = $1
             ORDER BY seq DESC"
        );
        let rows = sqlx::query_as::<_, HistoryNodeRow>(&query)
            .bind(video_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete a node. Returns `true` if a row was removed.
    pub async fn delete(
        executor: impl PgExecutor<'_>,
        change_id: ChangeId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM history_nodes WHERE change_id = $1")
            .bind(change_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Repository for the `segments` table.

use sqlx::{PgConnection, PgExecutor};
use vidgit_core::timeline::Segment;
use vidgit_core::types::DbId;

use crate::models::timeline::SegmentRow;

/// Column list for segments queries.
const COLUMNS: &str =
    "video_id, source_video_id, source_start_ms, source_end_ms, global_start_ms";

pub struct SegmentRepo;

impl SegmentRepo {
    /// A video's segments ordered by global position.
    pub async fn list_by_video(
        executor: impl PgExecutor<'_>,
        video_id: DbId,
    ) -> Result<Vec<Segment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM segments
             WHERE video_id = $1
             ORDER BY global_start_ms ASC"
        );
        let rows = sqlx::query_as::<_, SegmentRow>(&query)
            .bind(video_id)
            .fetch_all(executor)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Replace a video's whole segment set.
    ///
    /// Must run inside a transaction; the delete and the insert are only
    /// atomic together.
    pub async fn replace_all(
        conn: &mut PgConnection,
        video_id: DbId,
        segments: &[Segment],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM segments WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *conn)
            .await?;

        if segments.is_empty() {
            return Ok(());
        }

        let sources: Vec<DbId> = segments.iter().map(|s| s.source_video_id).collect();
        let starts: Vec<i64> = segments.iter().map(|s| s.source_start_time.as_millis()).collect();
        let ends: Vec<i64> = segments.iter().map(|s| s.source_end_time.as_millis()).collect();
        let globals: Vec<i64> = segments.iter().map(|s| s.global_start_time.as_millis()).collect();

        sqlx::query(
            "INSERT INTO segments
                (video_id, source_video_id, source_start_ms, source_end_ms, global_start_ms)
             SELECT $1, src, s, e, g
             FROM UNNEST($2::BIGINT[], $3::BIGINT[], $4::BIGINT[], $5::BIGINT[]) AS t(src, s, e, g)",
        )
        .bind(video_id)
        .bind(&sources)
        .bind(&starts)
        .bind(&ends)
        .bind(&globals)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

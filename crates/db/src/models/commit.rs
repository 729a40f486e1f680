//! Rows of the `commits` and `commit_metadata` tables.

use sqlx::FromRow;
use vidgit_core::commit::{Commit, CommitMetadata};
use vidgit_core::types::{CommitId, DbId, Timestamp};

/// A row from the `commits` table.
#[derive(Debug, Clone, FromRow)]
pub struct CommitRow {
    pub commit_id: CommitId,
    pub description: String,
    pub change_set: serde_json::Value,
    pub branch_id: DbId,
    pub video_id: DbId,
    pub parent_commit_id: Option<CommitId>,
    pub playlist_url: Option<String>,
    pub duration: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<CommitRow> for Commit {
    fn from(row: CommitRow) -> Self {
        Self {
            commit_id: row.commit_id,
            description: row.description,
            change_set: row.change_set,
            branch_id: row.branch_id,
            video_id: row.video_id,
            parent_commit_id: row.parent_commit_id,
            playlist_url: row.playlist_url,
            duration: row.duration,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row from the `commit_metadata` table.
#[derive(Debug, Clone, FromRow)]
pub struct CommitMetadataRow {
    pub commit_id: CommitId,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<CommitMetadataRow> for CommitMetadata {
    fn from(row: CommitMetadataRow) -> Self {
        Self {
            commit_id: row.commit_id,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

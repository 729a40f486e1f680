//! Rows of the `repositories`, `branches` and `videos` tables.

use sqlx::FromRow;
use vidgit_core::repository::{Branch, Repository, Video};
use vidgit_core::types::{DbId, Timestamp};

/// A row from the `repositories` table.
#[derive(Debug, Clone, FromRow)]
pub struct RepositoryRow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub author_id: DbId,
    pub created_at: Timestamp,
}

impl From<RepositoryRow> for Repository {
    fn from(row: RepositoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            status: row.status,
            author_id: row.author_id,
            created_at: row.created_at,
        }
    }
}

/// A row from the `branches` table.
#[derive(Debug, Clone, FromRow)]
pub struct BranchRow {
    pub id: DbId,
    pub repository_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Self {
            id: row.id,
            repository_id: row.repository_id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// A row from the `videos` table.
#[derive(Debug, Clone, FromRow)]
pub struct VideoRow {
    pub id: DbId,
    pub repository_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub version: String,
    pub created_at: Timestamp,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            repository_id: row.repository_id,
            title: row.title,
            description: row.description,
            file_name: row.file_name,
            version: row.version,
            created_at: row.created_at,
        }
    }
}

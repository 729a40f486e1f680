//! Repository, branch and video entities plus their validation rules.

use serde::{Deserialize, Serialize};

use crate::commit::Commit;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Name of the branch created together with every repository.
pub const DEFAULT_BRANCH_NAME: &str = "main";

/// Version label of a freshly uploaded video.
pub const INITIAL_VIDEO_VERSION: &str = "v1";

/// Maximum allowed length for a repository name.
pub const MAX_REPOSITORY_NAME_LENGTH: usize = 200;

/// Lifecycle statuses a repository may be in.
pub const VALID_REPOSITORY_STATUSES: &[&str] = &[
    "created",
    "uploading",
    "processing",
    "ready",
    "failed",
    "archived",
];

/// Status assigned on creation.
pub const INITIAL_REPOSITORY_STATUS: &str = "created";

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub author_id: DbId,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: DbId,
    pub repository_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: DbId,
    pub repository_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub version: String,
    pub created_at: Timestamp,
}

/// Input for creating a repository together with its branch and video.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewRepository {
    pub name: String,
    pub description: Option<String>,
    pub author_id: DbId,
    pub file_name: String,
}

/// Everything created by a single repository creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryBundle {
    pub repository: Repository,
    pub branch: Branch,
    pub video: Video,
    pub commit: Commit,
}

/// A repository with its branches and videos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryDetail {
    #[serde(flatten)]
    pub repository: Repository,
    pub branches: Vec<Branch>,
    pub videos: Vec<Video>,
}

impl NewRepository {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_repository_name(&self.name)?;
        if self.author_id <= 0 {
            return Err(CoreError::Validation(format!(
                "author_id must be positive, got {}",
                self.author_id
            )));
        }
        if self.file_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a repository name: non-empty, trimmed, and within
/// [`MAX_REPOSITORY_NAME_LENGTH`].
pub fn validate_repository_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Repository name must not be empty".to_string(),
        ));
    }
    if trimmed.len() != name.len() {
        return Err(CoreError::Validation(
            "Repository name must not have leading or trailing whitespace".to_string(),
        ));
    }
    if name.len() > MAX_REPOSITORY_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Repository name must not exceed {MAX_REPOSITORY_NAME_LENGTH} characters, got {}",
            name.len()
        )));
    }
    Ok(())
}

/// A commit's branch and video must live in the same repository.
pub fn ensure_same_repository(branch: &Branch, video: &Video) -> Result<(), CoreError> {
    if branch.repository_id != video.repository_id {
        return Err(CoreError::Validation(format!(
            "Branch {} and video {} belong to different repositories",
            branch.id, video.id
        )));
    }
    Ok(())
}

/// Validate that a status is one of [`VALID_REPOSITORY_STATUSES`].
pub fn validate_repository_status(status: &str) -> Result<(), CoreError> {
    if VALID_REPOSITORY_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid repository status '{status}'. Must be one of: {}",
            VALID_REPOSITORY_STATUSES.join(", ")
        )))
    }
}

//! Commit chain types, validation, and render-result payloads.
//!
//! A commit snapshots an opaque change set for a video on a branch. Its
//! parent is the video's latest commit at creation time, so the commits of a
//! video form a linear chain. Render output (`playlist_url`, `duration`) and
//! extracted metadata arrive later over the message bus.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{CommitId, DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed length for a commit description.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Maximum number of entries in one commit's change set.
pub const MAX_CHANGE_SET_SIZE: usize = 500;

/// Description of the commit created together with a repository's video.
pub const INITIAL_COMMIT_DESCRIPTION: &str = "Initial video upload";

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub commit_id: CommitId,
    pub description: String,
    /// Opaque JSON array referencing the changes this commit captures.
    pub change_set: serde_json::Value,
    pub branch_id: DbId,
    pub video_id: DbId,
    pub parent_commit_id: Option<CommitId>,
    pub playlist_url: Option<String>,
    pub duration: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for appending a commit to a video's chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCommit {
    pub video_id: DbId,
    pub branch_id: DbId,
    pub description: String,
    pub change_set: Vec<serde_json::Value>,
}

impl NewCommit {
    /// Validate a user-submitted commit. The change set must be non-empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.change_set.is_empty() {
            return Err(CoreError::Validation(
                "changes must contain at least one entry".to_string(),
            ));
        }
        self.validate_fields()
    }

    /// Checks shared with system-created commits, which may be empty.
    pub fn validate_fields(&self) -> Result<(), CoreError> {
        if self.video_id <= 0 || self.branch_id <= 0 {
            return Err(CoreError::Validation(format!(
                "video_id and branch_id must be positive, got {} and {}",
                self.video_id, self.branch_id
            )));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(CoreError::Validation(
                "Description is required".to_string(),
            ));
        }
        if self.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(CoreError::Validation(format!(
                "Description must not exceed {MAX_DESCRIPTION_LENGTH} characters, got {}",
                self.description.len()
            )));
        }
        if self.change_set.len() > MAX_CHANGE_SET_SIZE {
            return Err(CoreError::Validation(format!(
                "A commit may reference at most {MAX_CHANGE_SET_SIZE} changes, got {}",
                self.change_set.len()
            )));
        }
        Ok(())
    }
}

/// Metadata extracted from a commit's rendered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub commit_id: CommitId,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Render pipeline payloads
// ---------------------------------------------------------------------------

/// Payload of a `video.processed` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub commit_id: CommitId,
    pub playlist_url: String,
    pub duration: f64,
}

impl RenderResult {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.playlist_url.trim().is_empty() {
            return Err(CoreError::Validation(
                "playlist_url must not be empty".to_string(),
            ));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(CoreError::Validation(format!(
                "duration must be a non-negative number, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

/// Payload of a `video.metadata.results` message.
///
/// The metadata extractor historically sent camelCase keys; both spellings
/// are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataResult {
    #[serde(alias = "commitId")]
    pub commit_id: CommitId,
    #[serde(alias = "metaData")]
    pub metadata: serde_json::Value,
}

impl MetadataResult {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.metadata.is_null() {
            return Err(CoreError::Validation("metadata is required".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_commit(changes: usize) -> NewCommit {
        NewCommit {
            video_id: 1,
            branch_id: 2,
            description: "trim intro".to_string(),
            change_set: (0..changes).map(|i| serde_json::json!({ "index": i })).collect(),
        }
    }

    #[test]
    fn user_commit_requires_changes() {
        assert!(new_commit(0).validate().is_err());
        assert!(new_commit(1).validate().is_ok());
        assert!(new_commit(0).validate_fields().is_ok());
    }

    #[test]
    fn description_is_required_and_bounded() {
        let mut commit = new_commit(1);
        commit.description = "   ".to_string();
        assert!(commit.validate().is_err());
        commit.description = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        assert!(commit.validate().is_err());
    }

    #[test]
    fn change_set_size_is_bounded() {
        assert!(new_commit(MAX_CHANGE_SET_SIZE + 1).validate().is_err());
    }

    #[test]
    fn render_result_rejects_bad_duration_and_url() {
        let ok = RenderResult {
            commit_id: uuid::Uuid::now_v7(),
            playlist_url: "https://cdn/p.m3u8".to_string(),
            duration: 12.5,
        };
        assert!(ok.validate().is_ok());
        assert!(RenderResult { duration: -1.0, ..ok.clone() }.validate().is_err());
        assert!(RenderResult { duration: f64::NAN, ..ok.clone() }.validate().is_err());
        assert!(RenderResult { playlist_url: " ".into(), ..ok }.validate().is_err());
    }

    #[test]
    fn metadata_result_accepts_camel_case_keys() {
        let id = uuid::Uuid::now_v7();
        let parsed: MetadataResult = serde_json::from_value(serde_json::json!({
            "commitId": id,
            "metaData": { "fps": 30 }
        }))
        .unwrap();
        assert_eq!(parsed.commit_id, id);
        assert_eq!(parsed.metadata["fps"], 30);

        let null_meta = MetadataResult {
            commit_id: id,
            metadata: serde_json::Value::Null,
        };
        assert!(null_meta.validate().is_err());
    }
}

//! Render correlator: feeds render and metadata results back onto commits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use vidgit_core::commit::{MetadataResult, RenderResult};
use vidgit_core::error::CoreError;
use vidgit_events::{topics, BusMessage, HandlerError, MessageHandler};

use crate::commits::CommitService;

fn decode<T: DeserializeOwned>(message: &BusMessage) -> Result<T, HandlerError> {
    message
        .decode()
        .map_err(|e| HandlerError::Malformed(format!("undecodable {} payload: {e}", message.topic)))
}

/// Validation failures can never succeed on retry; everything else might.
fn classify(err: CoreError) -> HandlerError {
    match err {
        CoreError::Validation(msg) => HandlerError::Malformed(msg),
        other => HandlerError::Transient(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// video.processed
// ---------------------------------------------------------------------------

pub struct RenderResultHandler {
    commits: Arc<CommitService>,
}

impl RenderResultHandler {
    pub fn new(commits: Arc<CommitService>) -> Self {
        Self { commits }
    }
}

#[async_trait]
impl MessageHandler for RenderResultHandler {
    fn topic(&self) -> &'static str {
        topics::VIDEO_PROCESSED
    }

    fn name(&self) -> &'static str {
        "render-correlator"
    }

    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        let result: RenderResult = decode(message)?;
        result.validate().map_err(classify)?;

        match self.commits.update_playlist(&result).await.map_err(classify)? {
            Some(commit) => tracing::info!(
                commit_id = %commit.commit_id,
                playlist_url = %result.playlist_url,
                duration = result.duration,
                "Render result recorded"
            ),
            None => tracing::warn!(
                commit_id = %result.commit_id,
                "Render result for unknown commit, acknowledging"
            ),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// video.metadata.results
// ---------------------------------------------------------------------------

pub struct MetadataResultHandler {
    commits: Arc<CommitService>,
}

impl MetadataResultHandler {
    pub fn new(commits: Arc<CommitService>) -> Self {
        Self { commits }
    }
}

#[async_trait]
impl MessageHandler for MetadataResultHandler {
    fn topic(&self) -> &'static str {
        topics::VIDEO_METADATA_RESULTS
    }

    fn name(&self) -> &'static str {
        "metadata-correlator"
    }

    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        let result: MetadataResult = decode(message)?;
        result.validate().map_err(classify)?;

        match self.commits.save_metadata(&result).await {
            Ok(_) => {
                tracing::info!(commit_id = %result.commit_id, "Commit metadata recorded");
                Ok(())
            }
            Err(CoreError::NotFound { .. }) => {
                tracing::warn!(
                    commit_id = %result.commit_id,
                    "Metadata for unknown commit, acknowledging"
                );
                Ok(())
            }
            Err(e) => Err(classify(e)),
        }
    }
}

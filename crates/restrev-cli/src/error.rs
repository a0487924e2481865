use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] restrev_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Review text cannot be empty")]
    EmptyComments,
    #[error("Review key cannot be empty")]
    EmptyReviewKey,
    #[error("Review not found in local cache: {0}")]
    ReviewNotCached(String),
    #[error("Not a restaurant id or page URL: {0}")]
    InvalidTarget(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync left {0} mutation(s) queued")]
    SyncIncomplete(usize),
}

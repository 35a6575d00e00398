use thiserror::Error;

/// Failure of a feed refresh or of a feed lookup by uuid.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Twitter credentials incomplete: {0} missing")]
    MissingCredentials(&'static str),

    #[error("Target of feed '{feed}' is not a valid URL: {target}")]
    InvalidTarget { feed: String, target: String },

    #[error("Failed to refresh feed '{feed}', reason: {reason}")]
    RefreshFailed { feed: String, reason: String },

    #[error("Feed does not exist: {0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl FeedError {
    pub(crate) fn failed(feed: &str, reason: impl std::fmt::Display) -> Self {
        FeedError::RefreshFailed {
            feed: feed.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Amount must be a positive number")]
    InvalidAmount,

    #[error("Failed to render feed list: {0}")]
    Template(#[from] askama::Error),
}

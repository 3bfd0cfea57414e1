use crate::{ApiError, ConfigError, PaginationError, transport::TransportError};

/// Any error returned by a service call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The project settings are unusable for this call: a malformed base URL,
    /// a missing project id, or a missing credential.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A required argument was missing or invalid. Nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The API rejected the request, or the response was unusable.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The request could not be sent, or the response could not be read.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The request body could not be serialized.
    #[error("Failed to encode request body")]
    Encode(#[from] serde_json::Error),
    /// The query string could not be serialized.
    #[error("Failed to encode query string")]
    Query(#[from] serde_qs::Error),
    /// A listing could not be completed.
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

/// A required argument was missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A dataset name is required.
    #[error("A dataset name is required")]
    MissingDatasetName,
    /// A display name is required.
    #[error("A display name is required")]
    MissingDisplayName,
    /// At least one property to index by is required.
    #[error("A value to index by is required")]
    MissingIndexBy,
    /// A timeframe is required.
    #[error("A timeframe is required")]
    MissingTimeframe,
    /// A query field needed for caching was left blank.
    #[error("The query must specify {0}")]
    MissingQueryField(&'static str),
    /// An access key name is required.
    #[error("An access key name is required")]
    MissingAccessKeyName,
}

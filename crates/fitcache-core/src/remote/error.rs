use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Not signed in or token rejected")]
    Unauthorized,

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Concurrent write rejected: {0}")]
    Conflict(String),

    #[error("Malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Http(anyhow::Error),
}

impl RemoteError {
    /// Classify an error coming out of `ApiClient`.
    pub fn from_http(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::Unauthorized) | Some(ApiError::AccessDenied(_)) => RemoteError::Unauthorized,
            Some(ApiError::NotFound(body)) => RemoteError::NotFound(body.clone()),
            Some(ApiError::Conflict(body)) => RemoteError::Conflict(body.clone()),
            _ => RemoteError::Http(err),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Unavailable(_) => true,
            RemoteError::Http(err) => err
                .downcast_ref::<ApiError>()
                .map(ApiError::is_transient)
                .unwrap_or(true),
            _ => false,
        }
    }
}

//! Error types for the Atomgraph server.

use atomgraph_engine::EngineError;
use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Atom not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(id) => Self::NotFound(id),
            EngineError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            EngineError::UpstreamUnavailable(msg) | EngineError::Embedding(msg) => {
                Self::UpstreamUnavailable(msg)
            }
            EngineError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<ApiError> for JsonRpcError {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::NotFound(_) => JsonRpcError::not_found(err.to_string()),
            ApiError::InvalidArgument(_) => JsonRpcError::invalid_params(err.to_string()),
            ApiError::UpstreamUnavailable(_) => {
                JsonRpcError::upstream_unavailable(err.to_string())
            }
            ApiError::Cancelled => JsonRpcError::cancelled(),
            ApiError::MethodNotFound(method) => JsonRpcError::method_not_found(method.clone()),
            ApiError::Snapshot(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                JsonRpcError::internal_error(err.to_string())
            }
        }
    }
}

/// Result type alias for server operations.
pub type ApiResult<T> = Result<T, ApiError>;

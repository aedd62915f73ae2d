//! Error types for atomgraph-engine

use thiserror::Error;

/// Errors that can occur in the retrieval and impact-analysis engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested atom does not exist in the snapshot
    #[error("Atom not found: {0}")]
    NotFound(String),

    /// Caller supplied an argument outside the contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector backend unreachable, errored, or timed out
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Request was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// Embedding generation error
    #[error("Embedding error: {0}")]
    Embedding(String),
}

impl EngineError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an upstream unavailable error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Whether this error is recoverable by degrading to graph-only retrieval
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_) | Self::Embedding(_))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = EngineError::not_found("REQ-001");
        assert_eq!(err.to_string(), "Atom not found: REQ-001");
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = EngineError::invalid_argument("maxDepth must be non-negative");
        assert_eq!(
            err.to_string(),
            "Invalid argument: maxDepth must be non-negative"
        );
    }

    #[test]
    fn test_cancelled_display() {
        let err = EngineError::Cancelled;
        assert_eq!(err.to_string(), "Request cancelled");
    }

    #[test]
    fn test_upstream_is_degradable() {
        assert!(EngineError::upstream("timeout").is_degradable());
        assert!(EngineError::embedding("provider 500").is_degradable());
        assert!(!EngineError::not_found("X").is_degradable());
        assert!(!EngineError::Cancelled.is_degradable());
    }
}

//! Error types for the sandbox channel

/// Channel transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Channel was closed
    #[error("channel closed")]
    Closed,

    /// Message could not be encoded or delivered
    #[error("message rejected: {0}")]
    Rejected(String),
}

impl ChannelError {
    /// Create rejection error
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Result type alias for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

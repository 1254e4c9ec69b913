//! Error types for the conversation layer

use crate::relay::RelayError;
use crate::room::RoomError;
use thiserror::Error;

/// Result type for conversation operations
pub type ConversationResult<T> = Result<T, ConversationError>;

/// Errors surfaced by the conversation controller
///
/// All of these are advisory: they fail the requested operation, never the
/// session. Selecting another counterpart is always possible afterwards.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Room resolution rejected an identity
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] RoomError),

    /// The room could not be joined on the realtime channel
    #[error("failed to join room: {0}")]
    JoinFailed(RelayError),

    /// A send was attempted while the channel is disconnected; the message
    /// was not queued and not appended
    #[error("realtime channel unavailable, message not sent")]
    ChannelUnavailable,

    /// Other realtime channel failure during an operation
    #[error("realtime channel error: {0}")]
    Relay(RelayError),

    /// An operation that requires an active conversation was called without one
    #[error("no active conversation")]
    NoActiveConversation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConversationError::ChannelUnavailable;
        assert_eq!(
            err.to_string(),
            "realtime channel unavailable, message not sent"
        );

        let err = ConversationError::InvalidIdentity(RoomError::InvalidIdentity(
            "identity must be non-empty".to_string(),
        ));
        assert!(err.to_string().contains("invalid identity"));
    }
}

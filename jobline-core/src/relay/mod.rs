//! Realtime Channel
//!
//! A persistent bidirectional connection to the messaging relay. The wire
//! protocol is JSON frames tagged with the relay's event names: outbound
//! `join_room`, `leave_room`, `send_message` and `typing`; inbound
//! `receive_message` and `user_typing`.
//!
//! The channel is a shared transport; room membership policy (at most one
//! active room per controller) lives in the conversation layer, not here.

use crate::model::{ChatMessage, RoomId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

mod ws;

pub use ws::WsRelayChannel;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur on the realtime channel
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// The channel is not currently connected; the operation was not queued
    #[error("realtime channel unavailable")]
    ChannelUnavailable,

    /// Underlying transport failure
    #[error("relay transport error: {0}")]
    Transport(String),

    /// A frame could not be encoded
    #[error("failed to encode relay frame: {0}")]
    Serialization(String),

    /// The connection task has shut down and will not come back
    #[error("relay connection has been closed")]
    Closed,
}

/// Wire frame exchanged with the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RelayFrame {
    /// Subscribe this connection to a room
    JoinRoom { room: RoomId },

    /// Unsubscribe this connection from a room
    LeaveRoom { room: RoomId },

    /// Emit a message into a room
    SendMessage { room: RoomId, message: ChatMessage },

    /// Signal that this participant is typing in a room
    Typing { room: RoomId },

    /// A message was delivered to this connection
    ReceiveMessage { room: RoomId, message: ChatMessage },

    /// A counterpart is typing in a room
    UserTyping { room: RoomId },
}

impl RelayFrame {
    /// Map an inbound frame to a consumer event; outbound-only frames yield
    /// nothing (a well-behaved relay never sends them to a client).
    pub fn into_event(self) -> Option<RelayEvent> {
        match self {
            RelayFrame::ReceiveMessage { room, message } => {
                Some(RelayEvent::MessageReceived { room, message })
            }
            RelayFrame::UserTyping { room } => Some(RelayEvent::TypingReceived { room }),
            _ => None,
        }
    }
}

/// Events delivered to channel subscribers
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A message arrived for a room this connection is subscribed to
    MessageReceived { room: RoomId, message: ChatMessage },

    /// A counterpart signalled typing in a room
    TypingReceived { room: RoomId },

    /// The underlying connection was (re-)established. Room subscriptions do
    /// NOT survive this; whoever owns a room must re-join explicitly.
    Connected,

    /// The underlying connection was lost
    Disconnected,
}

/// Trait for realtime channels
///
/// Sends must fail fast with [`RelayError::ChannelUnavailable`] while the
/// transport is down; nothing is silently queued.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    /// Subscribe this connection to a room
    async fn join_room(&self, room: &RoomId) -> RelayResult<()>;

    /// Unsubscribe this connection from a room
    async fn leave_room(&self, room: &RoomId) -> RelayResult<()>;

    /// Emit a message into a room
    async fn send_message(&self, room: &RoomId, message: &ChatMessage) -> RelayResult<()>;

    /// Emit a typing signal into a room
    async fn send_typing(&self, room: &RoomId) -> RelayResult<()>;

    /// Subscribe to channel events
    fn subscribe(&self) -> broadcast::Receiver<RelayEvent>;

    /// Whether the transport is currently connected
    fn is_connected(&self) -> bool;
}

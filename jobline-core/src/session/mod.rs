//! Session context for the current participant
//!
//! The original client read the current identity out of ambient process-wide
//! storage. Here it is an explicit value constructed by the embedding
//! application and passed into whatever needs it, which keeps the controller
//! independently testable.

use crate::model::{CounterpartKind, UserId};
use serde::{Deserialize, Serialize};

/// The current participant's identity for the lifetime of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// This participant's identity
    pub user_id: UserId,

    /// Display name stamped onto outgoing messages
    pub display_name: String,

    /// Which side of the board this participant is on
    pub kind: CounterpartKind,
}

impl SessionContext {
    /// Create a new session context
    pub fn new(user_id: UserId, display_name: impl Into<String>, kind: CounterpartKind) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            kind,
        }
    }
}

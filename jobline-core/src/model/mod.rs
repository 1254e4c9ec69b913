/*
    mod.rs - Common types for the jobline chat core

    Defines:
    - Timestamps
    - IDs for participants and rooms
    - Message and counterpart records
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp representing the current time
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as u64)
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Get milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque participant identity, sourced externally and immutable for the session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn generate() -> Self {
        use uuid::Uuid;
        UserId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical conversation identifier derived from an unordered pair of
/// participant identities. Built only by [`crate::room::resolve_room`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single chat message as it appears in a conversation log.
///
/// Logs are append-only: messages are kept in the order they were sent or
/// received, with no reordering or deduplication at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's identity
    pub sender: UserId,

    /// Sender's display name at send time
    pub sender_name: String,

    /// Message body
    pub body: String,

    /// When the message was created by its sender
    pub sent_at: Timestamp,
}

impl ChatMessage {
    /// Create a new message stamped with the current time
    pub fn new(sender: UserId, sender_name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender,
            sender_name: sender_name.into(),
            body: body.into(),
            sent_at: Timestamp::now(),
        }
    }
}

/// Which side of the job board a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterpartKind {
    #[serde(rename = "jobseeker")]
    JobSeeker,
    #[serde(rename = "employer")]
    Employer,
}

impl CounterpartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartKind::JobSeeker => "jobseeker",
            CounterpartKind::Employer => "employer",
        }
    }
}

impl fmt::Display for CounterpartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A participant available to message.
///
/// The directory wire format carries two mutually exclusive name fields; here
/// the kind is a tagged variant and the name is resolved exactly once, at the
/// directory boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Counterpart {
    #[serde(rename = "jobseeker")]
    JobSeeker { id: UserId, name: String },
    #[serde(rename = "employer")]
    Employer { id: UserId, name: String },
}

impl Counterpart {
    pub fn id(&self) -> &UserId {
        match self {
            Counterpart::JobSeeker { id, .. } | Counterpart::Employer { id, .. } => id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Counterpart::JobSeeker { name, .. } | Counterpart::Employer { name, .. } => name,
        }
    }

    pub fn kind(&self) -> CounterpartKind {
        match self {
            Counterpart::JobSeeker { .. } => CounterpartKind::JobSeeker,
            Counterpart::Employer { .. } => CounterpartKind::Employer,
        }
    }
}

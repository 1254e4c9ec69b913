//! Jobline chat core
//!
//! The realtime messaging core of the jobline job board: job seekers and
//! employers pick a counterpart from the directory and exchange messages in
//! a per-pair room over a relay connection, with history seeded from the
//! REST backend.
//!
//! The directory, the history store, and the relay are external
//! collaborators consumed through traits; this crate owns room identity
//! resolution and the conversation state machine.

pub mod config;
pub mod conversation;
pub mod directory;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod relay;
pub mod room;
pub mod session;
pub mod test_support;

pub use config::Config;
pub use conversation::{
    ConversationController, ConversationError, ConversationSnapshot, ConversationStatus,
};
pub use directory::fetch_counterparts;
pub use logging::{init_logging, LogLevel};
pub use model::{ChatMessage, Counterpart, CounterpartKind, RoomId, Timestamp, UserId};
pub use room::resolve_room;
pub use session::SessionContext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure the main exports are accessible
        let _ = LogLevel::Info;
        let _ = ConversationStatus::Idle;
    }
}

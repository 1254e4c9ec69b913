//! Mock collaborators for testing the chat core without a live backend
//!
//! These implement the real service traits so controller logic can be
//! exercised deterministically: the relay records every call and lets tests
//! inject inbound events; the history store supports canned logs, failures
//! and artificial latency (for racing selections against slow fetches).
//!
//! [`TestBackend`] in the sibling module goes one step further and stands up
//! a real in-process HTTP/WebSocket backend.

use crate::directory::{DirectoryResult, DirectoryService, DirectoryUser};
use crate::history::{HistoryError, HistoryResult, HistoryStore};
use crate::model::{ChatMessage, RoomId};
use crate::relay::{RelayChannel, RelayError, RelayEvent, RelayResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

mod backend;

pub use backend::TestBackend;

/// In-memory relay double
pub struct MockRelay {
    connected: AtomicBool,
    joins_fail: AtomicBool,
    joined: Mutex<Vec<RoomId>>,
    left: Mutex<Vec<RoomId>>,
    sent: Mutex<Vec<(RoomId, ChatMessage)>>,
    typing: Mutex<Vec<RoomId>>,
    events: broadcast::Sender<RelayEvent>,
}

impl MockRelay {
    /// Create a connected mock relay
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            connected: AtomicBool::new(true),
            joins_fail: AtomicBool::new(false),
            joined: Mutex::new(Vec::new()),
            left: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            typing: Mutex::new(Vec::new()),
            events,
        })
    }

    /// Toggle the simulated transport state
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make subsequent join attempts fail with a transport error
    pub fn fail_joins(&self, fail: bool) {
        self.joins_fail.store(fail, Ordering::SeqCst);
    }

    /// Deliver an inbound event to subscribers
    pub fn inject(&self, event: RelayEvent) {
        let _ = self.events.send(event);
    }

    /// Rooms joined so far, in call order
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.joined.lock().unwrap().clone()
    }

    /// Rooms left so far, in call order
    pub fn left_rooms(&self) -> Vec<RoomId> {
        self.left.lock().unwrap().clone()
    }

    /// Messages emitted so far
    pub fn sent_messages(&self) -> Vec<(RoomId, ChatMessage)> {
        self.sent.lock().unwrap().clone()
    }

    /// Rooms typing signals were emitted into
    pub fn typing_rooms(&self) -> Vec<RoomId> {
        self.typing.lock().unwrap().clone()
    }

    fn ensure_connected(&self) -> RelayResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::ChannelUnavailable)
        }
    }
}

#[async_trait]
impl RelayChannel for MockRelay {
    async fn join_room(&self, room: &RoomId) -> RelayResult<()> {
        self.ensure_connected()?;
        if self.joins_fail.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("join refused".to_string()));
        }
        self.joined.lock().unwrap().push(room.clone());
        Ok(())
    }

    async fn leave_room(&self, room: &RoomId) -> RelayResult<()> {
        self.ensure_connected()?;
        self.left.lock().unwrap().push(room.clone());
        Ok(())
    }

    async fn send_message(&self, room: &RoomId, message: &ChatMessage) -> RelayResult<()> {
        self.ensure_connected()?;
        self.sent
            .lock()
            .unwrap()
            .push((room.clone(), message.clone()));
        Ok(())
    }

    async fn send_typing(&self, room: &RoomId) -> RelayResult<()> {
        self.ensure_connected()?;
        self.typing.lock().unwrap().push(room.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// In-memory history store double
pub struct MockHistory {
    logs: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
    delays: Mutex<HashMap<RoomId, Duration>>,
    fail: AtomicBool,
}

impl MockHistory {
    /// Create an empty history store
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            logs: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        })
    }

    /// Seed the canned log for a room
    pub fn preload(&self, room: RoomId, messages: Vec<ChatMessage>) {
        self.logs.lock().unwrap().insert(room, messages);
    }

    /// Delay fetches for a room by a fixed duration
    pub fn delay_fetch(&self, room: RoomId, delay: Duration) {
        self.delays.lock().unwrap().insert(room, delay);
    }

    /// Make all fetches fail
    pub fn fail_fetches(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl HistoryStore for MockHistory {
    async fn messages_for_room(&self, room: &RoomId) -> HistoryResult<Vec<ChatMessage>> {
        let delay = self.delays.lock().unwrap().get(room).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(HistoryError::Status(500));
        }

        Ok(self
            .logs
            .lock()
            .unwrap()
            .get(room)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory directory double
pub struct MockDirectory {
    users: Mutex<Vec<DirectoryUser>>,
}

impl MockDirectory {
    /// Create a directory with the given records
    pub fn with_users(users: Vec<DirectoryUser>) -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(users),
        })
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn list_users(&self) -> DirectoryResult<Vec<DirectoryUser>> {
        Ok(self.users.lock().unwrap().clone())
    }
}

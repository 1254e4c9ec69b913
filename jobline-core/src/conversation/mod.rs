//! Conversation Controller - Main Orchestrator for the Chat Core
//!
//! This module owns the state of the single active conversation and
//! coordinates the room resolver, the history store, and the realtime
//! channel.
//!
//! # Responsibilities
//!
//! - **Selection**: resolve the room for a counterpart, leave the previous
//!   room, seed the log from history, join on the relay
//! - **Sending**: validate, emit on the channel, append optimistically
//! - **Inbound events**: append messages for the active room, buffer
//!   messages that race the history fetch, drop stale-room events
//! - **Typing indicator**: self-clearing flag armed by counterpart signals
//!
//! # State machine
//!
//! ```text
//! Idle ──select──▶ Loading ──join+history──▶ Active
//!                     │                        │
//!                     └──join failed──▶ Failed │
//!                                              └──deselect──▶ Idle
//! ```
//!
//! The controller is the sole writer of conversation state; the display
//! layer reads [`ConversationSnapshot`] copies and calls operations.

use crate::config::ChatConfig;
use crate::history::HistoryStore;
use crate::metrics;
use crate::model::{ChatMessage, Counterpart, RoomId};
use crate::relay::{RelayChannel, RelayError, RelayEvent, RelayResult};
use crate::room::resolve_room;
use crate::session::SessionContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

mod errors;

pub use errors::{ConversationError, ConversationResult};

/// Lifecycle of the active conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    /// No counterpart selected
    Idle,
    /// History fetch and room join in flight
    Loading,
    /// Subscribed to the room, log populated
    Active,
    /// The last selection could not be completed
    Failed,
}

/// Read-only view of the conversation for the display layer
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    pub status: ConversationStatus,
    pub room_id: Option<RoomId>,
    pub counterpart: Option<Counterpart>,
    pub messages: Vec<ChatMessage>,
    pub typing: bool,
}

/// Scoped room membership on the realtime channel.
///
/// Acquiring joins the room; every exit path releases it — explicitly via
/// [`RoomSubscription::release`], or as a best-effort background leave when
/// the guard is dropped while still armed.
pub struct RoomSubscription {
    relay: Arc<dyn RelayChannel>,
    room: RoomId,
    armed: bool,
}

impl RoomSubscription {
    /// Join `room` and return the guard holding the membership
    pub async fn acquire(relay: Arc<dyn RelayChannel>, room: RoomId) -> RelayResult<Self> {
        relay.join_room(&room).await?;
        Ok(Self {
            relay,
            room,
            armed: true,
        })
    }

    /// The subscribed room
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Leave the room explicitly
    pub async fn release(mut self) {
        self.armed = false;
        if let Err(e) = self.relay.leave_room(&self.room).await {
            debug!(room = %self.room, error = %e, "Leave on release failed");
        }
    }

    /// Give up the guard without leaving; used when another owner has taken
    /// over the same room
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let relay = self.relay.clone();
        let room = self.room.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = relay.leave_room(&room).await;
            });
        }
    }
}

struct ActiveConversation {
    room_id: RoomId,
    counterpart: Counterpart,
    subscription: RoomSubscription,
    log: Vec<ChatMessage>,
    typing: bool,
}

struct PendingSelection {
    room_id: RoomId,
    buffered: Vec<ChatMessage>,
}

struct Inner {
    status: ConversationStatus,
    active: Option<ActiveConversation>,
    pending: Option<PendingSelection>,
    /// Bumped on every selection change; in-flight selections compare
    /// against it and abandon their result when superseded
    generation: u64,
    /// Bumped on every typing signal so a stale clear timer can tell it
    /// has been outrun by a newer signal
    typing_epoch: u64,
}

/// Conversation controller - orchestrates the single active room
pub struct ConversationController {
    session: SessionContext,
    history: Arc<dyn HistoryStore>,
    relay: Arc<dyn RelayChannel>,
    typing_quiet_period: Duration,
    inner: Arc<RwLock<Inner>>,
}

impl ConversationController {
    /// Create a new controller
    ///
    /// # Arguments
    ///
    /// * `session` - Current participant identity (explicit, never ambient)
    /// * `history` - History store for seeding room logs
    /// * `relay` - Realtime channel shared with the rest of the session
    /// * `chat` - Conversation behavior settings
    pub fn new(
        session: SessionContext,
        history: Arc<dyn HistoryStore>,
        relay: Arc<dyn RelayChannel>,
        chat: ChatConfig,
    ) -> Self {
        info!(user_id = %session.user_id, "Creating ConversationController");

        Self {
            session,
            history,
            relay,
            typing_quiet_period: chat.typing_quiet_period,
            inner: Arc::new(RwLock::new(Inner {
                status: ConversationStatus::Idle,
                active: None,
                pending: None,
                generation: 0,
                typing_epoch: 0,
            })),
        }
    }

    /// The session this controller speaks for
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Current lifecycle status
    pub async fn status(&self) -> ConversationStatus {
        self.inner.read().await.status
    }

    /// Read-only view of the current conversation
    pub async fn snapshot(&self) -> ConversationSnapshot {
        let inner = self.inner.read().await;
        match (&inner.active, &inner.pending) {
            (Some(active), _) => ConversationSnapshot {
                status: inner.status,
                room_id: Some(active.room_id.clone()),
                counterpart: Some(active.counterpart.clone()),
                messages: active.log.clone(),
                typing: active.typing,
            },
            (None, Some(pending)) => ConversationSnapshot {
                status: inner.status,
                room_id: Some(pending.room_id.clone()),
                counterpart: None,
                messages: Vec::new(),
                typing: false,
            },
            (None, None) => ConversationSnapshot {
                status: inner.status,
                room_id: None,
                counterpart: None,
                messages: Vec::new(),
                typing: false,
            },
        }
    }

    /// Select a counterpart and bring their conversation up.
    ///
    /// Leaves the previously active room first; at most one room is ever
    /// subscribed. A history failure degrades to an empty log (the
    /// conversation stays usable for new messages); a join failure moves the
    /// controller to [`ConversationStatus::Failed`].
    ///
    /// If another selection happens while this one is still fetching or
    /// joining, the slower one abandons its result - the log can never be
    /// seeded with a stale counterpart's history.
    pub async fn select_counterpart(&self, counterpart: Counterpart) -> ConversationResult<()> {
        // Validate before tearing anything down: a degenerate identity must
        // not cost us the current conversation.
        let room_id = resolve_room(&self.session.user_id, counterpart.id())?;

        info!(
            room = %room_id,
            counterpart = %counterpart.id(),
            "Selecting counterpart"
        );

        let (generation, previous) = {
            let mut inner = self.inner.write().await;
            inner.generation += 1;
            inner.status = ConversationStatus::Loading;
            inner.pending = Some(PendingSelection {
                room_id: room_id.clone(),
                buffered: Vec::new(),
            });
            (inner.generation, inner.active.take())
        };

        if let Some(previous) = previous {
            debug!(room = %previous.room_id, "Leaving previous room");
            previous.subscription.release().await;
        }

        let seeded = match self.history.messages_for_room(&room_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(room = %room_id, error = %e, "History fetch failed, starting with empty log");
                metrics::record_history_fallback();
                Vec::new()
            }
        };

        // Bail before joining if a newer selection has taken over.
        if self.inner.read().await.generation != generation {
            debug!(room = %room_id, "Selection superseded during history fetch");
            return Ok(());
        }

        let subscription =
            match RoomSubscription::acquire(self.relay.clone(), room_id.clone()).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(room = %room_id, error = %e, "Room join failed");
                    let mut inner = self.inner.write().await;
                    if inner.generation == generation {
                        inner.status = ConversationStatus::Failed;
                        inner.pending = None;
                    }
                    return Err(ConversationError::JoinFailed(e));
                }
            };

        let mut inner = self.inner.write().await;
        if inner.generation != generation {
            // A newer selection won while we were joining. Leave the room we
            // grabbed unless the winner is using the very same one.
            let still_used = inner
                .active
                .as_ref()
                .map(|a| a.room_id == room_id)
                .unwrap_or(false)
                || inner
                    .pending
                    .as_ref()
                    .map(|p| p.room_id == room_id)
                    .unwrap_or(false);
            drop(inner);
            if still_used {
                subscription.disarm();
            } else {
                subscription.release().await;
            }
            debug!(room = %room_id, "Selection superseded during join");
            return Ok(());
        }

        let mut log = seeded;
        if let Some(pending) = inner.pending.take() {
            log.extend(pending.buffered);
        }

        info!(room = %room_id, seeded = log.len(), "Conversation active");
        inner.active = Some(ActiveConversation {
            room_id,
            counterpart,
            subscription,
            log,
            typing: false,
        });
        inner.status = ConversationStatus::Active;

        Ok(())
    }

    /// Send a message to the active conversation.
    ///
    /// A body that is empty after trimming is a no-op, not an error. On
    /// success the message is appended to the local log (optimistic); when
    /// the channel is down nothing is appended and
    /// [`ConversationError::ChannelUnavailable`] is returned.
    pub async fn send(&self, body: &str) -> ConversationResult<Option<ChatMessage>> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(None);
        }

        let room_id = {
            let inner = self.inner.read().await;
            match &inner.active {
                Some(active) => active.room_id.clone(),
                None => return Err(ConversationError::NoActiveConversation),
            }
        };

        let message = ChatMessage::new(
            self.session.user_id.clone(),
            self.session.display_name.clone(),
            body,
        );

        self.relay
            .send_message(&room_id, &message)
            .await
            .map_err(|e| match e {
                RelayError::ChannelUnavailable => ConversationError::ChannelUnavailable,
                other => ConversationError::Relay(other),
            })?;

        metrics::record_message_sent();

        let mut inner = self.inner.write().await;
        match inner.active.as_mut() {
            Some(active) if active.room_id == room_id => {
                active.log.push(message.clone());
            }
            _ => {
                // The conversation changed between emit and append; the
                // message went out but has no log to land in anymore.
                debug!(room = %room_id, "Conversation gone after send, dropping local append");
            }
        }

        Ok(Some(message))
    }

    /// Signal the counterpart that this participant is typing.
    ///
    /// Rate limiting is the caller's concern; the controller forwards every
    /// signal it is given.
    pub async fn notify_typing(&self) -> ConversationResult<()> {
        let room_id = {
            let inner = self.inner.read().await;
            match &inner.active {
                Some(active) => active.room_id.clone(),
                None => return Err(ConversationError::NoActiveConversation),
            }
        };

        self.relay
            .send_typing(&room_id)
            .await
            .map_err(|e| match e {
                RelayError::ChannelUnavailable => ConversationError::ChannelUnavailable,
                other => ConversationError::Relay(other),
            })
    }

    /// Process an inbound relay event.
    ///
    /// Messages for the active room are appended in receipt order; messages
    /// for a room that is still loading are buffered and appended after the
    /// history seed; everything else is a stale-room event and is dropped
    /// without surfacing to the user.
    pub async fn handle_event(&self, event: RelayEvent) {
        match event {
            RelayEvent::MessageReceived { room, message } => {
                if message.sender == self.session.user_id {
                    // Relay echo of our own optimistic append.
                    debug!(room = %room, "Dropping echo of own message");
                    return;
                }

                let mut inner = self.inner.write().await;
                if let Some(active) = inner.active.as_mut() {
                    if active.room_id == room {
                        active.log.push(message);
                        metrics::record_message_received();
                        return;
                    }
                }
                if let Some(pending) = inner.pending.as_mut() {
                    if pending.room_id == room {
                        debug!(room = %room, "Buffering message that raced the history fetch");
                        pending.buffered.push(message);
                        return;
                    }
                }

                debug!(room = %room, "Dropping message for non-active room");
                metrics::record_stale_room_drop();
            }
            RelayEvent::TypingReceived { room } => {
                let epoch = {
                    let mut guard = self.inner.write().await;
                    let inner = &mut *guard;
                    let Some(active) = inner.active.as_mut() else {
                        metrics::record_stale_room_drop();
                        return;
                    };
                    if active.room_id != room {
                        metrics::record_stale_room_drop();
                        return;
                    }
                    active.typing = true;
                    inner.typing_epoch += 1;
                    inner.typing_epoch
                };

                // Self-clearing flag: a quiet period with no further signal
                // resets it, no inbound message required.
                let state = Arc::clone(&self.inner);
                let quiet = self.typing_quiet_period;
                tokio::spawn(async move {
                    tokio::time::sleep(quiet).await;
                    let mut inner = state.write().await;
                    if inner.typing_epoch == epoch {
                        if let Some(active) = inner.active.as_mut() {
                            active.typing = false;
                        }
                    }
                });
            }
            RelayEvent::Disconnected => {
                warn!("Realtime channel lost");
                let mut inner = self.inner.write().await;
                if let Some(active) = inner.active.as_mut() {
                    // No counterpart signal can arrive while disconnected.
                    active.typing = false;
                }
            }
            RelayEvent::Connected => {
                // Room subscriptions do not survive a reconnect; resuming
                // delivery requires an explicit re-selection by the owner.
                debug!("Realtime channel (re-)established");
            }
        }
    }

    /// Deselect the current counterpart and return to idle
    pub async fn deselect(&self) {
        let previous = {
            let mut inner = self.inner.write().await;
            inner.generation += 1;
            inner.pending = None;
            inner.status = ConversationStatus::Idle;
            inner.active.take()
        };

        if let Some(previous) = previous {
            info!(room = %previous.room_id, "Deselecting conversation");
            previous.subscription.release().await;
        }
    }

    /// Forward relay events into this controller from a background task
    pub fn spawn_event_pump(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut events = controller.relay.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => controller.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Conversation event pump lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CounterpartKind, UserId};
    use crate::test_support::{MockHistory, MockRelay};

    fn test_session() -> SessionContext {
        SessionContext::new(UserId::new("u1"), "Alice", CounterpartKind::JobSeeker)
    }

    fn bob() -> Counterpart {
        Counterpart::JobSeeker {
            id: UserId::new("u2"),
            name: "Bob".to_string(),
        }
    }

    fn carol() -> Counterpart {
        Counterpart::Employer {
            id: UserId::new("u3"),
            name: "Carol Staffing".to_string(),
        }
    }

    fn room(id: &str) -> RoomId {
        RoomId(id.to_string())
    }

    fn controller_with(
        relay: Arc<MockRelay>,
        history: Arc<MockHistory>,
    ) -> Arc<ConversationController> {
        Arc::new(ConversationController::new(
            test_session(),
            history,
            relay,
            ChatConfig::default(),
        ))
    }

    fn create_test_controller() -> (Arc<ConversationController>, Arc<MockRelay>, Arc<MockHistory>)
    {
        let relay = MockRelay::new();
        let history = MockHistory::new();
        let controller = controller_with(relay.clone(), history.clone());
        (controller, relay, history)
    }

    #[tokio::test]
    async fn test_select_seeds_history_then_send_appends() {
        let (controller, relay, history) = create_test_controller();
        history.preload(
            room("u1-u2"),
            vec![ChatMessage::new(UserId::new("u2"), "Bob", "hi")],
        );

        controller.select_counterpart(bob()).await.unwrap();

        assert_eq!(controller.status().await, ConversationStatus::Active);
        assert!(relay.joined_rooms().contains(&room("u1-u2")));

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.room_id, Some(room("u1-u2")));
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].sender.as_str(), "u2");
        assert_eq!(snapshot.messages[0].body, "hi");

        let sent = controller.send("yo").await.unwrap().unwrap();
        assert_eq!(sent.sender.as_str(), "u1");

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.messages[1].sender.as_str(), "u1");
        assert_eq!(snapshot.messages[1].body, "yo");
        assert_eq!(relay.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_send_whitespace_body_is_noop() {
        let (controller, relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        let result = controller.send("   \t ").await.unwrap();

        assert!(result.is_none());
        assert!(relay.sent_messages().is_empty());
        assert!(controller.snapshot().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_send_without_selection_fails() {
        let (controller, _relay, _history) = create_test_controller();

        let result = controller.send("hello").await;
        assert!(matches!(
            result,
            Err(ConversationError::NoActiveConversation)
        ));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_fails_without_append() {
        let (controller, relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        relay.set_connected(false);
        let result = controller.send("hello").await;

        assert!(matches!(result, Err(ConversationError::ChannelUnavailable)));
        assert!(controller.snapshot().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_history_failure_degrades_to_empty_log() {
        let (controller, _relay, history) = create_test_controller();
        history.fail_fetches(true);

        controller.select_counterpart(bob()).await.unwrap();

        assert_eq!(controller.status().await, ConversationStatus::Active);
        assert!(controller.snapshot().await.messages.is_empty());

        // New messages still work on the degraded log.
        controller.send("still works").await.unwrap();
        assert_eq!(controller.snapshot().await.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_join_failure_moves_to_failed() {
        let (controller, relay, _history) = create_test_controller();
        relay.fail_joins(true);

        let result = controller.select_counterpart(bob()).await;

        assert!(matches!(result, Err(ConversationError::JoinFailed(_))));
        assert_eq!(controller.status().await, ConversationStatus::Failed);

        // The session survives: a later selection can succeed.
        relay.fail_joins(false);
        controller.select_counterpart(bob()).await.unwrap();
        assert_eq!(controller.status().await, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn test_invalid_identity_keeps_current_conversation() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        let degenerate = Counterpart::JobSeeker {
            id: UserId::new(""),
            name: "Nobody".to_string(),
        };
        let result = controller.select_counterpart(degenerate).await;

        assert!(matches!(result, Err(ConversationError::InvalidIdentity(_))));
        assert_eq!(controller.status().await, ConversationStatus::Active);
        assert_eq!(controller.snapshot().await.room_id, Some(room("u1-u2")));
    }

    #[tokio::test]
    async fn test_reselect_leaves_previous_room() {
        let (controller, relay, history) = create_test_controller();
        history.preload(
            room("u1-u3"),
            vec![ChatMessage::new(UserId::new("u3"), "Carol Staffing", "hello")],
        );

        controller.select_counterpart(bob()).await.unwrap();
        controller.select_counterpart(carol()).await.unwrap();

        assert!(relay.left_rooms().contains(&room("u1-u2")));
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.room_id, Some(room("u1-u3")));
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].sender.as_str(), "u3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_history_fetch_is_abandoned() {
        let (controller, relay, history) = create_test_controller();
        history.preload(
            room("u1-u2"),
            vec![ChatMessage::new(UserId::new("u2"), "Bob", "old stuff")],
        );
        history.delay_fetch(room("u1-u2"), Duration::from_secs(5));
        history.preload(
            room("u1-u3"),
            vec![ChatMessage::new(UserId::new("u3"), "Carol Staffing", "hi")],
        );

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_counterpart(bob()).await })
        };
        tokio::task::yield_now().await;

        controller.select_counterpart(carol()).await.unwrap();
        // Let the slow fetch resolve; it must notice it was superseded.
        tokio::time::sleep(Duration::from_secs(6)).await;
        slow.await.unwrap().unwrap();

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.room_id, Some(room("u1-u3")));
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].body, "hi");
        // The abandoned selection never joined its room.
        assert!(!relay.joined_rooms().contains(&room("u1-u2")));
    }

    #[tokio::test]
    async fn test_inbound_messages_append_in_receipt_order() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        for body in ["one", "two", "three"] {
            controller
                .handle_event(RelayEvent::MessageReceived {
                    room: room("u1-u2"),
                    message: ChatMessage::new(UserId::new("u2"), "Bob", body),
                })
                .await;
        }

        let bodies: Vec<String> = controller
            .snapshot()
            .await
            .messages
            .iter()
            .map(|m| m.body.clone())
            .collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_inbound_for_other_room_is_dropped() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller
            .handle_event(RelayEvent::MessageReceived {
                room: room("u1-u9"),
                message: ChatMessage::new(UserId::new("u9"), "Mallory", "wrong room"),
            })
            .await;

        assert!(controller.snapshot().await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_own_echo_is_dropped() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller.send("yo").await.unwrap();
        // The relay echoes our own message back.
        controller
            .handle_event(RelayEvent::MessageReceived {
                room: room("u1-u2"),
                message: ChatMessage::new(UserId::new("u1"), "Alice", "yo"),
            })
            .await;

        assert_eq!(controller.snapshot().await.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_racing_history_fetch_is_buffered() {
        let (controller, _relay, history) = create_test_controller();
        history.preload(
            room("u1-u2"),
            vec![ChatMessage::new(UserId::new("u2"), "Bob", "from history")],
        );
        history.delay_fetch(room("u1-u2"), Duration::from_secs(1));

        let selecting = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_counterpart(bob()).await })
        };
        tokio::task::yield_now().await;

        // Arrives while the history fetch is still in flight.
        controller
            .handle_event(RelayEvent::MessageReceived {
                room: room("u1-u2"),
                message: ChatMessage::new(UserId::new("u2"), "Bob", "live"),
            })
            .await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        selecting.await.unwrap().unwrap();

        let bodies: Vec<String> = controller
            .snapshot()
            .await
            .messages
            .iter()
            .map(|m| m.body.clone())
            .collect();
        assert_eq!(bodies, vec!["from history", "live"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_flag_self_clears_after_quiet_period() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller
            .handle_event(RelayEvent::TypingReceived {
                room: room("u1-u2"),
            })
            .await;
        assert!(controller.snapshot().await.typing);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(!controller.snapshot().await.typing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_signal_rearms_the_quiet_period() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller
            .handle_event(RelayEvent::TypingReceived {
                room: room("u1-u2"),
            })
            .await;
        tokio::time::sleep(Duration::from_millis(1000)).await;

        controller
            .handle_event(RelayEvent::TypingReceived {
                room: room("u1-u2"),
            })
            .await;
        tokio::time::sleep(Duration::from_millis(1200)).await;
        // 2.2s since the first signal but only 1.2s since the latest one.
        assert!(controller.snapshot().await.typing);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!controller.snapshot().await.typing);
    }

    #[tokio::test]
    async fn test_typing_for_other_room_is_ignored() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller
            .handle_event(RelayEvent::TypingReceived {
                room: room("u1-u9"),
            })
            .await;

        assert!(!controller.snapshot().await.typing);
    }

    #[tokio::test]
    async fn test_disconnect_clears_typing_but_keeps_conversation() {
        let (controller, _relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller
            .handle_event(RelayEvent::TypingReceived {
                room: room("u1-u2"),
            })
            .await;
        controller.handle_event(RelayEvent::Disconnected).await;

        let snapshot = controller.snapshot().await;
        assert!(!snapshot.typing);
        assert_eq!(snapshot.status, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn test_reconnect_does_not_rejoin_automatically() {
        let (controller, relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();
        assert_eq!(relay.joined_rooms().len(), 1);

        relay.set_connected(false);
        controller.handle_event(RelayEvent::Disconnected).await;
        relay.set_connected(true);
        controller.handle_event(RelayEvent::Connected).await;

        // Resuming delivery requires an explicit re-selection.
        assert_eq!(relay.joined_rooms().len(), 1);
        controller.select_counterpart(bob()).await.unwrap();
        assert_eq!(relay.joined_rooms().len(), 2);
    }

    #[tokio::test]
    async fn test_deselect_releases_room_and_resets() {
        let (controller, relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        controller.deselect().await;

        assert_eq!(controller.status().await, ConversationStatus::Idle);
        assert!(relay.left_rooms().contains(&room("u1-u2")));
        let snapshot = controller.snapshot().await;
        assert!(snapshot.room_id.is_none());
        assert!(snapshot.messages.is_empty());
    }

    #[tokio::test]
    async fn test_event_pump_forwards_injected_events() {
        let (controller, relay, _history) = create_test_controller();
        controller.select_counterpart(bob()).await.unwrap();

        let pump = controller.spawn_event_pump();
        relay.inject(RelayEvent::MessageReceived {
            room: room("u1-u2"),
            message: ChatMessage::new(UserId::new("u2"), "Bob", "pumped"),
        });

        // Give the pump task a chance to run.
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if !controller.snapshot().await.messages.is_empty() {
                break;
            }
        }

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].body, "pumped");

        pump.abort();
    }
}

//! In-process job-board backend for end-to-end tests
//!
//! Serves the two REST endpoints the core consumes plus a `/ws` relay with
//! real room semantics: a frame sent into a room is broadcast to every other
//! connection currently joined to it, never echoed to the sender (matching
//! the production relay's behavior).

use crate::directory::DirectoryUser;
use crate::model::{ChatMessage, RoomId};
use crate::relay::RelayFrame;
use anyhow::Result;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// A frame fanned out inside a room, tagged with the originating connection
#[derive(Debug, Clone)]
struct RoomBroadcast {
    origin: u64,
    frame: RelayFrame,
}

struct BackendState {
    users: Mutex<Vec<DirectoryUser>>,
    histories: Mutex<HashMap<String, Vec<ChatMessage>>>,
    rooms: Mutex<HashMap<String, broadcast::Sender<RoomBroadcast>>>,
    next_conn_id: AtomicU64,
    /// Tells every open socket to hang up; connection tasks are detached
    /// from the accept loop, so aborting the server alone would not reach
    /// them
    shutdown: broadcast::Sender<()>,
}

impl BackendState {
    fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            users: Mutex::new(Vec::new()),
            histories: Mutex::new(HashMap::new()),
            rooms: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            shutdown,
        }
    }

    fn room_sender(&self, room: &str) -> broadcast::Sender<RoomBroadcast> {
        self.rooms
            .lock()
            .unwrap()
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn append_history(&self, room: &str, message: ChatMessage) {
        self.histories
            .lock()
            .unwrap()
            .entry(room.to_string())
            .or_default()
            .push(message);
    }
}

/// In-process HTTP + WebSocket backend
pub struct TestBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    /// Bind an ephemeral port and start serving
    pub async fn start() -> Result<Self> {
        let state = Arc::new(BackendState::new());

        let router = Router::new()
            .route("/api/users", get(list_users))
            .route("/api/messages/:room", get(room_messages))
            .route("/ws", get(ws_upgrade))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        debug!(addr = %addr, "Test backend listening");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// Base URL for the REST endpoints
    pub fn api_base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the relay endpoint
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Register a directory record
    pub fn add_user(&self, user: DirectoryUser) {
        self.state.users.lock().unwrap().push(user);
    }

    /// Seed the persisted history for a room
    pub fn seed_history(&self, room: &RoomId, messages: Vec<ChatMessage>) {
        self.state
            .histories
            .lock()
            .unwrap()
            .insert(room.as_str().to_string(), messages);
    }

    /// Messages persisted for a room so far (seeded + relayed)
    pub fn history_for(&self, room: &RoomId) -> Vec<ChatMessage> {
        self.state
            .histories
            .lock()
            .unwrap()
            .get(room.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Stop serving; open connections are torn down
    pub fn shutdown(&self) {
        self.server.abort();
        let _ = self.state.shutdown.send(());
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn list_users(State(state): State<Arc<BackendState>>) -> Json<Vec<DirectoryUser>> {
    Json(state.users.lock().unwrap().clone())
}

async fn room_messages(
    State(state): State<Arc<BackendState>>,
    Path(room): Path<String>,
) -> Json<Vec<ChatMessage>> {
    Json(
        state
            .histories
            .lock()
            .unwrap()
            .get(&room)
            .cloned()
            .unwrap_or_default(),
    )
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BackendState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<BackendState>) {
    let conn_id = state.next_conn_id.fetch_add(1, Ordering::Relaxed);
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<RelayFrame>(64);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut joined: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();
    let mut shutdown_rx = state.shutdown.subscribe();

    loop {
        let message = tokio::select! {
            message = stream.next() => match message {
                Some(Ok(message)) => message,
                _ => break,
            },
            _ = shutdown_rx.recv() => break,
        };
        let WsMessage::Text(text) = message else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<RelayFrame>(&text) else {
            debug!(frame = %text, "Test backend ignoring undecodable frame");
            continue;
        };

        match frame {
            RelayFrame::JoinRoom { room } => {
                let key = room.as_str().to_string();
                if joined.contains_key(&key) {
                    continue;
                }
                let rx = state.room_sender(&key).subscribe();
                let forwarder = tokio::spawn(forward_room(rx, out_tx.clone(), conn_id));
                joined.insert(key, forwarder);
            }
            RelayFrame::LeaveRoom { room } => {
                if let Some(forwarder) = joined.remove(room.as_str()) {
                    forwarder.abort();
                }
            }
            RelayFrame::SendMessage { room, message } => {
                state.append_history(room.as_str(), message.clone());
                let _ = state.room_sender(room.as_str()).send(RoomBroadcast {
                    origin: conn_id,
                    frame: RelayFrame::ReceiveMessage { room, message },
                });
            }
            RelayFrame::Typing { room } => {
                let _ = state.room_sender(room.as_str()).send(RoomBroadcast {
                    origin: conn_id,
                    frame: RelayFrame::UserTyping { room },
                });
            }
            _ => {}
        }
    }

    for (_, forwarder) in joined {
        forwarder.abort();
    }
    writer.abort();
}

async fn forward_room(
    mut rx: broadcast::Receiver<RoomBroadcast>,
    tx: mpsc::Sender<RelayFrame>,
    conn_id: u64,
) {
    loop {
        match rx.recv().await {
            // Never echo a frame back to the connection that sent it.
            Ok(item) if item.origin == conn_id => continue,
            Ok(item) => {
                if tx.send(item.frame).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

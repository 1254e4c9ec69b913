//! WebSocket relay client
//!
//! A supervisor task owns the socket: it connects, pumps frames in both
//! directions, and on connection loss retries with capped exponential
//! backoff. Reconnection re-establishes the transport only — the relay does
//! not persist room subscriptions across connections, so owners of a room
//! must re-join after every `Connected` event.

use super::{RelayChannel, RelayError, RelayEvent, RelayFrame, RelayResult};
use crate::config::RelayConfig;
use crate::metrics;
use crate::model::{ChatMessage, RoomId};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Outbound frame buffer; sends beyond this apply backpressure to the caller
const OUTBOUND_BUFFER: usize = 64;

/// Event fan-out buffer; slow subscribers observe a lag error, not a stall
const EVENT_BUFFER: usize = 256;

/// WebSocket-backed realtime channel
pub struct WsRelayChannel {
    outbound: mpsc::Sender<RelayFrame>,
    events: broadcast::Sender<RelayEvent>,
    connected: Arc<AtomicBool>,
}

impl WsRelayChannel {
    /// Spawn the connection supervisor and return the channel handle.
    ///
    /// The supervisor keeps reconnecting until the handle (and with it the
    /// outbound channel) is dropped.
    pub fn connect(config: RelayConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_supervisor(
            config,
            outbound_rx,
            event_tx.clone(),
            connected.clone(),
        ));

        Self {
            outbound: outbound_tx,
            events: event_tx,
            connected,
        }
    }

    fn ensure_connected(&self) -> RelayResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RelayError::ChannelUnavailable)
        }
    }

    async fn emit(&self, frame: RelayFrame) -> RelayResult<()> {
        self.ensure_connected()?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| RelayError::Closed)
    }
}

#[async_trait]
impl RelayChannel for WsRelayChannel {
    async fn join_room(&self, room: &RoomId) -> RelayResult<()> {
        debug!(room = %room, "Joining room");
        self.emit(RelayFrame::JoinRoom { room: room.clone() }).await
    }

    async fn leave_room(&self, room: &RoomId) -> RelayResult<()> {
        debug!(room = %room, "Leaving room");
        self.emit(RelayFrame::LeaveRoom { room: room.clone() })
            .await
    }

    async fn send_message(&self, room: &RoomId, message: &ChatMessage) -> RelayResult<()> {
        self.emit(RelayFrame::SendMessage {
            room: room.clone(),
            message: message.clone(),
        })
        .await
    }

    async fn send_typing(&self, room: &RoomId) -> RelayResult<()> {
        self.emit(RelayFrame::Typing { room: room.clone() }).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Connect, pump, reconnect — until the outbound channel is dropped.
async fn run_supervisor(
    config: RelayConfig,
    mut outbound: mpsc::Receiver<RelayFrame>,
    events: broadcast::Sender<RelayEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = config.reconnect_initial_backoff;

    loop {
        match connect_async(config.url.as_str()).await {
            Ok((stream, _response)) => {
                info!(url = %config.url, "Relay connected");
                metrics::record_relay_connect();
                connected.store(true, Ordering::SeqCst);
                let _ = events.send(RelayEvent::Connected);
                backoff = config.reconnect_initial_backoff;

                let done = pump_session(stream, &mut outbound, &events).await;

                connected.store(false, Ordering::SeqCst);
                let _ = events.send(RelayEvent::Disconnected);

                if done {
                    debug!("Relay handle dropped, supervisor exiting");
                    return;
                }
                warn!(url = %config.url, "Relay connection lost");
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "Relay connect failed");
            }
        }

        // Sends are refused while disconnected, so nothing meaningful can be
        // queued here; a Disconnected result means the handle is gone.
        if let Err(mpsc::error::TryRecvError::Disconnected) = outbound.try_recv() {
            debug!("Relay handle dropped while disconnected, supervisor exiting");
            return;
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.reconnect_max_backoff);
    }
}

/// Pump one established connection. Returns `true` when the handle was
/// dropped (terminal), `false` on connection loss (retry).
async fn pump_session<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    outbound: &mut mpsc::Receiver<RelayFrame>,
    events: &broadcast::Sender<RelayEvent>,
) -> bool
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Dropping unencodable frame");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(error = %e, "Relay write failed");
                        return false;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return true;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<RelayFrame>(&text) {
                        Ok(frame) => {
                            if let Some(event) = frame.into_event() {
                                let _ = events.send(event);
                            } else {
                                debug!(frame = %text, "Ignoring non-event frame from relay");
                            }
                        }
                        Err(e) => warn!(error = %e, "Undecodable relay frame"),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        return false;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Relay read failed");
                    return false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sends_fail_fast_while_disconnected() {
        let config = RelayConfig {
            url: "ws://127.0.0.1:1/ws".to_string(),
            reconnect_initial_backoff: Duration::from_millis(10),
            reconnect_max_backoff: Duration::from_millis(50),
        };
        let channel = WsRelayChannel::connect(config);

        let room = RoomId("u1-u2".to_string());
        let result = channel.join_room(&room).await;

        assert!(matches!(result, Err(RelayError::ChannelUnavailable)));
        assert!(!channel.is_connected());
    }
}

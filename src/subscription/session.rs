use crate::config::SessionConfig;
use crate::content::{ContentDescriptor, FacadeId};
use crate::state::Broadcaster;
use crate::subscription::protocol::ContentUpdateMessage;
use crate::subscription::registry::{ConnectionId, Eviction, Subscriber, SubscriberQueue};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound on the closing handshake once a session has ended
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of one attached display. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Attached,
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the display
    ClientClosed,
    /// Read error on the socket
    TransportError,
    /// Writing to the socket failed
    SendFailed,
    /// Nothing heard from the display within the heartbeat timeout
    HeartbeatTimeout,
    /// The broadcaster dropped us (queue overflow)
    Evicted,
}

/// Manages a single display connection attached to one facade
pub struct ConnectionSession {
    id: ConnectionId,
    facade: FacadeId,
    state: SessionState,
    config: SessionConfig,

    /// Diagnostics only, never used for reconciliation
    last_delivered: Option<Arc<ContentDescriptor>>,
    delivered: u64,
}

impl ConnectionSession {
    pub fn new(facade: FacadeId, config: SessionConfig) -> Self {
        Self {
            id: Uuid::now_v7(),
            facade,
            state: SessionState::Connecting,
            config,
            last_delivered: None,
            delivered: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_delivered(&self) -> Option<&Arc<ContentDescriptor>> {
        self.last_delivered.as_ref()
    }

    /// Attach to the broadcaster and serve the connection until it closes.
    ///
    /// The handshake snapshot and every later publish arrive through the
    /// same FIFO queue, so the display sees them in commit order.
    pub async fn run(mut self, mut socket: WebSocket, broadcaster: Arc<Broadcaster>) -> CloseReason {
        let (subscriber, queue) = Subscriber::channel(self.id, self.config.outbound_queue_capacity);
        let SubscriberQueue {
            mut outbound,
            eviction,
        } = queue;

        broadcaster.metrics.session_opened();
        broadcaster.attach(self.facade, subscriber);
        self.transition(SessionState::Attached);

        let period = self.config.heartbeat_interval();
        let timeout = self.config.heartbeat_timeout();
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_seen = Instant::now();

        let reason = loop {
            tokio::select! {
                inbound = socket.recv() => {
                    match inbound {
                        Some(Ok(Message::Close(_))) | None => {
                            break CloseReason::ClientClosed;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            last_seen = Instant::now();
                            if let Err(reason) =
                                self.send_frame(&mut socket, Message::Pong(data), &eviction).await
                            {
                                break reason;
                            }
                        }
                        Some(Ok(_)) => {
                            // displays have nothing to say beyond liveness
                            last_seen = Instant::now();
                        }
                        Some(Err(e)) => {
                            warn!(connection_id = %self.id, error = %e, "WebSocket error");
                            break CloseReason::TransportError;
                        }
                    }
                }

                delivery = outbound.recv() => {
                    match delivery {
                        Some(descriptor) => {
                            if let Err(reason) =
                                self.deliver(&mut socket, descriptor, &eviction).await
                            {
                                break reason;
                            }
                        }
                        None => break CloseReason::Evicted,
                    }
                }

                _ = eviction.wait() => {
                    break CloseReason::Evicted;
                }

                _ = heartbeat.tick() => {
                    if last_seen.elapsed() > timeout {
                        warn!(
                            connection_id = %self.id,
                            facade_id = %self.facade,
                            silent_ms = last_seen.elapsed().as_millis() as u64,
                            "Heartbeat timeout"
                        );
                        break CloseReason::HeartbeatTimeout;
                    }
                    if let Err(reason) =
                        self.send_frame(&mut socket, Message::Ping(Vec::new()), &eviction).await
                    {
                        break reason;
                    }
                }
            }
        };

        broadcaster.detach(self.id);
        broadcaster.metrics.session_closed();
        self.transition(SessionState::Closed);

        // a display that stopped reading must not hold the task open
        let _ = tokio::time::timeout(CLOSE_GRACE, socket.close()).await;

        info!(
            connection_id = %self.id,
            facade_id = %self.facade,
            reason = ?reason,
            delivered = self.delivered,
            last_src = self.last_delivered.as_ref().map(|d| d.source_ref.as_str()).unwrap_or("-"),
            "Session closed"
        );

        reason
    }

    async fn deliver(
        &mut self,
        socket: &mut WebSocket,
        descriptor: Arc<ContentDescriptor>,
        eviction: &Eviction,
    ) -> Result<(), CloseReason> {
        let msg = ContentUpdateMessage::from(descriptor.as_ref());
        let json = serde_json::to_string(&msg).map_err(|e| {
            error!(connection_id = %self.id, error = %e, "Failed to encode content update");
            CloseReason::SendFailed
        })?;
        self.send_frame(socket, Message::Text(json), eviction).await?;

        debug!(
            connection_id = %self.id,
            src = %descriptor.source_ref,
            start_at = descriptor.anchor_time_ms,
            "Delivered content update"
        );

        self.delivered += 1;
        self.last_delivered = Some(descriptor);
        Ok(())
    }

    /// Write one frame to the display.
    ///
    /// A write that cannot complete within the heartbeat timeout means the
    /// display stopped draining its socket. Eviction aborts a pending write.
    async fn send_frame(
        &self,
        socket: &mut WebSocket,
        frame: Message,
        eviction: &Eviction,
    ) -> Result<(), CloseReason> {
        let limit = self.config.heartbeat_timeout();

        tokio::select! {
            sent = tokio::time::timeout(limit, socket.send(frame)) => match sent {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    warn!(connection_id = %self.id, error = %e, "Failed to send frame");
                    Err(CloseReason::SendFailed)
                }
                Err(_) => {
                    warn!(
                        connection_id = %self.id,
                        facade_id = %self.facade,
                        limit_ms = limit.as_millis() as u64,
                        "Send stalled, display not reading"
                    );
                    Err(CloseReason::HeartbeatTimeout)
                }
            },
            _ = eviction.wait() => Err(CloseReason::Evicted),
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            connection_id = %self.id,
            facade_id = %self.facade,
            from = ?self.state,
            to = ?next,
            "Session state change"
        );
        self.state = next;
    }
}

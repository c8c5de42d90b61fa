use crate::api::{parse_facade_id, SyncAppState};
use crate::content::FacadeId;
use crate::state::PlayEvent;
use crate::subscription::ConnectionSession;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Request, State,
    },
    Extension,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

/// Facade guard: rejects unknown facade ids before the upgrade is extracted,
/// so the display gets a plain 404 instead of an attached-but-dead socket.
/// The accepted id is handed to the handler as a request extension.
async fn facade_guard(
    State(state): State<Arc<SyncAppState>>,
    Path(raw_id): Path<String>,
    mut req: Request,
    next: Next,
) -> Response {
    let facade = match parse_facade_id(&raw_id) {
        Ok(facade) => facade,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = state.check_facade(facade) {
        return e.into_response();
    }

    req.extensions_mut().insert(facade);
    next.run(req).await
}

/// GET /ws/facade/:id - Display subscription socket
pub async fn facade_ws_handler(
    ws: WebSocketUpgrade,
    Extension(facade): Extension<FacadeId>,
    State(state): State<Arc<SyncAppState>>,
) -> Response {
    info!(facade_id = %facade, "Display connecting");
    ws.on_upgrade(move |socket| handle_facade_socket(socket, facade, state))
}

/// Create display socket router with the facade guard applied
pub fn create_ws_router(state: Arc<SyncAppState>) -> Router {
    Router::new()
        .route("/ws/facade/:id", get(facade_ws_handler))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), facade_guard))
        .with_state(state)
}

async fn handle_facade_socket(socket: WebSocket, facade: FacadeId, state: Arc<SyncAppState>) {
    let session = ConnectionSession::new(facade, state.session.clone());
    session.run(socket, Arc::clone(&state.broadcaster)).await;
}

/// GET /ws/monitor - Read-only play event stream
pub async fn monitor_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SyncAppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_monitor_socket(socket, state))
}

pub fn create_monitor_router(state: Arc<SyncAppState>) -> Router {
    Router::new()
        .route("/ws/monitor", get(monitor_ws_handler))
        .with_state(state)
}

async fn handle_monitor_socket(mut socket: WebSocket, state: Arc<SyncAppState>) {
    let mut events = BroadcastStream::new(state.broadcaster.subscribe_events());
    info!("Monitor connected");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }

            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        if let Err(e) = forward_event(&mut socket, &event).await {
                            warn!(error = %e, "Failed to send play event to monitor");
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped = skipped, "Monitor lagging, events skipped");
                    }
                    None => break,
                }
            }
        }
    }

    debug!("Monitor disconnected");
}

async fn forward_event(socket: &mut WebSocket, event: &PlayEvent) -> anyhow::Result<()> {
    let json = serde_json::to_string(event)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}

// HTTP and WebSocket surface

pub mod content;
pub mod playback;
pub mod websocket;

pub use content::create_content_router;
pub use playback::create_playback_router;
pub use websocket::{create_monitor_router, create_ws_router};

use crate::config::{FacadeSyncConfig, SessionConfig};
use crate::content::{FacadeDirectory, FacadeId};
use crate::state::Broadcaster;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state for every route
#[derive(Clone)]
pub struct SyncAppState {
    pub broadcaster: Arc<Broadcaster>,
    pub directory: Arc<FacadeDirectory>,
    pub session: SessionConfig,
    /// Required bearer token for publishing. None = publishing is open.
    pub publish_token: Option<String>,
}

impl SyncAppState {
    pub fn from_config(config: &FacadeSyncConfig, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            broadcaster,
            directory: Arc::new(config.directory()),
            session: config.session.clone(),
            publish_token: config.publish.publish_token.clone(),
        }
    }

    fn check_facade(&self, facade: FacadeId) -> Result<(), ApiError> {
        if self.directory.accepts(facade) {
            Ok(())
        } else {
            Err(ApiError::UnknownFacade(facade))
        }
    }
}

/// Full application router
pub fn create_app(state: SyncAppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .merge(create_ws_router(Arc::clone(&state)))
        .merge(create_monitor_router(Arc::clone(&state)))
        .merge(create_content_router(Arc::clone(&state)))
        .merge(create_playback_router(state))
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Errors returned by REST handlers as `{ "error": ... }`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    UnknownFacade(FacadeId),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::UnknownFacade(id) => (StatusCode::NOT_FOUND, format!("unknown facade {id}")),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Parse the `:id` path segment
fn parse_facade_id(raw: &str) -> Result<FacadeId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid facade id '{raw}'")))
}

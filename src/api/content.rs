use crate::api::{parse_facade_id, ApiError, SyncAppState};
use crate::content::{ContentDescriptor, DescriptorError, FacadeId, MediaKind};
use crate::subscription::ContentUpdateMessage;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Publish body. Everything except `src` is optional.
#[derive(Debug, Deserialize)]
struct PublishRequest {
    #[serde(default)]
    src: String,
    kind: Option<MediaKind>,
    #[serde(rename = "loop")]
    looping: Option<bool>,
    /// Seconds
    #[serde(rename = "durationHint")]
    duration_hint: Option<f64>,
    /// Epoch milliseconds; omitted means "start now"
    #[serde(rename = "startAt")]
    start_at: Option<i64>,
}

impl PublishRequest {
    fn into_descriptor(self, now_ms: i64) -> Result<ContentDescriptor, DescriptorError> {
        let media_kind = self
            .kind
            .unwrap_or_else(|| MediaKind::infer_from_source(&self.src));

        let duration_hint = match self.duration_hint {
            Some(seconds) => Some(
                Duration::try_from_secs_f64(seconds)
                    .map_err(|_| DescriptorError::InvalidDurationHint)?,
            ),
            None => None,
        };

        Ok(ContentDescriptor {
            looping: self
                .looping
                .unwrap_or(media_kind == MediaKind::Video),
            source_ref: self.src,
            media_kind,
            anchor_time_ms: self.start_at.unwrap_or(now_ms),
            duration_hint,
        })
    }
}

#[derive(Serialize)]
struct PublishResponse {
    facade_id: FacadeId,
    content: ContentUpdateMessage,
    /// Connections the update was queued for
    delivered: usize,
}

#[derive(Serialize)]
struct FacadeSummary {
    id: FacadeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    content: Option<ContentUpdateMessage>,
    subscribers: usize,
}

/// Create router for content publish/query endpoints
pub fn create_content_router(state: Arc<SyncAppState>) -> Router {
    Router::new()
        .route("/api/facades", get(list_facades))
        .route(
            "/api/facades/:id/content",
            get(get_content).post(publish_content),
        )
        .with_state(state)
}

/// POST /api/facades/:id/content - Assign new content to a facade
async fn publish_content(
    State(state): State<Arc<SyncAppState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    if !validate_publish_token(&headers, &state.publish_token) {
        return Err(ApiError::Unauthorized);
    }

    let facade = parse_facade_id(&raw_id)?;
    state.check_facade(facade)?;

    let request: PublishRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(facade_id = %facade, error = %e, "Malformed publish body");
        ApiError::BadRequest(format!("invalid JSON: {e}"))
    })?;

    let now_ms = Utc::now().timestamp_millis();
    let receipt = request
        .into_descriptor(now_ms)
        .and_then(|descriptor| state.broadcaster.publish_at(facade, descriptor, now_ms))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    info!(
        facade_id = %facade,
        src = %receipt.descriptor.source_ref,
        delivered = receipt.delivered,
        "Content published via API"
    );

    Ok(Json(PublishResponse {
        facade_id: facade,
        content: ContentUpdateMessage::from(receipt.descriptor.as_ref()),
        delivered: receipt.delivered,
    }))
}

/// GET /api/facades/:id/content - What a display attaching now would receive
async fn get_content(
    State(state): State<Arc<SyncAppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ContentUpdateMessage>, ApiError> {
    let facade = parse_facade_id(&raw_id)?;
    state.check_facade(facade)?;

    state
        .broadcaster
        .current(facade)
        .map(|descriptor| Json(ContentUpdateMessage::from(descriptor.as_ref())))
        .ok_or_else(|| ApiError::NotFound("no content assigned".to_string()))
}

/// GET /api/facades - Known facades with their current content
async fn list_facades(State(state): State<Arc<SyncAppState>>) -> Json<Vec<FacadeSummary>> {
    let broadcaster = &state.broadcaster;

    let summarize = |id: FacadeId, name: Option<String>| FacadeSummary {
        id,
        name,
        content: broadcaster
            .current(id)
            .map(|descriptor| ContentUpdateMessage::from(descriptor.as_ref())),
        subscribers: broadcaster.subscriber_count(id),
    };

    let summaries = if state.directory.is_open() {
        let mut ids: Vec<FacadeId> = broadcaster
            .store()
            .entries()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids.into_iter().map(|id| summarize(id, None)).collect()
    } else {
        state
            .directory
            .iter()
            .map(|facade| summarize(facade.id, Some(facade.name.clone())))
            .collect()
    };

    Json(summaries)
}

/// Returns true if the bearer token in `Authorization` matches the publish token.
/// Returns true (no restriction) when `expected` is None.
fn validate_publish_token(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };

    let Some(token) = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };

    token == expected_token
}

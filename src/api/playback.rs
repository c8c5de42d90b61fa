use crate::api::{ApiError, SyncAppState};
use crate::state::{MetricsSnapshot, PlaybackReport};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Create router for playback reports and engine metrics
pub fn create_playback_router(state: Arc<SyncAppState>) -> Router {
    Router::new()
        .route("/api/playback", post(report_playback))
        .route("/api/metrics", get(get_metrics))
        .with_state(state)
}

/// POST /api/playback - A display reports what it played
async fn report_playback(
    State(state): State<Arc<SyncAppState>>,
    Json(report): Json<PlaybackReport>,
) -> Result<Json<Value>, ApiError> {
    state.check_facade(report.facade_id)?;

    state.broadcaster.report_playback(report);

    Ok(Json(json!({ "status": "ok" })))
}

/// GET /api/metrics
async fn get_metrics(State(state): State<Arc<SyncAppState>>) -> Json<MetricsSnapshot> {
    Json(state.broadcaster.metrics.get_snapshot())
}

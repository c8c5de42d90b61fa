use crate::content::{ContentDescriptor, FacadeId, MediaKind};
use crate::subscription::ConnectionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine events fanned out to monitor connections.
///
/// The engine only emits these; recording play history is left to whoever
/// listens on the monitor channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayEvent {
    ContentChanged {
        facade_id: FacadeId,
        src: String,
        kind: MediaKind,
        #[serde(rename = "startAt")]
        start_at: i64,
        /// Subscribers the update was queued for
        subscribers: usize,
        published_at: DateTime<Utc>,
    },
    DisplayAttached {
        facade_id: FacadeId,
        connection_id: ConnectionId,
        subscribers: usize,
        at: DateTime<Utc>,
    },
    DisplayDetached {
        facade_id: FacadeId,
        connection_id: ConnectionId,
        subscribers: usize,
        at: DateTime<Utc>,
    },
    PlaybackReported {
        facade_id: FacadeId,
        #[serde(skip_serializing_if = "Option::is_none")]
        campaign_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        src: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_sec: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sync_latency_ms: Option<i64>,
        played_at: DateTime<Utc>,
    },
}

impl PlayEvent {
    pub fn content_changed(
        facade_id: FacadeId,
        descriptor: &ContentDescriptor,
        subscribers: usize,
    ) -> Self {
        PlayEvent::ContentChanged {
            facade_id,
            src: descriptor.source_ref.clone(),
            kind: descriptor.media_kind,
            start_at: descriptor.anchor_time_ms,
            subscribers,
            published_at: Utc::now(),
        }
    }

    pub fn facade_id(&self) -> FacadeId {
        match self {
            PlayEvent::ContentChanged { facade_id, .. }
            | PlayEvent::DisplayAttached { facade_id, .. }
            | PlayEvent::DisplayDetached { facade_id, .. }
            | PlayEvent::PlaybackReported { facade_id, .. } => *facade_id,
        }
    }
}

/// Play report posted by a display (or its host) after showing content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub facade_id: FacadeId,
    #[serde(default)]
    pub campaign_id: Option<i64>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<u32>,
    #[serde(default)]
    pub sync_latency_ms: Option<i64>,
}

impl PlaybackReport {
    /// Stamp the report with the server's receive time
    pub fn into_event(self, played_at: DateTime<Utc>) -> PlayEvent {
        PlayEvent::PlaybackReported {
            facade_id: self.facade_id,
            campaign_id: self.campaign_id,
            src: self.src,
            duration_sec: self.duration_sec,
            sync_latency_ms: self.sync_latency_ms,
            played_at,
        }
    }
}

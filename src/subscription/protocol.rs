use crate::content::{ContentDescriptor, MediaKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message type tag of a content update
pub const CONTENT_UPDATE: &str = "content_update";

/// Server → Client: what the facade should display
#[derive(Debug, Clone, Serialize)]
pub struct ContentUpdateMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub src: String,
    /// Anchor time, epoch milliseconds on the server clock
    #[serde(rename = "startAt")]
    pub start_at: i64,
    pub kind: MediaKind,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Seconds
    #[serde(rename = "durationHint", skip_serializing_if = "Option::is_none")]
    pub duration_hint: Option<f64>,
}

impl From<&ContentDescriptor> for ContentUpdateMessage {
    fn from(descriptor: &ContentDescriptor) -> Self {
        Self {
            msg_type: CONTENT_UPDATE.to_string(),
            src: descriptor.source_ref.clone(),
            start_at: descriptor.anchor_time_ms,
            kind: descriptor.media_kind,
            looping: descriptor.looping,
            duration_hint: descriptor.duration_hint.map(|d| d.as_secs_f64()),
        }
    }
}

/// Errors decoding an inbound content update on the display side
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported message type '{0}'")]
    UnsupportedType(String),
    #[error("content_update without src")]
    MissingSource,
}

/// Lenient view of a server message. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    src: Option<String>,
    #[serde(rename = "startAt")]
    start_at: Option<i64>,
    kind: Option<String>,
    #[serde(rename = "loop")]
    looping: Option<bool>,
    #[serde(rename = "durationHint")]
    duration_hint: Option<f64>,
}

/// Decode a `content_update` frame into a descriptor.
///
/// Defaults: `kind` → video, `loop` → true, missing `startAt` → `received_at_ms`
/// (play from the start). A non-positive or non-finite `durationHint` is
/// dropped rather than failing the whole message.
pub fn parse_content_update(text: &str, received_at_ms: i64) -> Result<ContentDescriptor, WireError> {
    let msg: InboundMessage = serde_json::from_str(text)?;

    match msg.msg_type.as_deref() {
        Some(CONTENT_UPDATE) => {}
        Some(other) => return Err(WireError::UnsupportedType(other.to_string())),
        None => return Err(WireError::UnsupportedType(String::new())),
    }

    let source_ref = msg
        .src
        .filter(|src| !src.trim().is_empty())
        .ok_or(WireError::MissingSource)?;

    let media_kind = match msg.kind.as_deref() {
        Some("image") => MediaKind::Image,
        _ => MediaKind::Video,
    };

    let duration_hint = msg
        .duration_hint
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

    Ok(ContentDescriptor {
        source_ref,
        media_kind,
        anchor_time_ms: msg.start_at.unwrap_or(received_at_ms),
        duration_hint,
        looping: msg.looping.unwrap_or(true),
    })
}

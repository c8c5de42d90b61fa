// Content descriptors, facade identities and the content state store

mod facade;
mod store;
mod validation;

pub use facade::{Facade, FacadeDirectory, FacadeId};
pub use store::ContentStore;
pub use validation::{validate_descriptor, DescriptorError, FutureAnchorPolicy, PublishPolicy};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// File extensions that are rendered as a still image instead of a video.
const STILL_IMAGE_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg", "webp", "bmp"];

/// What kind of media a descriptor points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    /// Still images never advance a play head.
    Image,
}

impl MediaKind {
    /// Guess the media kind from the file extension of a source reference.
    ///
    /// Query strings and fragments are ignored. Anything that is not a known
    /// still-image extension is treated as video.
    pub fn infer_from_source(source_ref: &str) -> Self {
        let path = source_ref
            .split(['?', '#'])
            .next()
            .unwrap_or(source_ref);

        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension {
            Some(ext) if STILL_IMAGE_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Image,
            _ => MediaKind::Video,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// The unit of synchronization: what a facade should display and when
/// playback logically started.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentDescriptor {
    /// Locator of the media (URL or opaque reference)
    pub source_ref: String,

    pub media_kind: MediaKind,

    /// Server-clock epoch milliseconds at which playback logically started
    pub anchor_time_ms: i64,

    /// Expected duration; only used for loop-boundary arithmetic
    pub duration_hint: Option<Duration>,

    pub looping: bool,
}

impl ContentDescriptor {
    /// A looping video anchored at `anchor_time_ms`.
    pub fn video(source_ref: impl Into<String>, anchor_time_ms: i64) -> Self {
        Self {
            source_ref: source_ref.into(),
            media_kind: MediaKind::Video,
            anchor_time_ms,
            duration_hint: None,
            looping: true,
        }
    }

    /// A still image anchored at `anchor_time_ms`.
    pub fn image(source_ref: impl Into<String>, anchor_time_ms: i64) -> Self {
        Self {
            source_ref: source_ref.into(),
            media_kind: MediaKind::Image,
            anchor_time_ms,
            duration_hint: None,
            looping: false,
        }
    }

    pub fn with_duration_hint(mut self, duration: Duration) -> Self {
        self.duration_hint = Some(duration);
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Duration hint in whole milliseconds, ignoring zero-length hints.
    pub fn duration_hint_ms(&self) -> Option<u64> {
        self.duration_hint
            .map(|d| d.as_millis() as u64)
            .filter(|ms| *ms > 0)
    }
}

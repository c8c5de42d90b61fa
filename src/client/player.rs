use crate::content::MediaKind;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Playback could not be started. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback blocked by autoplay policy")]
    AutoplayBlocked,
    #[error("media could not be decoded: {0}")]
    Decode(String),
}

/// The local media surface a reconciler drives.
pub trait Player {
    /// Source currently loaded, if any
    fn loaded_source(&self) -> Option<&str>;

    /// Replace the loaded media. Resets the play head and pauses.
    fn load(&mut self, src: &str, kind: MediaKind, looping: bool);

    /// Change the loop flag of the loaded media without reloading it
    fn set_looping(&mut self, looping: bool);

    fn is_playing(&self) -> bool;

    /// Current play head, if a video is loaded
    fn position(&self) -> Option<Duration>;

    fn seek(&mut self, position: Duration);

    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Show the idle "waiting for content" screen. Loaded media stays
    /// loaded but paused.
    fn show_waiting(&mut self);
}

/// Headless player that simulates a play head and logs what a real
/// surface would do. Used by the `facade-display` binary.
#[derive(Debug, Default)]
pub struct LogPlayer {
    src: Option<String>,
    kind: Option<MediaKind>,
    looping: bool,
    /// Position at the moment playback (re)started
    base: Duration,
    started: Option<Instant>,
}

impl LogPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Player for LogPlayer {
    fn loaded_source(&self) -> Option<&str> {
        self.src.as_deref()
    }

    fn load(&mut self, src: &str, kind: MediaKind, looping: bool) {
        info!(src = %src, kind = kind.as_str(), looping = looping, "Loading media");
        self.src = Some(src.to_string());
        self.kind = Some(kind);
        self.looping = looping;
        self.base = Duration::ZERO;
        self.started = None;
    }

    fn set_looping(&mut self, looping: bool) {
        if self.looping != looping {
            info!(looping = looping, "Changing loop mode");
            self.looping = looping;
        }
    }

    fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn position(&self) -> Option<Duration> {
        match self.kind {
            Some(MediaKind::Video) => Some(match self.started {
                Some(started) => self.base + started.elapsed(),
                None => self.base,
            }),
            _ => None,
        }
    }

    fn seek(&mut self, position: Duration) {
        info!(position_ms = position.as_millis() as u64, "Seeking");
        self.base = position;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.src.is_none() {
            return Err(PlaybackError::Decode("nothing loaded".to_string()));
        }
        if self.kind == Some(MediaKind::Video) && self.started.is_none() {
            self.started = Some(Instant::now());
            info!(position_ms = self.base.as_millis() as u64, "Playing");
        }
        Ok(())
    }

    fn show_waiting(&mut self) {
        info!("Waiting for content");
        if let Some(started) = self.started.take() {
            self.base += started.elapsed();
        }
    }
}

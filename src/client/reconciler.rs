//! Turns a content descriptor plus the current wall clock into player
//! actions.
//!
//! Redelivering an unchanged descriptor is a visual no-op: the source is
//! only reloaded when it or its media kind differs from what is loaded, and a
//! seek is only issued when the play head has drifted further than the
//! tolerance. A loop flag change on the same source is applied in place.

use crate::client::player::{PlaybackError, Player};
use crate::content::{ContentDescriptor, MediaKind};
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a reconciliation step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    ShowingImage {
        reloaded: bool,
    },
    Playing {
        offset: Duration,
        reloaded: bool,
        seeked: bool,
    },
    /// Playback start failed; retried on the next interaction signal
    AwaitingInteraction {
        offset: Duration,
        error: PlaybackError,
    },
    /// `on_interaction` with nothing pending
    Idle,
}

/// Seek offset for `descriptor` at client time `now_ms`.
///
/// - still images: always zero
/// - anchors in the future clamp to zero
/// - looping media with a known duration wraps into the current iteration
/// - non-looping media with a known duration stops at the end
pub fn playback_offset(descriptor: &ContentDescriptor, now_ms: i64) -> Duration {
    if descriptor.media_kind == MediaKind::Image {
        return Duration::ZERO;
    }

    let elapsed_ms = now_ms.saturating_sub(descriptor.anchor_time_ms).max(0) as u64;

    let offset_ms = match descriptor.duration_hint_ms() {
        Some(duration_ms) if elapsed_ms > duration_ms => {
            if descriptor.looping {
                elapsed_ms % duration_ms
            } else {
                duration_ms
            }
        }
        _ => elapsed_ms,
    };

    Duration::from_millis(offset_ms)
}

/// Distance between two play head positions, treating a looping timeline
/// as circular.
fn drift(a: Duration, b: Duration, loop_length: Option<Duration>) -> Duration {
    let straight = if a > b { a - b } else { b - a };
    match loop_length {
        Some(length) if !length.is_zero() && straight < length => straight.min(length - straight),
        _ => straight,
    }
}

/// Client-side reconciler. Single-threaded; owns the player.
pub struct Reconciler<P: Player> {
    player: P,
    seek_tolerance: Duration,
    current: Option<ContentDescriptor>,
    pending: Option<ContentDescriptor>,
}

impl<P: Player> Reconciler<P> {
    pub fn new(player: P, seek_tolerance: Duration) -> Self {
        Self {
            player,
            seek_tolerance,
            current: None,
            pending: None,
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Last descriptor applied, whether or not playback started
    pub fn current(&self) -> Option<&ContentDescriptor> {
        self.current.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply a descriptor received from the server at client time `now_ms`.
    pub fn apply(&mut self, descriptor: ContentDescriptor, now_ms: i64) -> ReconcileOutcome {
        let previous = self.current.as_ref();
        let reloaded = self.player.loaded_source() != Some(descriptor.source_ref.as_str())
            || previous.map_or(true, |p| p.media_kind != descriptor.media_kind);
        let loop_changed = previous.map_or(false, |p| p.looping != descriptor.looping);

        if !reloaded && loop_changed && descriptor.media_kind == MediaKind::Video {
            self.player.set_looping(descriptor.looping);
        }

        let outcome = match descriptor.media_kind {
            MediaKind::Image => {
                if reloaded {
                    self.player
                        .load(&descriptor.source_ref, MediaKind::Image, false);
                }
                self.pending = None;
                ReconcileOutcome::ShowingImage { reloaded }
            }
            MediaKind::Video => {
                if reloaded {
                    self.player
                        .load(&descriptor.source_ref, MediaKind::Video, descriptor.looping);
                }
                self.start_video(&descriptor, now_ms, reloaded)
            }
        };

        debug!(src = %descriptor.source_ref, outcome = ?outcome, "Applied descriptor");
        self.current = Some(descriptor);
        outcome
    }

    /// Retry a blocked playback start after a user or system interaction.
    ///
    /// The offset is recomputed from the same anchor, since time has passed
    /// since the first attempt.
    pub fn on_interaction(&mut self, now_ms: i64) -> ReconcileOutcome {
        let Some(descriptor) = self.pending.take() else {
            return ReconcileOutcome::Idle;
        };

        if self.player.loaded_source() != Some(descriptor.source_ref.as_str()) {
            self.player
                .load(&descriptor.source_ref, descriptor.media_kind, descriptor.looping);
        }

        let offset = playback_offset(&descriptor, now_ms);
        self.player.seek(offset);

        match self.player.play() {
            Ok(()) => {
                info!(src = %descriptor.source_ref, offset_ms = offset.as_millis() as u64, "Playback started on retry");
                ReconcileOutcome::Playing {
                    offset,
                    reloaded: false,
                    seeked: true,
                }
            }
            Err(error) => {
                warn!(src = %descriptor.source_ref, error = %error, "Playback still blocked");
                self.pending = Some(descriptor);
                ReconcileOutcome::AwaitingInteraction { offset, error }
            }
        }
    }

    fn start_video(
        &mut self,
        descriptor: &ContentDescriptor,
        now_ms: i64,
        reloaded: bool,
    ) -> ReconcileOutcome {
        let offset = playback_offset(descriptor, now_ms);
        let loop_length = descriptor
            .duration_hint
            .filter(|_| descriptor.looping);

        let in_sync = !reloaded
            && self.player.is_playing()
            && self
                .player
                .position()
                .map(|position| drift(position, offset, loop_length) <= self.seek_tolerance)
                .unwrap_or(false);

        let seeked = !in_sync;
        if seeked {
            self.player.seek(offset);
        }

        if self.player.is_playing() {
            self.pending = None;
            return ReconcileOutcome::Playing {
                offset,
                reloaded,
                seeked,
            };
        }

        match self.player.play() {
            Ok(()) => {
                self.pending = None;
                ReconcileOutcome::Playing {
                    offset,
                    reloaded,
                    seeked,
                }
            }
            Err(error) => {
                warn!(src = %descriptor.source_ref, error = %error, "Playback start failed, waiting for interaction");
                self.player.show_waiting();
                self.pending = Some(descriptor.clone());
                ReconcileOutcome::AwaitingInteraction { offset, error }
            }
        }
    }
}

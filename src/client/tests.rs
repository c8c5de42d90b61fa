use super::*;
use crate::content::{ContentDescriptor, MediaKind};
use std::collections::VecDeque;
use std::time::Duration;

const T: i64 = 1_707_668_400_000;

/// Scripted player: position is set by the test, play() results are queued.
#[derive(Default)]
struct MockPlayer {
    src: Option<String>,
    kind: Option<MediaKind>,
    playing: bool,
    position: Duration,
    looping: bool,
    loads: Vec<String>,
    loop_changes: Vec<bool>,
    seeks: Vec<Duration>,
    waiting_shown: usize,
    play_results: VecDeque<Result<(), PlaybackError>>,
}

impl MockPlayer {
    fn blocking_first(n: usize) -> Self {
        Self {
            play_results: (0..n).map(|_| Err(PlaybackError::AutoplayBlocked)).collect(),
            ..Self::default()
        }
    }
}

impl Player for MockPlayer {
    fn loaded_source(&self) -> Option<&str> {
        self.src.as_deref()
    }

    fn load(&mut self, src: &str, kind: MediaKind, looping: bool) {
        self.src = Some(src.to_string());
        self.kind = Some(kind);
        self.looping = looping;
        self.playing = false;
        self.position = Duration::ZERO;
        self.loads.push(src.to_string());
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.loop_changes.push(looping);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self) -> Option<Duration> {
        (self.kind == Some(MediaKind::Video)).then_some(self.position)
    }

    fn seek(&mut self, position: Duration) {
        self.position = position;
        self.seeks.push(position);
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let result = self.play_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.playing = true;
        }
        result
    }

    fn show_waiting(&mut self) {
        self.playing = false;
        self.waiting_shown += 1;
    }
}

fn reconciler(player: MockPlayer) -> Reconciler<MockPlayer> {
    Reconciler::new(player, Duration::from_millis(500))
}

// ── offset math ─────────────────────────────────────────────────────────────

#[test]
fn test_offset_for_non_looping_video() {
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T)
        .with_looping(false)
        .with_duration_hint(Duration::from_secs(30));

    assert_eq!(playback_offset(&descriptor, T + 12_000), Duration::from_secs(12));
}

#[test]
fn test_offset_wraps_for_looping_video() {
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T)
        .with_looping(true)
        .with_duration_hint(Duration::from_secs(20));

    assert_eq!(playback_offset(&descriptor, T + 47_000), Duration::from_secs(7));
}

#[test]
fn test_offset_clamps_future_anchor_to_zero() {
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T + 5_000);

    assert_eq!(playback_offset(&descriptor, T), Duration::ZERO);
    assert_eq!(playback_offset(&descriptor, i64::MIN), Duration::ZERO);
}

#[test]
fn test_offset_without_duration_hint_is_raw_elapsed() {
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T);

    assert_eq!(playback_offset(&descriptor, T + 95_250), Duration::from_millis(95_250));
}

#[test]
fn test_offset_non_looping_past_end_stops_at_end() {
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T)
        .with_looping(false)
        .with_duration_hint(Duration::from_secs(30));

    assert_eq!(playback_offset(&descriptor, T + 90_000), Duration::from_secs(30));
}

#[test]
fn test_offset_for_still_image_is_zero() {
    let descriptor = ContentDescriptor::image("https://cdn/a.png", T);

    assert_eq!(playback_offset(&descriptor, T + 60_000), Duration::ZERO);
}

// ── apply ───────────────────────────────────────────────────────────────────

#[test]
fn test_apply_video_loads_seeks_and_plays() {
    let mut r = reconciler(MockPlayer::default());
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T);

    let outcome = r.apply(descriptor, T + 12_000);

    assert_eq!(
        outcome,
        ReconcileOutcome::Playing {
            offset: Duration::from_secs(12),
            reloaded: true,
            seeked: true
        }
    );
    assert_eq!(r.player().loads, vec!["https://cdn/a.mp4"]);
    assert_eq!(r.player().seeks, vec![Duration::from_secs(12)]);
    assert!(r.player().playing);
}

#[test]
fn test_apply_image_has_no_offset_math() {
    let mut r = reconciler(MockPlayer::default());

    let outcome = r.apply(ContentDescriptor::image("https://cdn/a.png", T), T + 9_000);

    assert_eq!(outcome, ReconcileOutcome::ShowingImage { reloaded: true });
    assert!(r.player().seeks.is_empty());
    assert_eq!(r.player().kind, Some(MediaKind::Image));
}

#[test]
fn test_redelivery_does_not_reload_or_jump() {
    let mut r = reconciler(MockPlayer::default());
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T);

    r.apply(descriptor.clone(), T + 10_000);
    // the player advanced naturally, slightly ahead of the wall clock
    r.player_mut().position = Duration::from_millis(10_300);

    let outcome = r.apply(descriptor, T + 10_100);

    assert_eq!(
        outcome,
        ReconcileOutcome::Playing {
            offset: Duration::from_millis(10_100),
            reloaded: false,
            seeked: false
        }
    );
    assert_eq!(r.player().loads.len(), 1);
    assert_eq!(r.player().seeks.len(), 1);
}

#[test]
fn test_loop_change_on_same_source_applies_without_reload() {
    let mut r = reconciler(MockPlayer::default());
    let looping = ContentDescriptor::video("https://cdn/a.mp4", T).with_looping(true);

    r.apply(looping.clone(), T + 10_000);
    assert!(r.player().looping);
    r.player_mut().position = Duration::from_millis(10_100);

    let outcome = r.apply(looping.with_looping(false), T + 10_100);

    assert!(matches!(outcome, ReconcileOutcome::Playing { reloaded: false, seeked: false, .. }));
    assert_eq!(r.player().loads.len(), 1);
    assert_eq!(r.player().loop_changes, vec![false]);
    assert!(!r.player().looping);
    assert!(!r.current().unwrap().looping);
}

#[test]
fn test_unchanged_loop_flag_is_not_reapplied() {
    let mut r = reconciler(MockPlayer::default());
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T);

    r.apply(descriptor.clone(), T + 1_000);
    r.apply(descriptor, T + 1_000);

    assert!(r.player().loop_changes.is_empty());
}

#[test]
fn test_kind_change_on_same_source_reloads() {
    let mut r = reconciler(MockPlayer::default());
    r.apply(ContentDescriptor::image("https://cdn/a.webm", T), T + 5_000);

    let outcome = r.apply(ContentDescriptor::video("https://cdn/a.webm", T), T + 5_000);

    assert_eq!(
        outcome,
        ReconcileOutcome::Playing {
            offset: Duration::from_secs(5),
            reloaded: true,
            seeked: true
        }
    );
    assert_eq!(r.player().loads, vec!["https://cdn/a.webm", "https://cdn/a.webm"]);
    assert_eq!(r.player().kind, Some(MediaKind::Video));
}

#[test]
fn test_redelivery_reseeks_when_drift_exceeds_tolerance() {
    let mut r = reconciler(MockPlayer::default());
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T);

    r.apply(descriptor.clone(), T + 10_000);
    r.player_mut().position = Duration::from_secs(4);

    let outcome = r.apply(descriptor, T + 10_000);

    assert!(matches!(outcome, ReconcileOutcome::Playing { reloaded: false, seeked: true, .. }));
    assert_eq!(r.player().loads.len(), 1);
    assert_eq!(r.player().position, Duration::from_secs(10));
}

#[test]
fn test_redelivery_across_loop_boundary_is_in_sync() {
    let mut r = reconciler(MockPlayer::default());
    let descriptor = ContentDescriptor::video("https://cdn/a.mp4", T)
        .with_duration_hint(Duration::from_secs(20));

    r.apply(descriptor.clone(), T + 19_800);
    // the wall clock wrapped to 50ms, the player is still just before the end
    r.player_mut().position = Duration::from_millis(19_950);

    let outcome = r.apply(descriptor, T + 20_050);

    assert_eq!(
        outcome,
        ReconcileOutcome::Playing {
            offset: Duration::from_millis(50),
            reloaded: false,
            seeked: false
        }
    );
}

#[test]
fn test_new_source_replaces_old() {
    let mut r = reconciler(MockPlayer::default());

    r.apply(ContentDescriptor::video("https://cdn/a.mp4", T), T + 1_000);
    let outcome = r.apply(ContentDescriptor::video("https://cdn/b.mp4", T + 5_000), T + 6_000);

    assert_eq!(
        outcome,
        ReconcileOutcome::Playing {
            offset: Duration::from_secs(1),
            reloaded: true,
            seeked: true
        }
    );
    assert_eq!(r.player().loads, vec!["https://cdn/a.mp4", "https://cdn/b.mp4"]);
    assert_eq!(r.current().unwrap().source_ref, "https://cdn/b.mp4");
}

// ── autoplay failures ───────────────────────────────────────────────────────

#[test]
fn test_blocked_playback_is_kept_pending() {
    let mut r = reconciler(MockPlayer::blocking_first(1));

    let outcome = r.apply(ContentDescriptor::video("https://cdn/a.mp4", T), T + 2_000);

    assert_eq!(
        outcome,
        ReconcileOutcome::AwaitingInteraction {
            offset: Duration::from_secs(2),
            error: PlaybackError::AutoplayBlocked
        }
    );
    assert!(r.has_pending());
    assert_eq!(r.player().waiting_shown, 1);
}

#[test]
fn test_retry_recomputes_offset_without_reloading() {
    let mut r = reconciler(MockPlayer::blocking_first(1));
    r.apply(ContentDescriptor::video("https://cdn/a.mp4", T), T + 2_000);

    let outcome = r.on_interaction(T + 9_000);

    assert_eq!(
        outcome,
        ReconcileOutcome::Playing {
            offset: Duration::from_secs(9),
            reloaded: false,
            seeked: true
        }
    );
    assert!(!r.has_pending());
    assert_eq!(r.player().loads.len(), 1);
    assert!(r.player().playing);
}

#[test]
fn test_retry_that_fails_again_stays_pending() {
    let mut r = reconciler(MockPlayer::blocking_first(2));
    r.apply(ContentDescriptor::video("https://cdn/a.mp4", T), T + 2_000);

    let outcome = r.on_interaction(T + 3_000);

    assert!(matches!(outcome, ReconcileOutcome::AwaitingInteraction { .. }));
    assert!(r.has_pending());
    assert!(matches!(r.on_interaction(T + 4_000), ReconcileOutcome::Playing { .. }));
}

#[test]
fn test_interaction_without_pending_is_idle() {
    let mut r = reconciler(MockPlayer::default());
    assert_eq!(r.on_interaction(T), ReconcileOutcome::Idle);
}

#[test]
fn test_newer_descriptor_supersedes_pending() {
    let mut r = reconciler(MockPlayer::blocking_first(1));
    r.apply(ContentDescriptor::video("https://cdn/a.mp4", T), T + 1_000);

    r.apply(ContentDescriptor::image("https://cdn/b.png", T + 2_000), T + 2_000);

    assert!(!r.has_pending());
    assert_eq!(r.on_interaction(T + 3_000), ReconcileOutcome::Idle);
}

// ── headless player ─────────────────────────────────────────────────────────

#[test]
fn test_log_player_tracks_seek_and_pause() {
    let mut player = LogPlayer::new();
    assert!(player.play().is_err());

    player.load("https://cdn/a.mp4", MediaKind::Video, true);
    player.seek(Duration::from_secs(5));
    assert_eq!(player.position(), Some(Duration::from_secs(5)));

    player.play().unwrap();
    assert!(player.is_playing());
    assert!(player.position().unwrap() >= Duration::from_secs(5));

    player.show_waiting();
    assert!(!player.is_playing());
    assert_eq!(player.loaded_source(), Some("https://cdn/a.mp4"));
}

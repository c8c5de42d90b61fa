// Display-side reconciliation and connection handling

pub mod connection;
pub mod player;
pub mod reconciler;

pub use connection::run_display;
pub use player::{LogPlayer, PlaybackError, Player};
pub use reconciler::{playback_offset, ReconcileOutcome, Reconciler};

/// Client wall clock in epoch milliseconds
pub fn wall_clock_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests;

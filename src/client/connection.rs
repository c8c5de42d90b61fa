use crate::client::player::Player;
use crate::client::reconciler::Reconciler;
use crate::client::wall_clock_ms;
use crate::config::DisplayConfig;
use crate::subscription::parse_content_update;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type DisplaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

/// Keep a display attached to its facade until `shutdown` fires.
///
/// Every successful connect starts a fresh server session whose handshake
/// brings the reconciler back in line; the player keeps running across
/// reconnects. Reconnect delay doubles from `reconnect_initial_ms` up to
/// `reconnect_max_ms` and resets after a successful connect.
pub async fn run_display<P: Player>(
    config: &DisplayConfig,
    reconciler: &mut Reconciler<P>,
    mut shutdown: mpsc::Receiver<()>,
) {
    let url = config.facade_url();
    let initial = Duration::from_millis(config.reconnect_initial_ms);
    let max_backoff = Duration::from_millis(config.reconnect_max_ms);
    let mut backoff = initial;

    loop {
        info!(url = %url, "Connecting to sync server...");

        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                backoff = initial;
                info!(facade_id = %config.facade_id, "Attached to facade");

                match display_session(ws, config, reconciler, &mut shutdown).await {
                    SessionEnd::Shutdown => {
                        info!("Display client shutting down");
                        return;
                    }
                    SessionEnd::Disconnected(reason) => {
                        warn!(reason = %reason, "Connection to sync server lost");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to sync server");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.recv() => return,
        }

        backoff = (backoff * 2).min(max_backoff);
    }
}

async fn display_session<P: Player>(
    ws: DisplaySocket,
    config: &DisplayConfig,
    reconciler: &mut Reconciler<P>,
    shutdown: &mut mpsc::Receiver<()>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    let silence = Duration::from_millis(config.silence_timeout_ms);
    let mut last_frame = Instant::now();

    let mut retry = interval(Duration::from_millis(config.playback_retry_ms));
    retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = stream.next() => {
                last_frame = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => handle_text(reconciler, &text),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            return SessionEnd::Disconnected(format!("failed to send pong: {e}"));
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        return SessionEnd::Disconnected("server closed the connection".into());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                    None => return SessionEnd::Disconnected("stream ended".into()),
                }
            }

            _ = sleep_until(last_frame + silence) => {
                return SessionEnd::Disconnected(format!(
                    "no frames for {}ms",
                    silence.as_millis()
                ));
            }

            _ = retry.tick() => {
                if reconciler.has_pending() {
                    let outcome = reconciler.on_interaction(wall_clock_ms());
                    debug!(outcome = ?outcome, "Retried playback start");
                }
            }

            _ = shutdown.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
        }
    }
}

/// Decode one server frame and hand it to the reconciler. Invalid frames
/// are dropped; the display keeps showing what it has.
fn handle_text<P: Player>(reconciler: &mut Reconciler<P>, text: &str) {
    let now = wall_clock_ms();
    match parse_content_update(text, now) {
        Ok(descriptor) => {
            let outcome = reconciler.apply(descriptor, now);
            info!(outcome = ?outcome, "Content update applied");
        }
        Err(e) => {
            warn!(error = %e, "Discarding server message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LogPlayer;

    #[test]
    fn test_invalid_frames_leave_reconciler_untouched() {
        let mut reconciler = Reconciler::new(LogPlayer::new(), Duration::from_millis(500));

        handle_text(&mut reconciler, "{not json");
        handle_text(&mut reconciler, r#"{"type":"content_update","startAt":1}"#);
        handle_text(&mut reconciler, r#"{"type":"frame","data":"AAAA"}"#);

        assert!(reconciler.current().is_none());
        assert!(reconciler.player().loaded_source().is_none());
    }

    #[test]
    fn test_valid_frame_is_applied() {
        let mut reconciler = Reconciler::new(LogPlayer::new(), Duration::from_millis(500));
        let anchor = wall_clock_ms() - 3_000;

        handle_text(
            &mut reconciler,
            &format!(r#"{{"type":"content_update","src":"https://cdn/a.mp4","startAt":{anchor}}}"#),
        );

        assert_eq!(reconciler.player().loaded_source(), Some("https://cdn/a.mp4"));
        assert!(reconciler.player().is_playing());
    }
}

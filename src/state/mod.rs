// Broadcaster, engine events and metrics

mod broadcaster;
mod events;
mod metrics;

pub use broadcaster::{Broadcaster, PublishReceipt};
pub use events::{PlayEvent, PlaybackReport};
pub use metrics::{MetricsSnapshot, SyncMetrics};

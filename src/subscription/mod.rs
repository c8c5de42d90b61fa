// Subscription registry, wire protocol and per-display sessions

pub mod protocol;
pub mod registry;
pub mod session;

pub use protocol::{parse_content_update, ContentUpdateMessage, WireError};
pub use registry::{
    ConnectionId, DeliveryError, Eviction, Subscriber, SubscriberQueue, SubscriptionRegistry,
};
pub use session::{CloseReason, ConnectionSession, SessionState};

use crate::content::{ContentDescriptor, FacadeId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Handle identifying one live connection
pub type ConnectionId = Uuid;

/// Why a descriptor could not be queued for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// Outbound queue is at capacity; the consumer is too slow
    Full,
    /// The session already went away
    Closed,
}

/// One-shot "you have been dropped" signal from the engine to a session.
#[derive(Debug, Default)]
pub struct Eviction {
    evicted: AtomicBool,
    notify: Notify,
}

impl Eviction {
    pub fn trigger(&self) {
        self.evicted.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.evicted.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been called (immediately if it already was).
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// Sending half of a connection's bounded outbound queue, as held by the
/// registry.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<ContentDescriptor>>,
    eviction: Arc<Eviction>,
}

/// Receiving half of a connection's outbound queue, owned by its session.
#[derive(Debug)]
pub struct SubscriberQueue {
    pub outbound: mpsc::Receiver<Arc<ContentDescriptor>>,
    pub eviction: Arc<Eviction>,
}

impl Subscriber {
    /// Create a subscriber with a bounded queue of `capacity` descriptors.
    ///
    /// `capacity` must be at least 1.
    pub fn channel(id: ConnectionId, capacity: usize) -> (Subscriber, SubscriberQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        let eviction = Arc::new(Eviction::default());

        let subscriber = Subscriber {
            id,
            outbound: tx,
            eviction: Arc::clone(&eviction),
        };
        let queue = SubscriberQueue {
            outbound: rx,
            eviction,
        };

        (subscriber, queue)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a descriptor without waiting.
    pub fn try_deliver(&self, descriptor: Arc<ContentDescriptor>) -> Result<(), DeliveryError> {
        self.outbound.try_send(descriptor).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Tell the owning session to close now, without draining its backlog.
    pub fn evict(&self) {
        self.eviction.trigger();
    }
}

/// Which connections are attached to which facade.
///
/// A connection is registered under at most one facade. Lookups return
/// copies, so callers can iterate while membership keeps changing.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_facade: DashMap<FacadeId, HashMap<ConnectionId, Subscriber>>,
    by_connection: DashMap<ConnectionId, FacadeId>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` under `facade`, dropping any earlier registration
    /// of the same connection.
    ///
    /// Returns the facade the connection was previously registered under.
    pub fn subscribe(&self, facade: FacadeId, subscriber: Subscriber) -> Option<FacadeId> {
        let id = subscriber.id;
        let previous = self.unsubscribe(id);

        self.by_facade
            .entry(facade)
            .or_default()
            .insert(id, subscriber);
        self.by_connection.insert(id, facade);

        previous
    }

    /// Remove a connection. Unknown handles are a no-op.
    ///
    /// Returns the facade the connection was registered under.
    pub fn unsubscribe(&self, id: ConnectionId) -> Option<FacadeId> {
        let (_, facade) = self.by_connection.remove(&id)?;

        if let Some(mut subscribers) = self.by_facade.get_mut(&facade) {
            subscribers.remove(&id);
        }
        self.by_facade
            .remove_if(&facade, |_, subscribers| subscribers.is_empty());

        Some(facade)
    }

    /// Snapshot of the subscribers currently attached to `facade`.
    pub fn list_subscribers(&self, facade: FacadeId) -> Vec<Subscriber> {
        self.by_facade
            .get(&facade)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, facade: FacadeId) -> usize {
        self.by_facade
            .get(&facade)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    pub fn facade_of(&self, id: ConnectionId) -> Option<FacadeId> {
        self.by_connection.get(&id).map(|entry| *entry.value())
    }

    /// Total number of registered connections across all facades
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}

use crate::content::{
    validate_descriptor, ContentDescriptor, ContentStore, DescriptorError, FacadeId, PublishPolicy,
};
use crate::state::events::{PlayEvent, PlaybackReport};
use crate::state::metrics::SyncMetrics;
use crate::subscription::{ConnectionId, DeliveryError, Subscriber, SubscriptionRegistry};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the monitor event channel. Lagging monitors skip events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Result of a successful publish
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// The descriptor as stored (after normalization)
    pub descriptor: Arc<ContentDescriptor>,
    /// Subscribers the descriptor was queued for
    pub delivered: usize,
    /// Subscribers dropped because their queue was full
    pub evicted: usize,
}

/// Writes the content store and fans updates out to attached displays.
///
/// Every operation that touches one facade (`publish`, `attach`) runs under
/// that facade's lock, so the stored value and the order in which it
/// reaches each connection queue always agree. Different facades never
/// contend. Queue sends are non-blocking; a connection whose queue is full is
/// evicted instead of slowing the publisher.
pub struct Broadcaster {
    store: Arc<ContentStore>,
    registry: SubscriptionRegistry,
    facade_locks: DashMap<FacadeId, Arc<Mutex<()>>>,
    policy: PublishPolicy,
    events_tx: broadcast::Sender<PlayEvent>,
    pub metrics: SyncMetrics,
}

impl Broadcaster {
    pub fn new(policy: PublishPolicy) -> Self {
        Self::with_store(Arc::new(ContentStore::new()), policy)
    }

    /// Build on top of an existing (possibly pre-populated) store
    pub fn with_store(store: Arc<ContentStore>, policy: PublishPolicy) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            registry: SubscriptionRegistry::new(),
            facade_locks: DashMap::new(),
            policy,
            events_tx,
            metrics: SyncMetrics::new(),
        }
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    /// Validate, store and fan out a new descriptor using the server clock.
    pub fn publish(
        &self,
        facade: FacadeId,
        descriptor: ContentDescriptor,
    ) -> Result<PublishReceipt, DescriptorError> {
        self.publish_at(facade, descriptor, Utc::now().timestamp_millis())
    }

    /// Same as [`publish`](Self::publish) with an explicit server clock
    /// reading in epoch milliseconds.
    pub fn publish_at(
        &self,
        facade: FacadeId,
        descriptor: ContentDescriptor,
        now_ms: i64,
    ) -> Result<PublishReceipt, DescriptorError> {
        let descriptor = match validate_descriptor(descriptor, &self.policy, now_ms) {
            Ok(d) => Arc::new(d),
            Err(e) => {
                self.metrics.record_rejected();
                warn!(facade_id = %facade, error = %e, "Rejected content descriptor");
                return Err(e);
            }
        };

        let lock = self.facade_lock(facade);
        let (delivered, evicted) = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            self.store.set(facade, Arc::clone(&descriptor));
            self.fan_out(facade, &descriptor)
        };

        self.metrics.record_publish();
        self.metrics.record_deliveries(delivered);

        info!(
            facade_id = %facade,
            src = %descriptor.source_ref,
            kind = descriptor.media_kind.as_str(),
            start_at = descriptor.anchor_time_ms,
            delivered = delivered,
            evicted = evicted,
            "Published content"
        );

        self.emit(PlayEvent::content_changed(facade, &descriptor, delivered));

        Ok(PublishReceipt {
            descriptor,
            delivered,
            evicted,
        })
    }

    /// Restore a facade's descriptor at boot without notifying anyone.
    pub fn rehydrate(&self, facade: FacadeId, descriptor: ContentDescriptor) {
        let lock = self.facade_lock(facade);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.set(facade, Arc::new(descriptor));
        debug!(facade_id = %facade, "Rehydrated facade content");
    }

    /// Current descriptor for a facade, exactly as a new handshake would see it
    pub fn current(&self, facade: FacadeId) -> Option<Arc<ContentDescriptor>> {
        self.store.get(facade)
    }

    /// Register a connection under `facade` and queue the handshake snapshot.
    ///
    /// The handshake is queued under the facade lock, so it is always the
    /// first item in the connection's queue and any later publish lands
    /// behind it. Returns the snapshot, or `None` if the facade has no
    /// content yet.
    pub fn attach(
        &self,
        facade: FacadeId,
        subscriber: Subscriber,
    ) -> Option<Arc<ContentDescriptor>> {
        let connection_id = subscriber.id();
        let lock = self.facade_lock(facade);

        let (snapshot, subscribers) = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

            let snapshot = self.store.get(facade);
            if let Some(ref current) = snapshot {
                // a fresh queue has room for at least one item
                if subscriber.try_deliver(Arc::clone(current)).is_ok() {
                    self.metrics.record_deliveries(1);
                }
            }
            self.registry.subscribe(facade, subscriber);

            (snapshot, self.registry.subscriber_count(facade))
        };

        info!(
            facade_id = %facade,
            connection_id = %connection_id,
            subscribers = subscribers,
            handshake = snapshot.is_some(),
            "Display attached"
        );

        self.emit(PlayEvent::DisplayAttached {
            facade_id: facade,
            connection_id,
            subscribers,
            at: Utc::now(),
        });

        snapshot
    }

    /// Unregister a connection. Safe to call more than once.
    pub fn detach(&self, connection_id: ConnectionId) {
        let Some(facade) = self.registry.unsubscribe(connection_id) else {
            return;
        };

        let subscribers = self.registry.subscriber_count(facade);
        if subscribers == 0 && self.store.get(facade).is_none() {
            self.release_facade_lock(facade);
        }

        info!(
            facade_id = %facade,
            connection_id = %connection_id,
            subscribers = subscribers,
            "Display detached"
        );

        self.emit(PlayEvent::DisplayDetached {
            facade_id: facade,
            connection_id,
            subscribers,
            at: Utc::now(),
        });
    }

    pub fn subscriber_count(&self, facade: FacadeId) -> usize {
        self.registry.subscriber_count(facade)
    }

    pub fn is_attached(&self, connection_id: ConnectionId) -> bool {
        self.registry.facade_of(connection_id).is_some()
    }

    /// Forward a display's play report to monitors
    pub fn report_playback(&self, report: PlaybackReport) {
        self.metrics.record_playback_report();
        debug!(facade_id = %report.facade_id, "Playback reported");
        self.emit(report.into_event(Utc::now()));
    }

    /// Subscribe to engine events (monitor channel)
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayEvent> {
        self.events_tx.subscribe()
    }

    /// Number of live monitor subscriptions
    pub fn monitor_count(&self) -> usize {
        self.events_tx.receiver_count()
    }

    /// Facades that currently own a lock entry
    pub(crate) fn tracked_facades(&self) -> usize {
        self.facade_locks.len()
    }

    fn facade_lock(&self, facade: FacadeId) -> Arc<Mutex<()>> {
        // clone the Arc out so the map shard is released before locking
        Arc::clone(self.facade_locks.entry(facade).or_default().value())
    }

    /// Drop the lock entry of a facade with nothing left to protect.
    ///
    /// Any in-flight publish or attach holds a clone of the lock, so the
    /// entry is only removed when the map's reference is the last one.
    fn release_facade_lock(&self, facade: FacadeId) {
        self.facade_locks
            .remove_if(&facade, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Queue `descriptor` for every subscriber of `facade`.
    ///
    /// Must be called with the facade lock held. Returns (delivered, evicted).
    fn fan_out(&self, facade: FacadeId, descriptor: &Arc<ContentDescriptor>) -> (usize, usize) {
        let mut delivered = 0;
        let mut evicted = 0;

        for subscriber in self.registry.list_subscribers(facade) {
            match subscriber.try_deliver(Arc::clone(descriptor)) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Full) => {
                    warn!(
                        facade_id = %facade,
                        connection_id = %subscriber.id(),
                        "Outbound queue full, dropping connection"
                    );
                    subscriber.evict();
                    self.detach(subscriber.id());
                    self.metrics.record_eviction();
                    evicted += 1;
                }
                Err(DeliveryError::Closed) => {
                    debug!(
                        facade_id = %facade,
                        connection_id = %subscriber.id(),
                        "Subscriber already gone"
                    );
                    self.detach(subscriber.id());
                }
            }
        }

        (delivered, evicted)
    }

    fn emit(&self, event: PlayEvent) {
        // no monitors attached is fine
        let _ = self.events_tx.send(event);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(PublishPolicy::default())
    }
}

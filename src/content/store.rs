use super::{ContentDescriptor, FacadeId};
use dashmap::DashMap;
use std::sync::Arc;

/// Authoritative "what is playing" fact base, one descriptor per facade.
///
/// The store is passive: it never notifies anyone. Fan-out is the
/// broadcaster's job. Descriptors are held behind `Arc` and swapped whole, so
/// a reader never observes a half-written value.
#[derive(Debug, Default)]
pub struct ContentStore {
    current: DashMap<FacadeId, Arc<ContentDescriptor>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self {
            current: DashMap::new(),
        }
    }

    /// Replace the current descriptor for a facade (last writer wins).
    ///
    /// Returns the descriptor that was replaced, if any.
    pub fn set(
        &self,
        facade: FacadeId,
        descriptor: Arc<ContentDescriptor>,
    ) -> Option<Arc<ContentDescriptor>> {
        self.current.insert(facade, descriptor)
    }

    /// Current descriptor, or `None` if nothing was ever assigned.
    pub fn get(&self, facade: FacadeId) -> Option<Arc<ContentDescriptor>> {
        self.current.get(&facade).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every facade that has content, in no particular order.
    pub fn entries(&self) -> Vec<(FacadeId, Arc<ContentDescriptor>)> {
        self.current
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

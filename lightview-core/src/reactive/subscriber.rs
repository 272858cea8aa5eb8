//! Subscriber bookkeeping for the reactive system.
//!
//! Every signal owns a [`Subscribers`] set. Effects are stored weakly: the
//! set never keeps an effect alive, and a dead entry is pruned the next time
//! the set is notified.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::effect::EffectInner;

/// Unique identifier for a subscriber.
///
/// Each effect gets a unique ID when created. The ID keys the subscriber sets
/// so that re-subscribing during the same run is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The set of effects subscribed to one signal, in subscription order.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RwLock<IndexMap<SubscriberId, Weak<EffectInner>>>,
}

impl Subscribers {
    /// Add a subscriber. Returns `false` if it was already present.
    pub(crate) fn insert(&self, id: SubscriberId, effect: Weak<EffectInner>) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, effect);
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.entries.write().shift_remove(&id);
    }

    /// Live subscribers, in order. Dead entries are dropped on the way.
    pub(crate) fn snapshot(&self) -> Vec<Arc<EffectInner>> {
        let mut entries = self.entries.write();
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|_, weak| match weak.upgrade() {
            Some(effect) => {
                live.push(effect);
                true
            }
            None => false,
        });
        live
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

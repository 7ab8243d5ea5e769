//! Store change notifications
//!
//! One publish/subscribe interface for every change to a collection, whether
//! it was written by this store instance (`Local`) or by another instance or
//! process sharing the backend (`External`). Events only name the collection;
//! subscribers re-read it.
//!
//! Two ways to listen:
//! - callbacks registered with [`Notifier::subscribe`], invoked synchronously
//!   from the thread that publishes the event;
//! - a tokio broadcast channel from [`Notifier::channel`] for async consumers.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast;

use super::types::Collection;

/// Where a change came from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// Written by the store instance that publishes the event
    Local,
    /// Written by another store instance or process
    External,
}

/// A collection changed
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StoreEvent {
    pub collection: Collection,
    pub origin: ChangeOrigin,
}

impl StoreEvent {
    pub fn local(collection: Collection) -> Self {
        Self {
            collection,
            origin: ChangeOrigin::Local,
        }
    }

    pub fn external(collection: Collection) -> Self {
        Self {
            collection,
            origin: ChangeOrigin::External,
        }
    }
}

type Callback = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Fan-out of store events to callbacks and channel receivers
pub struct Notifier {
    next_id: AtomicU64,
    callbacks: Mutex<BTreeMap<u64, Callback>>,
    channel: broadcast::Sender<StoreEvent>,
}

impl Notifier {
    /// Create a notifier whose broadcast channel holds `capacity` events
    pub fn new(capacity: usize) -> Arc<Self> {
        let (channel, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(BTreeMap::new()),
            channel,
        })
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.callbacks.lock() {
            Ok(mut callbacks) => {
                callbacks.insert(id, Arc::new(callback));
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id, Arc::new(callback));
            }
        }

        tracing::debug!(subscription_id = id, "Store subscriber registered");

        Subscription {
            id,
            notifier: Arc::downgrade(self),
        }
    }

    /// Deliver an event to every callback and channel receiver.
    ///
    /// Callbacks run after the registry lock is released, so a callback may
    /// read the store or drop its own subscription.
    pub fn publish(&self, event: StoreEvent) {
        let callbacks: Vec<Callback> = match self.callbacks.lock() {
            Ok(callbacks) => callbacks.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };

        for callback in &callbacks {
            callback(&event);
        }

        let _ = self.channel.send(event);

        tracing::trace!(
            collection = %event.collection,
            origin = ?event.origin,
            callbacks = callbacks.len(),
            "Published store event"
        );
    }

    /// Receiver for the async event stream
    pub fn channel(&self) -> broadcast::Receiver<StoreEvent> {
        self.channel.subscribe()
    }

    /// Number of registered callbacks
    pub fn subscriber_count(&self) -> usize {
        match self.callbacks.lock() {
            Ok(callbacks) => callbacks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn remove(&self, id: u64) {
        let removed = match self.callbacks.lock() {
            Ok(mut callbacks) => callbacks.remove(&id),
            Err(poisoned) => poisoned.into_inner().remove(&id),
        };
        if removed.is_some() {
            tracing::debug!(subscription_id = id, "Store subscriber removed");
        }
    }
}

/// Handle of a registered callback; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes the callback"]
pub struct Subscription {
    id: u64,
    notifier: Weak<Notifier>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregister the callback now
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(notifier) = self.notifier.upgrade() {
            notifier.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

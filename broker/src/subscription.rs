//! Reference-counted market-data subscriptions.
//!
//! Many listeners may watch the same key (a bar request, a ticker). The
//! backend subscription is opened when the first listener arrives and
//! closed when the last one leaves; in between, listeners come and go
//! without touching the backend.

use std::hash::Hash;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::BrokerError;
use crate::listener::ListenerId;

type Routes<K, L> = FxHashMap<K, Vec<(ListenerId, Arc<L>)>>;

/// Listener routing table for one kind of market-data stream.
///
/// `ops` serializes subscribe/unsubscribe so that the open/close decision
/// and the backend call happen as one step. `routes` is held only briefly,
/// never across a backend call, so delivery is not blocked by a slow
/// subscribe.
pub struct SubscriptionManager<K, L: ?Sized> {
    ops: Mutex<()>,
    routes: Mutex<Routes<K, L>>,
}

impl<K, L: ?Sized> Default for SubscriptionManager<K, L> {
    fn default() -> Self {
        Self {
            ops: Mutex::new(()),
            routes: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<K, L> SubscriptionManager<K, L>
where
    K: Eq + Hash + Clone + std::fmt::Display,
    L: ?Sized,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `key`, calling `open` if no listener was
    /// registered for that key before.
    ///
    /// If `open` fails nothing is registered.
    pub fn subscribe(
        &self,
        key: K,
        listener: Arc<L>,
        open: impl FnOnce(&K) -> Result<(), BrokerError>,
    ) -> Result<ListenerId, BrokerError> {
        let _ops = self.ops.lock();
        let first = !self.routes.lock().contains_key(&key);
        if first {
            open(&key)?;
            info!("opened subscription {key}");
        }
        let id = ListenerId::next();
        self.routes.lock().entry(key).or_default().push((id, listener));
        Ok(id)
    }

    /// Remove one listener from `key`, calling `close` if it was the last.
    ///
    /// Returns `Ok(false)` if the listener was not registered under `key`.
    /// The listener is removed even if `close` fails.
    pub fn unsubscribe(
        &self,
        key: &K,
        id: ListenerId,
        close: impl FnOnce(&K) -> Result<(), BrokerError>,
    ) -> Result<bool, BrokerError> {
        let _ops = self.ops.lock();
        let last = {
            let mut routes = self.routes.lock();
            let Some(listeners) = routes.get_mut(key) else {
                debug!("unsubscribe from {key}: no subscription");
                return Ok(false);
            };
            let Some(index) = listeners.iter().position(|(existing, _)| *existing == id) else {
                debug!("unsubscribe from {key}: listener not registered");
                return Ok(false);
            };
            listeners.remove(index);
            let last = listeners.is_empty();
            if last {
                routes.remove(key);
            }
            last
        };
        if last {
            close(key)?;
            info!("closed subscription {key}");
        }
        Ok(true)
    }

    /// Listeners for `key`, in registration order.
    pub fn listeners(&self, key: &K) -> Vec<Arc<L>> {
        self.routes
            .lock()
            .get(key)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, key: &K) -> usize {
        self.routes.lock().get(key).map_or(0, Vec::len)
    }

    pub fn is_subscribed(&self, key: &K) -> bool {
        self.routes.lock().contains_key(key)
    }

    /// Keys with at least one listener.
    pub fn active_keys(&self) -> Vec<K> {
        self.routes.lock().keys().cloned().collect()
    }

    /// Call `open` once for every key that still has listeners, e.g. after
    /// the backend connection was re-established.
    ///
    /// Listeners stay registered whether or not their key reopens; the
    /// keys that failed are returned with their errors.
    pub fn reopen_all(
        &self,
        mut open: impl FnMut(&K) -> Result<(), BrokerError>,
    ) -> Vec<(K, BrokerError)> {
        let _ops = self.ops.lock();
        let keys = self.active_keys();
        let mut failed = Vec::new();
        for key in keys {
            match open(&key) {
                Ok(()) => info!("reopened subscription {key}"),
                Err(e) => failed.push((key, e)),
            }
        }
        failed
    }
}

//! Listener traits and the registries that hold them.
//!
//! Every callback kind can have many listeners. Closures implement the
//! traits directly, so
//! `Arc::new(|event: &OrderEvent| -> anyhow::Result<()> { ... })` is a valid
//! order-event listener.
//!
//! Dispatch always works on a snapshot of the registry, taken under a short
//! read lock. Registering or removing a listener therefore never waits for
//! a callback to finish, and a callback may itself add or remove listeners.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{error, warn};
use parking_lot::RwLock;
use tradelink::{BarData, OrderEvent, Quote, RealtimeBarRequest, Timestamp};

use crate::error::BrokerError;

/// Receives every order event, in queue order.
pub trait OrderEventListener: Send + Sync {
    fn on_order_event(&self, event: &OrderEvent) -> anyhow::Result<()>;
}

/// Receives failures from asynchronous broker activity.
pub trait BrokerErrorListener: Send + Sync {
    fn on_broker_error(&self, error: &BrokerError);
}

/// Receives the broker's clock ticks.
pub trait TimeUpdateListener: Send + Sync {
    fn on_time_update(&self, time: Timestamp) -> anyhow::Result<()>;
}

/// Receives streaming bars for one subscription key.
pub trait RealtimeBarListener: Send + Sync {
    fn on_bar(&self, request: &RealtimeBarRequest, bar: &BarData) -> anyhow::Result<()>;
}

/// Receives level-1 quote ticks.
pub trait QuoteListener: Send + Sync {
    fn on_quote(&self, quote: &Quote) -> anyhow::Result<()>;
}

impl<F> OrderEventListener for F
where
    F: Fn(&OrderEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_order_event(&self, event: &OrderEvent) -> anyhow::Result<()> {
        self(event)
    }
}

impl<F> BrokerErrorListener for F
where
    F: Fn(&BrokerError) + Send + Sync,
{
    fn on_broker_error(&self, error: &BrokerError) {
        self(error)
    }
}

impl<F> TimeUpdateListener for F
where
    F: Fn(Timestamp) -> anyhow::Result<()> + Send + Sync,
{
    fn on_time_update(&self, time: Timestamp) -> anyhow::Result<()> {
        self(time)
    }
}

impl<F> RealtimeBarListener for F
where
    F: Fn(&RealtimeBarRequest, &BarData) -> anyhow::Result<()> + Send + Sync,
{
    fn on_bar(&self, request: &RealtimeBarRequest, bar: &BarData) -> anyhow::Result<()> {
        self(request, bar)
    }
}

impl<F> QuoteListener for F
where
    F: Fn(&Quote) -> anyhow::Result<()> + Send + Sync,
{
    fn on_quote(&self, quote: &Quote) -> anyhow::Result<()> {
        self(quote)
    }
}

/// Handle returned on registration; pass it back to remove the listener.
///
/// Ids are unique across all registries of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ListenerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered collection of listeners of one kind.
pub struct ListenerSet<L: ?Sized> {
    entries: RwLock<Vec<(ListenerId, Arc<L>)>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; it will be called after all earlier ones.
    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.write().push((id, listener));
        id
    }

    /// Remove a listener. Unknown ids are a no-op and return false.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Hand an error to every broker-error listener.
///
/// A panicking error listener is logged and skipped.
pub(crate) fn report(errors: &ListenerSet<dyn BrokerErrorListener>, err: &BrokerError) {
    warn!("{err}");
    for listener in errors.snapshot() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_broker_error(err)));
        if let Err(payload) = outcome {
            error!("broker error listener {}", panic_message(payload));
        }
    }
}

/// Call every listener in order, isolating failures.
///
/// An `Err` or a panic from one listener is reported as
/// [`BrokerError::ListenerFailure`] and the next listener still runs.
/// Returns the number of listeners that failed.
pub(crate) fn notify<L: ?Sized>(
    listeners: &[Arc<L>],
    kind: &str,
    errors: &ListenerSet<dyn BrokerErrorListener>,
    call: impl Fn(&L) -> anyhow::Result<()>,
) -> usize {
    let mut failures = 0;
    for listener in listeners {
        let message = match panic::catch_unwind(AssertUnwindSafe(|| call(listener))) {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => panic_message(payload),
        };
        failures += 1;
        report(
            errors,
            &BrokerError::ListenerFailure {
                listener: kind.to_string(),
                message,
            },
        );
    }
    failures
}

//! State shared between the client, the dispatcher thread and the backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use log::{debug, warn};
use parking_lot::Mutex;
use tradelink::{BarData, OrderEvent, Quote, RealtimeBarRequest, Ticker, Timestamp};

use crate::dispatcher::Inbox;
use crate::error::BrokerError;
use crate::listener::{
    self, BrokerErrorListener, ListenerSet, OrderEventListener, QuoteListener, RealtimeBarListener,
    TimeUpdateListener,
};
use crate::subscription::SubscriptionManager;
use crate::tracker::OrderTracker;

/// Registries and session state behind one broker client.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) order_listeners: ListenerSet<dyn OrderEventListener>,
    pub(crate) error_listeners: ListenerSet<dyn BrokerErrorListener>,
    pub(crate) time_listeners: ListenerSet<dyn TimeUpdateListener>,
    pub(crate) bars: SubscriptionManager<RealtimeBarRequest, dyn RealtimeBarListener>,
    pub(crate) quotes: SubscriptionManager<Ticker, dyn QuoteListener>,
    pub(crate) tracker: OrderTracker,
    pub(crate) connected: AtomicBool,
    pub(crate) last_time: Mutex<Option<Timestamp>>,
}

impl Shared {
    pub(crate) fn report(&self, err: &BrokerError) {
        listener::report(&self.error_listeners, err);
    }

    /// Apply an order event to the tracker, then hand it to every listener.
    ///
    /// An event that would move a tracked order through an illegal
    /// transition, or overflow its position, is reported and not delivered.
    pub(crate) fn dispatch(&self, event: &OrderEvent) {
        match self.tracker.apply(event) {
            Ok(Some(order)) => debug!("order {} now {}", event.order_id, order.status()),
            Ok(None) => debug!("event for untracked order {}", event.order_id),
            Err(e) => {
                self.report(&e);
                return;
            }
        }
        listener::notify(
            &self.order_listeners.snapshot(),
            "order event",
            &self.error_listeners,
            |l| l.on_order_event(event),
        );
    }
}

/// Handle through which a backend reports asynchronous activity.
///
/// Cheap to clone and safe to use from any thread. Order events are queued
/// and delivered in push order by the dispatcher thread. Bars, quotes and
/// clock ticks are delivered on the calling thread.
#[derive(Clone)]
pub struct EventHub {
    shared: Arc<Shared>,
    events: Sender<Inbox>,
}

impl EventHub {
    pub(crate) fn new(shared: Arc<Shared>, events: Sender<Inbox>) -> Self {
        Self { shared, events }
    }

    /// Queue an order event for the dispatcher.
    pub fn push_order_event(&self, event: OrderEvent) {
        if self.events.send(Inbox::Event(event)).is_err() {
            warn!("order event dropped: dispatcher is gone");
        }
    }

    /// Deliver one bar to every listener subscribed under `request`.
    pub fn deliver_bar(&self, request: &RealtimeBarRequest, bar: &BarData) {
        let listeners = self.shared.bars.listeners(request);
        if listeners.is_empty() {
            debug!("bar for {request} has no listeners");
            return;
        }
        listener::notify(&listeners, "realtime bar", &self.shared.error_listeners, |l| {
            l.on_bar(request, bar)
        });
    }

    /// Deliver one quote tick to every listener subscribed to its ticker.
    pub fn deliver_quote(&self, quote: &Quote) {
        let listeners = self.shared.quotes.listeners(&quote.ticker);
        if listeners.is_empty() {
            debug!("quote for {} has no listeners", quote.ticker);
            return;
        }
        listener::notify(&listeners, "quote", &self.shared.error_listeners, |l| {
            l.on_quote(quote)
        });
    }

    /// Record the broker's current time and tell time listeners.
    pub fn publish_time(&self, time: Timestamp) {
        *self.shared.last_time.lock() = Some(time);
        listener::notify(
            &self.shared.time_listeners.snapshot(),
            "time update",
            &self.shared.error_listeners,
            |l| l.on_time_update(time),
        );
    }

    /// Hand an asynchronous failure to broker-error listeners.
    pub fn report_error(&self, err: BrokerError) {
        self.shared.report(&err);
    }

    /// The backend lost its connection.
    ///
    /// The client is marked disconnected and the failure is reported. A
    /// later `connect` reconnects.
    pub fn connection_lost(&self, reason: impl Into<String>) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.report(&BrokerError::Connection(reason.into()));
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("connected", &self.shared.connected.load(Ordering::Relaxed))
            .field("queued", &self.events.len())
            .finish()
    }
}

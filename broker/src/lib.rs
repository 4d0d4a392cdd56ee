//! Vendor-neutral broker access for tradelink.
//!
//! Strategy code talks to the [`Broker`] trait. [`BrokerClient`] implements
//! it on top of any [`Backend`] (a vendor adapter) and owns everything that
//! is the same for every vendor:
//!
//! - the order-id critical section ([`OrderIdGuard`]),
//! - ordered, serial delivery of order events ([`OrderEventProcessor`]),
//! - reference-counted bar and quote subscriptions ([`SubscriptionManager`]),
//! - listener registries with failure isolation ([`ListenerSet`]),
//! - a session order tracker and fill-derived positions ([`OrderTracker`]).
//!
//! [`mock::MockBackend`] is an in-memory backend for tests.
//!
//! ```
//! use std::sync::Arc;
//! use tradelink::{Exchange, OrderEvent, OrderStatus, Side, Ticker, TradeOrder};
//! use tradelink_broker::mock::{FillMode, MockBackend};
//! use tradelink_broker::{Broker, BrokerClient};
//!
//! let broker = BrokerClient::new(MockBackend::builder().fill_mode(FillMode::ImmediateFull).build());
//! broker.connect().unwrap();
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let tx = std::sync::Mutex::new(tx);
//! broker.add_order_event_listener(Arc::new(move |e: &OrderEvent| -> anyhow::Result<()> {
//!     tx.lock().unwrap().send(e.status)?;
//!     Ok(())
//! }));
//!
//! let qqq = Ticker::equity("QQQ", Exchange::NASDAQ).unwrap();
//! let id = broker.submit(TradeOrder::limit(qqq, Side::Buy, 10, 300.0)).unwrap();
//!
//! assert_eq!(rx.recv().unwrap(), OrderStatus::Submitted);
//! assert_eq!(rx.recv().unwrap(), OrderStatus::Filled);
//! assert_eq!(broker.request_order_status(id).unwrap().unwrap().filled_quantity(), 10);
//! broker.disconnect().unwrap();
//! ```

pub mod backend;
pub mod client;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod historical;
pub mod hub;
pub mod listener;
pub mod lock;
pub mod mock;
pub mod subscription;
pub mod tracker;

use std::sync::Arc;

pub use backend::Backend;
pub use client::BrokerClient;
pub use clock::TimeSync;
pub use config::BrokerConfig;
pub use dispatcher::OrderEventProcessor;
pub use error::BrokerError;
pub use historical::HistoricalDataRequest;
pub use hub::EventHub;
pub use listener::{
    BrokerErrorListener, ListenerId, ListenerSet, OrderEventListener, QuoteListener,
    RealtimeBarListener, TimeUpdateListener,
};
pub use lock::{OrderIdGuard, OrderIdLock};
pub use subscription::SubscriptionManager;
pub use tracker::OrderTracker;

use tradelink::{BarData, OrderId, Position, RealtimeBarRequest, Ticker, Timestamp, TradeOrder};

/// A broker session: order entry, order events, market data and account
/// queries behind one vendor-neutral interface.
pub trait Broker: Send + Sync {
    /// Open the session. Calling it while connected is a no-op.
    fn connect(&self) -> Result<(), BrokerError>;

    /// Close the session. Calling it while disconnected is a no-op.
    fn disconnect(&self) -> Result<(), BrokerError>;

    /// Last known connection state.
    fn is_connected(&self) -> bool;

    /// Enter the order-id critical section.
    ///
    /// Holds until the guard is dropped or released.
    fn acquire_lock(&self) -> Result<OrderIdGuard<'_>, BrokerError>;

    /// Request cancellation of a working order.
    fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError>;

    /// Cancel `original` and submit `replacement` under a fresh id.
    fn cancel_and_replace_order(
        &self,
        original: OrderId,
        replacement: TradeOrder,
    ) -> Result<OrderId, BrokerError>;

    /// Latest known state of an order, or `None` if neither this session
    /// nor the backend knows it.
    fn request_order_status(&self, id: OrderId) -> Result<Option<TradeOrder>, BrokerError>;

    fn open_orders(&self) -> Result<Vec<TradeOrder>, BrokerError>;

    fn all_positions(&self) -> Result<Vec<Position>, BrokerError>;

    fn add_order_event_listener(&self, listener: Arc<dyn OrderEventListener>) -> ListenerId;

    fn remove_order_event_listener(&self, id: ListenerId) -> bool;

    fn add_broker_error_listener(&self, listener: Arc<dyn BrokerErrorListener>) -> ListenerId;

    fn remove_broker_error_listener(&self, id: ListenerId) -> bool;

    fn add_time_update_listener(&self, listener: Arc<dyn TimeUpdateListener>) -> ListenerId;

    fn remove_time_update_listener(&self, id: ListenerId) -> bool;

    fn subscribe_realtime_bars(
        &self,
        request: RealtimeBarRequest,
        listener: Arc<dyn RealtimeBarListener>,
    ) -> Result<ListenerId, BrokerError>;

    /// Returns `Ok(false)` if the listener was not subscribed to `request`.
    fn unsubscribe_realtime_bars(
        &self,
        request: &RealtimeBarRequest,
        id: ListenerId,
    ) -> Result<bool, BrokerError>;

    fn subscribe_quotes(
        &self,
        ticker: Ticker,
        listener: Arc<dyn QuoteListener>,
    ) -> Result<ListenerId, BrokerError>;

    fn unsubscribe_quotes(&self, ticker: &Ticker, id: ListenerId) -> Result<bool, BrokerError>;

    /// Bars for the requested window, sorted by timestamp ascending.
    fn request_historical_data(
        &self,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<BarData>, BrokerError>;

    /// The backend's clock.
    fn current_time(&self) -> Result<Timestamp, BrokerError>;

    /// Take a fresh id, assign it to `order` and place it.
    fn submit(&self, order: TradeOrder) -> Result<OrderId, BrokerError> {
        let mut guard = self.acquire_lock()?;
        guard.submit(order)
    }

    /// Cancel by order value; the order must have been placed.
    fn cancel(&self, order: &TradeOrder) -> Result<(), BrokerError> {
        let id = order.id().ok_or(BrokerError::MissingOrderId)?;
        self.cancel_order(id)
    }

    /// One-by-one spread of two instruments.
    fn build_combo_ticker(&self, first: &Ticker, second: &Ticker) -> Result<Ticker, BrokerError> {
        self.build_combo_ticker_with_ratios(first, 1, second, 1)
    }

    fn build_combo_ticker_with_ratios(
        &self,
        first: &Ticker,
        first_ratio: u32,
        second: &Ticker,
        second_ratio: u32,
    ) -> Result<Ticker, BrokerError> {
        Ok(Ticker::pair(
            first.clone(),
            first_ratio,
            second.clone(),
            second_ratio,
        )?)
    }
}

//! The seam between the broker client and a concrete vendor API.
//!
//! A backend translates requests into vendor calls and reports everything
//! asynchronous (order events, bars, quotes, connection loss) through the
//! [`EventHub`] it receives on `connect`. It does not keep listener lists,
//! count subscribers or serialize order ids; the client does all of that.

use tradelink::{BarData, OrderId, Position, RealtimeBarRequest, Ticker, Timestamp, TradeOrder};

use crate::error::BrokerError;
use crate::historical::HistoricalDataRequest;
use crate::hub::EventHub;

/// A vendor adapter.
///
/// Methods take `&self` and may be called from several threads; the
/// client guarantees `next_order_id`/`place_order` pairs never interleave.
pub trait Backend: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Open the session. `events` stays valid until `disconnect`.
    fn connect(&self, events: EventHub) -> Result<(), BrokerError>;

    fn disconnect(&self) -> Result<(), BrokerError>;

    /// Next order id; must be greater than every id issued before.
    fn next_order_id(&self) -> Result<OrderId, BrokerError>;

    /// Send an order that already carries its id.
    fn place_order(&self, order: &TradeOrder) -> Result<(), BrokerError>;

    /// Request cancellation. The outcome arrives as an order event.
    ///
    /// Fails with [`BrokerError::UnknownOrder`] if the backend has no
    /// record of `id`.
    fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError>;

    /// Current view of one order, if the backend knows it.
    fn order_status(&self, id: OrderId) -> Result<Option<TradeOrder>, BrokerError>;

    /// Orders the backend considers working.
    fn open_orders(&self) -> Result<Vec<TradeOrder>, BrokerError>;

    /// Account positions as reported by the backend.
    fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    fn subscribe_bars(&self, request: &RealtimeBarRequest) -> Result<(), BrokerError>;

    fn unsubscribe_bars(&self, request: &RealtimeBarRequest) -> Result<(), BrokerError>;

    fn subscribe_quotes(&self, ticker: &Ticker) -> Result<(), BrokerError>;

    fn unsubscribe_quotes(&self, ticker: &Ticker) -> Result<(), BrokerError>;

    /// Bars for the requested window, in any order.
    fn historical_data(&self, request: &HistoricalDataRequest)
    -> Result<Vec<BarData>, BrokerError>;

    /// The backend's clock.
    fn current_time(&self) -> Result<Timestamp, BrokerError>;
}

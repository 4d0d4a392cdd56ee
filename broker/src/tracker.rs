//! Session-local view of submitted orders and the positions their fills
//! add up to.
//!
//! Everything here lives as long as the client. Terminal orders stay
//! queryable until [`OrderTracker::prune_terminal`] drops them.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tradelink::{OrderEvent, OrderId, Position, PositionBook, Ticker, TradeOrder};

use crate::error::BrokerError;

/// Orders placed through this session, keyed by id.
///
/// Events are applied with the order state machine, so a tracked order
/// never moves through an illegal transition. Lock order is always
/// `orders` then `positions`.
#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: Mutex<FxHashMap<OrderId, TradeOrder>>,
    positions: Mutex<PositionBook>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an order that has been given its id.
    pub fn register(&self, order: TradeOrder) -> Result<OrderId, BrokerError> {
        let id = order.id().ok_or(BrokerError::MissingOrderId)?;
        self.orders.lock().insert(id, order);
        Ok(id)
    }

    /// Stop tracking an order, e.g. because the backend refused it.
    pub fn forget(&self, id: OrderId) -> Option<TradeOrder> {
        self.orders.lock().remove(&id)
    }

    /// Apply an event to the order it names.
    ///
    /// Returns the updated order, or `None` if the order was not placed in
    /// this session. On error neither the order nor its position changes.
    pub fn apply(&self, event: &OrderEvent) -> Result<Option<TradeOrder>, BrokerError> {
        let mut orders = self.orders.lock();
        let Some(order) = orders.get_mut(&event.order_id) else {
            return Ok(None);
        };
        let mut updated = order.clone();
        updated.apply(event)?;
        if let Some(fill) = event.fill {
            self.positions
                .lock()
                .record_fill(updated.ticker(), updated.side(), fill)?;
        }
        *order = updated.clone();
        Ok(Some(updated))
    }

    /// Drop filled, cancelled and rejected orders. Positions are kept.
    ///
    /// Returns how many orders were removed.
    pub fn prune_terminal(&self) -> usize {
        let mut orders = self.orders.lock();
        let before = orders.len();
        orders.retain(|_, o| !o.status().is_terminal());
        before - orders.len()
    }

    pub fn get(&self, id: OrderId) -> Option<TradeOrder> {
        self.orders.lock().get(&id).cloned()
    }

    /// Orders not yet in a terminal state, ordered by id.
    pub fn active(&self) -> Vec<TradeOrder> {
        let mut active: Vec<TradeOrder> = self
            .orders
            .lock()
            .values()
            .filter(|o| !o.status().is_terminal())
            .cloned()
            .collect();
        active.sort_by_key(|o| o.id());
        active
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.lock().is_empty()
    }

    /// Non-flat positions built from this session's fills.
    pub fn positions(&self) -> Vec<Position> {
        self.positions.lock().open_positions()
    }

    pub fn position(&self, ticker: &Ticker) -> i64 {
        self.positions.lock().quantity(ticker)
    }
}

//! Mock backend for testing: implements [`Backend`] with configurable behavior.
//!
//! Use this in integration tests to simulate a broker without network calls.
//! Order events are pushed through the [`EventHub`] handed over on connect,
//! exactly as a real adapter would.
//!
//! ```
//! use tradelink::Exchange;
//! use tradelink::{Position, Ticker};
//! use tradelink_broker::mock::{FillMode, MockBackend};
//!
//! let spy = Ticker::equity("SPY", Exchange::ARCA).unwrap();
//! let backend = MockBackend::builder()
//!     .fill_mode(FillMode::ImmediatePartial(0.5))
//!     .with_position(Position::reported(spy, 100, 450.0))
//!     .first_order_id(1000)
//!     .build();
//! ```

use chrono::Utc;
use log::debug;
use parking_lot::Mutex;
use tradelink::{
    BarData, OrderEvent, OrderId, Position, RealtimeBarRequest, Ticker, Timestamp, TradeOrder,
};

use crate::backend::Backend;
use crate::error::BrokerError;
use crate::historical::HistoricalDataRequest;
use crate::hub::EventHub;

/// How the mock backend handles placed orders.
#[derive(Clone, Debug)]
pub enum FillMode {
    /// Submitted, then fully filled at the limit price (or the mock's market price).
    ImmediateFull,
    /// Submitted, then partially filled (the given fraction, e.g. 0.5 = 50%).
    ImmediatePartial(f64),
    /// `place_order` fails with `OrderRejected`.
    Reject,
    /// Nothing is pushed; the test drives events through the hub.
    Manual,
}

/// Builder for [`MockBackend`].
pub struct MockBackendBuilder {
    fill_mode: FillMode,
    positions: Vec<Position>,
    history: Vec<BarData>,
    history_error: Option<String>,
    fail_connect: bool,
    first_order_id: u64,
    scripted_ids: Vec<u64>,
    market_price: f64,
    clock: Option<Timestamp>,
}

impl MockBackendBuilder {
    pub fn fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    /// Bars served by `historical_data`, filtered to the requested window.
    pub fn with_history(mut self, bars: Vec<BarData>) -> Self {
        self.history = bars;
        self
    }

    /// Make every historical request fail with `reason`.
    pub fn fail_history(mut self, reason: impl Into<String>) -> Self {
        self.history_error = Some(reason.into());
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// First id handed out by `next_order_id`; later ids count up from it.
    pub fn first_order_id(mut self, id: u64) -> Self {
        self.first_order_id = id;
        self
    }

    /// Hand out exactly these ids, in order, before counting resumes.
    pub fn with_order_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.scripted_ids = ids.into_iter().collect();
        self
    }

    /// Fill price for market orders.
    pub fn market_price(mut self, price: f64) -> Self {
        self.market_price = price;
        self
    }

    /// Fixed answer for `current_time`; defaults to the wall clock.
    pub fn clock(mut self, time: Timestamp) -> Self {
        self.clock = Some(time);
        self
    }

    pub fn build(self) -> MockBackend {
        MockBackend {
            fill_mode: self.fill_mode,
            positions: self.positions,
            history: self.history,
            history_error: self.history_error,
            fail_connect: self.fail_connect,
            market_price: self.market_price,
            clock: self.clock,
            state: Mutex::new(MockState {
                next_id: self.first_order_id,
                scripted_ids: self.scripted_ids,
                ..MockState::default()
            }),
        }
    }
}

#[derive(Default)]
struct MockState {
    hub: Option<EventHub>,
    connects: usize,
    disconnects: usize,
    next_id: u64,
    scripted_ids: Vec<u64>,
    placed: Vec<TradeOrder>,
    working: Vec<OrderId>,
    cancels: Vec<OrderId>,
    bar_opens: Vec<RealtimeBarRequest>,
    bar_closes: Vec<RealtimeBarRequest>,
    quote_opens: Vec<Ticker>,
    quote_closes: Vec<Ticker>,
    history_requests: usize,
}

/// An in-memory backend that records every call.
pub struct MockBackend {
    fill_mode: FillMode,
    positions: Vec<Position>,
    history: Vec<BarData>,
    history_error: Option<String>,
    fail_connect: bool,
    market_price: f64,
    clock: Option<Timestamp>,
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder {
            fill_mode: FillMode::ImmediateFull,
            positions: Vec::new(),
            history: Vec::new(),
            history_error: None,
            fail_connect: false,
            first_order_id: 1,
            scripted_ids: Vec::new(),
            market_price: 100.0,
            clock: None,
        }
    }

    /// The hub received on the last `connect`.
    pub fn hub(&self) -> Option<EventHub> {
        self.state.lock().hub.clone()
    }

    /// Orders placed so far (for assertion in tests).
    pub fn placed_orders(&self) -> Vec<TradeOrder> {
        self.state.lock().placed.clone()
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.state.lock().cancels.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().disconnects
    }

    /// Backend bar subscriptions opened and closed.
    pub fn bar_subscription_calls(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.bar_opens.len(), state.bar_closes.len())
    }

    /// Backend quote subscriptions opened and closed.
    pub fn quote_subscription_calls(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.quote_opens.len(), state.quote_closes.len())
    }

    pub fn history_requests(&self) -> usize {
        self.state.lock().history_requests
    }

    fn connected_hub(&self) -> Result<EventHub, BrokerError> {
        self.state.lock().hub.clone().ok_or(BrokerError::NotConnected)
    }

    fn fill_price(&self, order: &TradeOrder) -> f64 {
        order.limit_price().unwrap_or(self.market_price)
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&self, events: EventHub) -> Result<(), BrokerError> {
        if self.fail_connect {
            return Err(BrokerError::Connection("mock: connection refused".into()));
        }
        let mut state = self.state.lock();
        state.hub = Some(events);
        state.connects += 1;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.hub = None;
        state.disconnects += 1;
        Ok(())
    }

    fn next_order_id(&self) -> Result<OrderId, BrokerError> {
        let mut state = self.state.lock();
        if state.hub.is_none() {
            return Err(BrokerError::NotConnected);
        }
        if !state.scripted_ids.is_empty() {
            return Ok(OrderId(state.scripted_ids.remove(0)));
        }
        let id = state.next_id;
        state.next_id += 1;
        Ok(OrderId(id))
    }

    fn place_order(&self, order: &TradeOrder) -> Result<(), BrokerError> {
        let id = order.id().ok_or(BrokerError::MissingOrderId)?;
        let hub = {
            let mut state = self.state.lock();
            let hub = state.hub.clone().ok_or(BrokerError::NotConnected)?;
            state.placed.push(order.clone());
            if !matches!(self.fill_mode, FillMode::Reject | FillMode::ImmediateFull) {
                state.working.push(id);
            }
            hub
        };

        let now = Utc::now();
        let price = self.fill_price(order);
        match self.fill_mode {
            FillMode::Reject => {
                return Err(BrokerError::OrderRejected {
                    id,
                    reason: "mock: order rejected".into(),
                });
            }
            FillMode::Manual => {}
            FillMode::ImmediateFull => {
                hub.push_order_event(OrderEvent::submitted(id, now));
                hub.push_order_event(OrderEvent::filled(id, order.quantity(), price, now));
            }
            FillMode::ImmediatePartial(frac) => {
                hub.push_order_event(OrderEvent::submitted(id, now));
                let qty = order.quantity();
                let filled = ((qty as f64 * frac) as u64).min(qty.saturating_sub(1));
                if filled > 0 {
                    hub.push_order_event(OrderEvent::partially_filled(id, filled, price, now));
                }
            }
        }
        debug!("mock: placed order {id}");
        Ok(())
    }

    fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError> {
        let hub = self.connected_hub()?;
        let was_working = {
            let mut state = self.state.lock();
            if !state.placed.iter().any(|o| o.id() == Some(id)) {
                return Err(BrokerError::UnknownOrder(id));
            }
            state.cancels.push(id);
            match state.working.iter().position(|w| *w == id) {
                Some(index) => {
                    state.working.remove(index);
                    true
                }
                None => false,
            }
        };
        if was_working && !matches!(self.fill_mode, FillMode::Manual) {
            hub.push_order_event(OrderEvent::cancelled(id, Utc::now()));
        }
        Ok(())
    }

    fn order_status(&self, id: OrderId) -> Result<Option<TradeOrder>, BrokerError> {
        self.connected_hub()?;
        Ok(self
            .state
            .lock()
            .placed
            .iter()
            .find(|o| o.id() == Some(id))
            .cloned())
    }

    fn open_orders(&self) -> Result<Vec<TradeOrder>, BrokerError> {
        self.connected_hub()?;
        let state = self.state.lock();
        Ok(state
            .placed
            .iter()
            .filter(|o| o.id().is_some_and(|id| state.working.contains(&id)))
            .cloned()
            .collect())
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.connected_hub()?;
        Ok(self.positions.clone())
    }

    fn subscribe_bars(&self, request: &RealtimeBarRequest) -> Result<(), BrokerError> {
        self.connected_hub()?;
        self.state.lock().bar_opens.push(request.clone());
        Ok(())
    }

    fn unsubscribe_bars(&self, request: &RealtimeBarRequest) -> Result<(), BrokerError> {
        self.state.lock().bar_closes.push(request.clone());
        Ok(())
    }

    fn subscribe_quotes(&self, ticker: &Ticker) -> Result<(), BrokerError> {
        self.connected_hub()?;
        self.state.lock().quote_opens.push(ticker.clone());
        Ok(())
    }

    fn unsubscribe_quotes(&self, ticker: &Ticker) -> Result<(), BrokerError> {
        self.state.lock().quote_closes.push(ticker.clone());
        Ok(())
    }

    fn historical_data(
        &self,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<BarData>, BrokerError> {
        self.connected_hub()?;
        self.state.lock().history_requests += 1;
        if let Some(reason) = &self.history_error {
            return Err(BrokerError::Connection(reason.clone()));
        }
        Ok(self
            .history
            .iter()
            .filter(|bar| request.contains(bar.timestamp))
            .cloned()
            .collect())
    }

    fn current_time(&self) -> Result<Timestamp, BrokerError> {
        self.connected_hub()?;
        Ok(self.clock.unwrap_or_else(Utc::now))
    }
}

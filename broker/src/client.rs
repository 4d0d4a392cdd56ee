//! The broker client: one session over one backend.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tradelink::{BarData, OrderId, Position, RealtimeBarRequest, Ticker, Timestamp, TradeOrder};

use crate::backend::Backend;
use crate::clock::TimeSync;
use crate::config::BrokerConfig;
use crate::dispatcher::{OrderEventProcessor, Retired};
use crate::error::BrokerError;
use crate::historical::HistoricalDataRequest;
use crate::hub::{EventHub, Shared};
use crate::listener::{
    BrokerErrorListener, ListenerId, OrderEventListener, QuoteListener, RealtimeBarListener,
    TimeUpdateListener,
};
use crate::lock::{OrderEntry, OrderIdGuard, OrderIdLock};
use crate::Broker;

/// A [`Broker`] over a concrete [`Backend`].
///
/// Create one per session and share it by reference or `Arc`; all methods
/// take `&self`. Dropping the client stops its background threads but does
/// not disconnect the backend.
pub struct BrokerClient<B: Backend> {
    backend: Arc<B>,
    config: BrokerConfig,
    shared: Arc<Shared>,
    hub: EventHub,
    order_ids: OrderIdLock,
    transitions: Mutex<()>,
    processor: Mutex<OrderEventProcessor>,
    time_sync: Mutex<Option<TimeSync>>,
}

impl<B: Backend> BrokerClient<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, BrokerConfig::default())
    }

    pub fn with_config(backend: B, config: BrokerConfig) -> Self {
        let shared = Arc::new(Shared::default());
        let processor = OrderEventProcessor::new(Arc::clone(&shared));
        let hub = EventHub::new(Arc::clone(&shared), processor.sender());
        let order_ids = match config.lock_timeout() {
            Some(timeout) => OrderIdLock::with_timeout(timeout),
            None => OrderIdLock::new(),
        };
        Self {
            backend: Arc::new(backend),
            config,
            shared,
            hub,
            order_ids,
            transitions: Mutex::new(()),
            processor: Mutex::new(processor),
            time_sync: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Handle the backend uses to report events; also useful in tests.
    pub fn events(&self) -> EventHub {
        self.hub.clone()
    }

    /// Positions built from fills received in this session.
    pub fn fill_positions(&self) -> Vec<Position> {
        self.shared.tracker.positions()
    }

    /// Net filled quantity for `ticker` in this session.
    pub fn fill_position(&self, ticker: &Ticker) -> i64 {
        self.shared.tracker.position(ticker)
    }

    /// Most recent time published by the backend or the time-sync poller.
    pub fn last_broker_time(&self) -> Option<Timestamp> {
        *self.shared.last_time.lock()
    }

    pub fn is_processing_events(&self) -> bool {
        self.processor.lock().is_running()
    }

    /// Order events queued but not yet delivered.
    pub fn pending_events(&self) -> usize {
        self.processor.lock().pending()
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.shared.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn start_time_sync(&self) -> Result<(), BrokerError> {
        let Some(interval) = self.config.time_sync_interval() else {
            return Ok(());
        };
        let mut slot = self.time_sync.lock();
        if slot.is_none() {
            let backend = Arc::clone(&self.backend);
            *slot = Some(TimeSync::start(interval, self.hub.clone(), move || {
                backend.current_time()
            })?);
        }
        Ok(())
    }

    /// Signal both background threads. Nothing is joined here, so this may
    /// run under `transitions`.
    fn retire_workers(&self) -> (Option<TimeSync>, Option<Retired>) {
        let sync = self.time_sync.lock().take();
        let retired = self.processor.lock().retire();
        (sync, retired)
    }

    /// Must run with no client lock held; listeners on either thread may
    /// call back into the client.
    fn join_workers((sync, retired): (Option<TimeSync>, Option<Retired>)) {
        if let Some(mut sync) = sync {
            sync.stop();
        }
        if let Some(retired) = retired {
            retired.join();
        }
    }

    fn reopen_subscriptions(&self) {
        let bars = self
            .shared
            .bars
            .reopen_all(|r| self.backend.subscribe_bars(r));
        for (request, e) in bars {
            warn!("bar subscription {request} not reopened: {e}");
            self.shared.report(&e);
        }
        let quotes = self
            .shared
            .quotes
            .reopen_all(|t| self.backend.subscribe_quotes(t));
        for (ticker, e) in quotes {
            warn!("quote subscription {ticker} not reopened: {e}");
            self.shared.report(&e);
        }
    }

    /// Forget orders that reached a terminal state.
    ///
    /// The session keeps every order it placed so that status queries and
    /// late events resolve against it. Long-running sessions call this to
    /// bound that history; positions are unaffected. Returns how many
    /// orders were dropped.
    pub fn prune_finished_orders(&self) -> usize {
        let pruned = self.shared.tracker.prune_terminal();
        debug!("pruned {pruned} finished orders");
        pruned
    }
}

impl<B: Backend> OrderEntry for BrokerClient<B> {
    fn issue_id(&self) -> Result<OrderId, BrokerError> {
        self.ensure_connected()?;
        self.backend.next_order_id()
    }

    fn place(&self, order: &TradeOrder) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        order.validate()?;
        // Tracked before the backend sees it so the first event finds it.
        let id = self.shared.tracker.register(order.clone())?;
        if let Err(e) = self.backend.place_order(order) {
            self.shared.tracker.forget(id);
            return Err(e);
        }
        Ok(())
    }
}

impl<B: Backend> Broker for BrokerClient<B> {
    fn connect(&self) -> Result<(), BrokerError> {
        let _transition = self.transitions.lock();
        if self.shared.connected.load(Ordering::SeqCst) {
            debug!("{}: already connected", self.backend.name());
            return Ok(());
        }
        self.backend.connect(self.hub.clone())?;
        {
            let mut processor = self.processor.lock();
            if !processor.is_running() {
                processor.start()?;
            }
        }
        self.start_time_sync()?;
        // Before `connected` is set, so no new subscription races the reopen.
        self.reopen_subscriptions();
        self.shared.connected.store(true, Ordering::SeqCst);
        info!("{}: connected to {}", self.backend.name(), self.config.address());
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BrokerError> {
        let (was_connected, workers, result) = {
            let _transition = self.transitions.lock();
            // Workers may outlive a lost connection, so they are stopped
            // either way.
            let was_connected = self.shared.connected.swap(false, Ordering::SeqCst);
            let workers = self.retire_workers();
            let result = if was_connected {
                self.backend.disconnect()
            } else {
                Ok(())
            };
            (was_connected, workers, result)
        };
        Self::join_workers(workers);
        if was_connected {
            info!("{}: disconnected", self.backend.name());
        } else {
            debug!("{}: already disconnected", self.backend.name());
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn acquire_lock(&self) -> Result<OrderIdGuard<'_>, BrokerError> {
        self.order_ids.acquire(self)
    }

    fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        if let Some(order) = self.shared.tracker.get(id) {
            if order.status().is_terminal() {
                debug!("cancel of order {id} ignored: already {}", order.status());
                return Ok(());
            }
        }
        self.backend.cancel_order(id)?;
        info!("cancel requested for order {id}");
        Ok(())
    }

    fn cancel_and_replace_order(
        &self,
        original: OrderId,
        replacement: TradeOrder,
    ) -> Result<OrderId, BrokerError> {
        self.cancel_order(original)?;
        let id = self.submit(replacement)?;
        info!("order {original} replaced by {id}");
        Ok(id)
    }

    fn request_order_status(&self, id: OrderId) -> Result<Option<TradeOrder>, BrokerError> {
        if let Some(order) = self.shared.tracker.get(id) {
            return Ok(Some(order));
        }
        self.ensure_connected()?;
        self.backend.order_status(id)
    }

    fn open_orders(&self) -> Result<Vec<TradeOrder>, BrokerError> {
        self.ensure_connected()?;
        let mut orders = self.shared.tracker.active();
        // The session's view wins for orders it placed.
        for order in self.backend.open_orders()? {
            match order.id() {
                Some(id) if self.shared.tracker.get(id).is_some() => {}
                _ => orders.push(order),
            }
        }
        orders.sort_by_key(TradeOrder::id);
        Ok(orders)
    }

    fn all_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected()?;
        self.backend.positions()
    }

    fn add_order_event_listener(&self, listener: Arc<dyn OrderEventListener>) -> ListenerId {
        self.shared.order_listeners.add(listener)
    }

    fn remove_order_event_listener(&self, id: ListenerId) -> bool {
        self.shared.order_listeners.remove(id)
    }

    fn add_broker_error_listener(&self, listener: Arc<dyn BrokerErrorListener>) -> ListenerId {
        self.shared.error_listeners.add(listener)
    }

    fn remove_broker_error_listener(&self, id: ListenerId) -> bool {
        self.shared.error_listeners.remove(id)
    }

    fn add_time_update_listener(&self, listener: Arc<dyn TimeUpdateListener>) -> ListenerId {
        self.shared.time_listeners.add(listener)
    }

    fn remove_time_update_listener(&self, id: ListenerId) -> bool {
        self.shared.time_listeners.remove(id)
    }

    fn subscribe_realtime_bars(
        &self,
        request: RealtimeBarRequest,
        listener: Arc<dyn RealtimeBarListener>,
    ) -> Result<ListenerId, BrokerError> {
        self.ensure_connected()?;
        self.shared
            .bars
            .subscribe(request, listener, |r| self.backend.subscribe_bars(r))
    }

    fn unsubscribe_realtime_bars(
        &self,
        request: &RealtimeBarRequest,
        id: ListenerId,
    ) -> Result<bool, BrokerError> {
        self.shared
            .bars
            .unsubscribe(request, id, |r| self.backend.unsubscribe_bars(r))
    }

    fn subscribe_quotes(
        &self,
        ticker: Ticker,
        listener: Arc<dyn QuoteListener>,
    ) -> Result<ListenerId, BrokerError> {
        self.ensure_connected()?;
        self.shared
            .quotes
            .subscribe(ticker, listener, |t| self.backend.subscribe_quotes(t))
    }

    fn unsubscribe_quotes(&self, ticker: &Ticker, id: ListenerId) -> Result<bool, BrokerError> {
        self.shared
            .quotes
            .unsubscribe(ticker, id, |t| self.backend.unsubscribe_quotes(t))
    }

    fn request_historical_data(
        &self,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<BarData>, BrokerError> {
        self.ensure_connected()?;
        request.validate()?;
        let mut bars = self
            .backend
            .historical_data(request)
            .map_err(|e| match e {
                BrokerError::HistoricalData(_) => e,
                other => BrokerError::HistoricalData(other.to_string()),
            })?;
        if !BarData::is_ascending(&bars) {
            BarData::sort_ascending(&mut bars);
        }
        info!("historical data {request}: {} bars", bars.len());
        Ok(bars)
    }

    fn current_time(&self) -> Result<Timestamp, BrokerError> {
        self.ensure_connected()?;
        self.backend.current_time()
    }
}

impl<B: Backend> Drop for BrokerClient<B> {
    fn drop(&mut self) {
        if self.shared.connected.load(Ordering::SeqCst) {
            warn!("{}: client dropped while connected", self.backend.name());
        }
        Self::join_workers(self.retire_workers());
    }
}

impl<B: Backend> std::fmt::Debug for BrokerClient<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("backend", &self.backend.name())
            .field("connected", &self.is_connected())
            .field("tracked_orders", &self.shared.tracker.len())
            .finish()
    }
}

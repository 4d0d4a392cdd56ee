//! The order-id critical section.
//!
//! Taking a fresh id and placing the order that carries it must happen
//! without another caller interleaving, or ids would reach the backend out
//! of order. [`OrderIdLock::acquire`] hands out an [`OrderIdGuard`]; while
//! it is alive every other caller blocks (or times out). The guard releases
//! on drop, so an early return or a panic cannot leave the lock held.

use std::fmt;
use std::time::Duration;

use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use tradelink::{OrderId, TradeOrder};

use crate::error::BrokerError;

/// What the guard needs from the session it belongs to.
pub(crate) trait OrderEntry: Send + Sync {
    /// Ask the backend for the next id.
    fn issue_id(&self) -> Result<OrderId, BrokerError>;
    /// Validate, track and send an order that already has its id.
    fn place(&self, order: &TradeOrder) -> Result<(), BrokerError>;
}

#[derive(Debug, Default)]
struct IdState {
    last_issued: Option<OrderId>,
    last_placed: Option<OrderId>,
}

/// Mutual exclusion around id issuance and order placement.
#[derive(Debug, Default)]
pub struct OrderIdLock {
    state: Mutex<IdState>,
    timeout: Option<Duration>,
}

impl OrderIdLock {
    /// A lock that waits forever.
    pub fn new() -> Self {
        Self::default()
    }

    /// A lock whose `acquire` gives up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(IdState::default()),
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Last id handed out, if any.
    pub fn last_issued(&self) -> Option<OrderId> {
        self.state.lock().last_issued
    }

    pub(crate) fn acquire<'a>(
        &'a self,
        session: &'a dyn OrderEntry,
    ) -> Result<OrderIdGuard<'a>, BrokerError> {
        let state = match self.timeout {
            Some(timeout) => self
                .state
                .try_lock_for(timeout)
                .ok_or(BrokerError::LockTimeout(timeout))?,
            None => self.state.lock(),
        };
        debug!("order-id lock acquired");
        Ok(OrderIdGuard { state, session })
    }
}

/// Exclusive right to issue ids and place orders.
///
/// Dropping the guard releases the lock.
pub struct OrderIdGuard<'a> {
    state: MutexGuard<'a, IdState>,
    session: &'a dyn OrderEntry,
}

impl OrderIdGuard<'_> {
    /// Take the next id from the backend.
    ///
    /// Fails with [`BrokerError::OrderIdRegression`] if the backend hands
    /// out an id that is not greater than the previous one.
    pub fn next_order_id(&mut self) -> Result<OrderId, BrokerError> {
        let issued = self.session.issue_id()?;
        if let Some(previous) = self.state.last_issued {
            if issued <= previous {
                return Err(BrokerError::OrderIdRegression { previous, issued });
            }
        }
        self.state.last_issued = Some(issued);
        Ok(issued)
    }

    /// Send an order whose id was taken from this lock.
    pub fn place_order(&mut self, order: &TradeOrder) -> Result<OrderId, BrokerError> {
        let id = order.id().ok_or(BrokerError::MissingOrderId)?;
        if let Some(previous) = self.state.last_placed {
            if id <= previous {
                return Err(BrokerError::OrderIdRegression {
                    previous,
                    issued: id,
                });
            }
        }
        self.session.place(order)?;
        self.state.last_placed = Some(id);
        info!("placed order {id}: {order}");
        Ok(id)
    }

    /// Assign the next id to `order` and place it.
    pub fn submit(&mut self, mut order: TradeOrder) -> Result<OrderId, BrokerError> {
        order.validate()?;
        let id = self.next_order_id()?;
        order.assign_id(id)?;
        self.place_order(&order)
    }

    /// Release the lock. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl fmt::Debug for OrderIdGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderIdGuard")
            .field("last_issued", &self.state.last_issued)
            .field("last_placed", &self.state.last_placed)
            .finish()
    }
}

impl Drop for OrderIdGuard<'_> {
    fn drop(&mut self) {
        debug!("order-id lock released");
    }
}

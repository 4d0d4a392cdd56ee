//! Trade orders and their lifecycle state machine

use std::fmt;

use crate::error::OrderError;
use crate::{OrderEvent, OrderId, Price, Quantity, Side, Ticker, TimeInForce, Timestamp};

/// Status of an order in its lifecycle.
///
/// ```text
/// NEW ──▶ SUBMITTED ──▶ PARTIALLY_FILLED ──▶ FILLED
///             │   │            │  ▲  │
///             │   │            └──┘  └──▶ CANCELLED
///             │   └──────────────────────▶ FILLED / CANCELLED
///             └──▶ REJECTED
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    /// Built locally, not yet acknowledged by the backend
    #[default]
    New,
    /// Acknowledged and working at the backend
    Submitted,
    /// Some quantity filled, remainder still working
    PartiallyFilled,
    /// Fully executed
    Filled,
    /// Cancellation confirmed by the backend
    Cancelled,
    /// Refused by the backend
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order is working at the backend and can still
    /// be filled or cancelled.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Submitted | OrderStatus::PartiallyFilled)
    }

    /// Returns true if the order is terminal (no further state changes).
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Whether an event may move an order from `self` to `next`.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (New, Submitted) => true,
            (Submitted | PartiallyFilled, PartiallyFilled | Filled | Cancelled) => true,
            (Submitted, Rejected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Market or limit order.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderType {
    Market,
    Limit { price: Price },
}

impl OrderType {
    #[inline]
    pub fn limit_price(self) -> Option<Price> {
        match self {
            OrderType::Market => None,
            OrderType::Limit { price } => Some(price),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit { price } => write!(f, "LIMIT {price}"),
        }
    }
}

/// A buy or sell instruction and its observed lifecycle.
///
/// The id is assigned exactly once, inside the broker's order-id critical
/// section. Status, filled quantity and average price change only through
/// [`TradeOrder::apply`], which the event dispatcher calls for each
/// [`OrderEvent`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawTradeOrder"))]
pub struct TradeOrder {
    id: Option<OrderId>,
    ticker: Ticker,
    side: Side,
    quantity: Quantity,
    order_type: OrderType,
    time_in_force: TimeInForce,
    reference: Option<String>,
    status: OrderStatus,
    filled_quantity: Quantity,
    avg_fill_price: Price,
    last_update: Option<Timestamp>,
}

impl TradeOrder {
    /// Create an order in status `New` with no id.
    pub fn new(ticker: Ticker, side: Side, quantity: Quantity, order_type: OrderType) -> Self {
        Self {
            id: None,
            ticker,
            side,
            quantity,
            order_type,
            time_in_force: TimeInForce::default(),
            reference: None,
            status: OrderStatus::New,
            filled_quantity: 0,
            avg_fill_price: 0.0,
            last_update: None,
        }
    }

    pub fn market(ticker: Ticker, side: Side, quantity: Quantity) -> Self {
        Self::new(ticker, side, quantity, OrderType::Market)
    }

    pub fn limit(ticker: Ticker, side: Side, quantity: Quantity, price: Price) -> Self {
        Self::new(ticker, side, quantity, OrderType::Limit { price })
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    /// Attach a free-form tag (strategy name, client reference...).
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Check the order is well-formed before it is sent to a backend.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity == 0 {
            return Err(OrderError::ZeroQuantity);
        }
        if i64::try_from(self.quantity).is_err() {
            return Err(OrderError::QuantityTooLarge(self.quantity));
        }
        if let OrderType::Limit { price } = self.order_type {
            if !price.is_finite() || price <= 0.0 {
                return Err(OrderError::InvalidLimitPrice);
            }
        }
        Ok(())
    }

    /// Assign the backend-issued id. Fails if an id was already assigned.
    pub fn assign_id(&mut self, id: OrderId) -> Result<(), OrderError> {
        if let Some(existing) = self.id {
            return Err(OrderError::IdAlreadyAssigned(existing));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Apply one event to this order.
    ///
    /// The order is left untouched if the event is for another order, is
    /// not an admissible transition from the current status, or carries a
    /// fill inconsistent with the reported status.
    pub fn apply(&mut self, event: &OrderEvent) -> Result<(), OrderError> {
        if self.id != Some(event.order_id) {
            return Err(OrderError::WrongOrder {
                order: self.id,
                event: event.order_id,
            });
        }
        if !self.status.can_transition_to(event.status) {
            return Err(OrderError::IllegalTransition {
                id: event.order_id,
                from: self.status,
                to: event.status,
            });
        }

        let (filled, avg) = match event.fill {
            Some(fill) => {
                let remaining = self.remaining();
                if fill.quantity > remaining {
                    return Err(OrderError::Overfill {
                        id: event.order_id,
                        fill: fill.quantity,
                        remaining,
                    });
                }
                let filled = self.filled_quantity + fill.quantity;
                let notional = self.avg_fill_price * self.filled_quantity as f64
                    + fill.price * fill.quantity as f64;
                let avg = if filled == 0 {
                    0.0
                } else {
                    notional / filled as f64
                };
                (filled, avg)
            }
            None => (self.filled_quantity, self.avg_fill_price),
        };

        let consistent = match event.status {
            OrderStatus::Filled => filled == self.quantity,
            OrderStatus::PartiallyFilled => filled > 0 && filled < self.quantity,
            _ => event.fill.is_none(),
        };
        if !consistent {
            return Err(OrderError::InconsistentFill {
                id: event.order_id,
                status: event.status,
                filled,
                quantity: self.quantity,
            });
        }

        self.status = event.status;
        self.filled_quantity = filled;
        self.avg_fill_price = avg;
        self.last_update = Some(event.timestamp);
        Ok(())
    }

    #[inline]
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    #[inline]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Unsigned order size.
    #[inline]
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    #[inline]
    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    #[inline]
    pub fn limit_price(&self) -> Option<Price> {
        self.order_type.limit_price()
    }

    #[inline]
    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    #[inline]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    #[inline]
    pub fn filled_quantity(&self) -> Quantity {
        self.filled_quantity
    }

    #[inline]
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Volume-weighted average fill price; 0.0 before the first fill.
    #[inline]
    pub fn avg_fill_price(&self) -> Price {
        self.avg_fill_price
    }

    /// Timestamp of the last applied event.
    #[inline]
    pub fn last_update(&self) -> Option<Timestamp> {
        self.last_update
    }
}

/// Wire form of a [`TradeOrder`], checked before it becomes one.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawTradeOrder {
    id: Option<OrderId>,
    ticker: Ticker,
    side: Side,
    quantity: Quantity,
    order_type: OrderType,
    time_in_force: TimeInForce,
    reference: Option<String>,
    status: OrderStatus,
    filled_quantity: Quantity,
    avg_fill_price: Price,
    last_update: Option<Timestamp>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawTradeOrder> for TradeOrder {
    type Error = OrderError;

    fn try_from(raw: RawTradeOrder) -> Result<Self, Self::Error> {
        let order = TradeOrder {
            id: raw.id,
            ticker: raw.ticker,
            side: raw.side,
            quantity: raw.quantity,
            order_type: raw.order_type,
            time_in_force: raw.time_in_force,
            reference: raw.reference,
            status: raw.status,
            filled_quantity: raw.filled_quantity,
            avg_fill_price: raw.avg_fill_price,
            last_update: raw.last_update,
        };
        order.validate()?;
        order.check_state()?;
        Ok(order)
    }
}

impl TradeOrder {
    /// Status, id and fill totals must describe a state reachable through
    /// [`TradeOrder::apply`].
    #[cfg_attr(not(feature = "serde"), allow(dead_code))]
    fn check_state(&self) -> Result<(), OrderError> {
        if self.filled_quantity > self.quantity {
            return Err(OrderError::InconsistentState(
                "filled quantity exceeds order quantity",
            ));
        }
        if self.id.is_none() && self.status != OrderStatus::New {
            return Err(OrderError::InconsistentState(
                "only a new order may lack an id",
            ));
        }
        let filled = self.filled_quantity;
        let consistent = match self.status {
            OrderStatus::New | OrderStatus::Submitted | OrderStatus::Rejected => filled == 0,
            OrderStatus::PartiallyFilled => filled > 0 && filled < self.quantity,
            OrderStatus::Filled => filled == self.quantity,
            OrderStatus::Cancelled => filled < self.quantity,
        };
        if !consistent {
            return Err(OrderError::InconsistentState(
                "filled quantity does not match status",
            ));
        }
        if !self.avg_fill_price.is_finite() || self.avg_fill_price < 0.0 {
            return Err(OrderError::InconsistentState(
                "average fill price must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for TradeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} [{}]",
            self.side, self.quantity, self.ticker, self.order_type, self.time_in_force, self.status
        )
    }
}

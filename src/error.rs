//! Errors raised while building instruments and applying order events.

use std::fmt;

use crate::{OrderId, OrderStatus, Quantity};

/// A venue code that is not in the exchange registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownExchangeError {
    pub code: String,
}

impl fmt::Display for UnknownExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown exchange: {:?}", self.code)
    }
}

impl std::error::Error for UnknownExchangeError {}

/// Validation failures from the ticker constructors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TickerError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("quote currency must not be empty")]
    EmptyCurrency,

    #[error("expiry month {0} is outside 1..=12")]
    InvalidExpiryMonth(u32),

    #[error("contract multiplier must be greater than zero")]
    ZeroMultiplier,

    #[error("combo needs at least two legs, got {0}")]
    TooFewLegs(usize),

    #[error("combo leg ratio must be greater than zero")]
    ZeroRatio,

    #[error("combo legs cannot themselves be combos")]
    NestedCombo,
}

/// Failures while assigning ids to or applying events on a [`TradeOrder`](crate::TradeOrder).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("order already has id {0}")]
    IdAlreadyAssigned(OrderId),

    #[error("event for order {event} applied to order {order:?}")]
    WrongOrder { order: Option<OrderId>, event: OrderId },

    #[error("order {id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order {id}: fill of {fill} exceeds remaining {remaining}")]
    Overfill {
        id: OrderId,
        fill: Quantity,
        remaining: Quantity,
    },

    #[error("order {id}: {status} event leaves {filled} of {quantity} filled")]
    InconsistentFill {
        id: OrderId,
        status: OrderStatus,
        filled: Quantity,
        quantity: Quantity,
    },

    #[error("quantity must be greater than zero")]
    ZeroQuantity,

    #[error("quantity {0} exceeds the signed position range")]
    QuantityTooLarge(Quantity),

    #[error("inconsistent order state: {0}")]
    InconsistentState(&'static str),

    #[error("limit price must be positive and finite")]
    InvalidLimitPrice,
}

/// A fill that a [`Position`](crate::Position) cannot absorb.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("fill of {quantity} overflows the position in {ticker}")]
    Overflow { ticker: String, quantity: Quantity },
}

//! Order events: asynchronous status transitions reported by a backend.
//!
//! Each event names one admissible transition of the order state machine.
//! Fill events carry the quantity and price of *that* execution, not the
//! cumulative totals; the order accumulates them.

use crate::{OrderId, OrderStatus, Price, Quantity, Timestamp};

/// Quantity and price of a single execution.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fill {
    pub quantity: Quantity,
    pub price: Price,
}

/// Notification that an order moved to `status`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub fill: Option<Fill>,
    pub timestamp: Timestamp,
    /// Backend text, e.g. the reason for a rejection.
    pub message: Option<String>,
}

impl OrderEvent {
    fn bare(order_id: OrderId, status: OrderStatus, timestamp: Timestamp) -> Self {
        Self {
            order_id,
            status,
            fill: None,
            timestamp,
            message: None,
        }
    }

    /// The backend acknowledged the order.
    pub fn submitted(order_id: OrderId, timestamp: Timestamp) -> Self {
        Self::bare(order_id, OrderStatus::Submitted, timestamp)
    }

    /// An execution that leaves part of the order working.
    pub fn partially_filled(
        order_id: OrderId,
        quantity: Quantity,
        price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            fill: Some(Fill { quantity, price }),
            ..Self::bare(order_id, OrderStatus::PartiallyFilled, timestamp)
        }
    }

    /// The execution that completes the order.
    pub fn filled(order_id: OrderId, quantity: Quantity, price: Price, timestamp: Timestamp) -> Self {
        Self {
            fill: Some(Fill { quantity, price }),
            ..Self::bare(order_id, OrderStatus::Filled, timestamp)
        }
    }

    /// Cancellation confirmed.
    pub fn cancelled(order_id: OrderId, timestamp: Timestamp) -> Self {
        Self::bare(order_id, OrderStatus::Cancelled, timestamp)
    }

    /// The backend refused the order.
    pub fn rejected(order_id: OrderId, reason: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::bare(order_id, OrderStatus::Rejected, timestamp)
        }
    }

    /// Returns true if this event reports an execution.
    #[inline]
    pub fn is_fill(&self) -> bool {
        self.fill.is_some()
    }
}

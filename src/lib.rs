//! # tradelink
//!
//! Vendor-neutral value types shared by strategies and broker backends.
//!
//! A strategy that speaks these types can trade through any backend adapter
//! (a futures/FX broker, a crypto exchange) without knowing its wire format.
//! The concurrency layer (order-id locking, event dispatch, market-data
//! subscriptions) lives in the `tradelink-broker` crate; this crate holds
//! only immutable identifiers and plain data.
//!
//! ## Instruments
//!
//! ```
//! use tradelink::{Exchange, Ticker};
//!
//! let eur = Ticker::currency("EUR", "USD", Exchange::IDEALPRO).unwrap();
//! let crude = Ticker::futures("CL", Exchange::NYMEX, 4, 2016)
//!     .unwrap()
//!     .with_multiplier(1000)
//!     .unwrap();
//!
//! assert_eq!(Exchange::resolve("IDEALPRO").unwrap(), Exchange::IDEALPRO);
//! assert_eq!(crude.multiplier(), 1000);
//! assert_ne!(eur, crude);
//! ```
//!
//! ## Order lifecycle
//!
//! Orders only move forward through their state machine. Events that would
//! regress an order, or touch one that already reached a terminal state,
//! are refused:
//!
//! ```
//! use chrono::Utc;
//! use tradelink::{Exchange, OrderEvent, OrderId, OrderStatus, Side, Ticker, TradeOrder};
//!
//! let qqq = Ticker::equity("QQQ", Exchange::NASDAQ).unwrap();
//! let mut order = TradeOrder::limit(qqq, Side::Buy, 100, 350.25);
//! order.assign_id(OrderId(7)).unwrap();
//!
//! order.apply(&OrderEvent::submitted(OrderId(7), Utc::now())).unwrap();
//! order.apply(&OrderEvent::filled(OrderId(7), 100, 350.20, Utc::now())).unwrap();
//! assert_eq!(order.status(), OrderStatus::Filled);
//!
//! assert!(order.apply(&OrderEvent::cancelled(OrderId(7), Utc::now())).is_err());
//! ```

mod bar;
mod error;
mod event;
mod exchange;
mod order;
mod position;
mod quote;
mod side;
mod ticker;
mod tif;
mod types;

pub use bar::{BarData, BarUnit, DataField, RealtimeBarRequest};
pub use error::{OrderError, PositionError, TickerError, UnknownExchangeError};
pub use event::{Fill, OrderEvent};
pub use exchange::Exchange;
pub use order::{OrderStatus, OrderType, TradeOrder};
pub use position::{Position, PositionBook};
pub use quote::{Quote, QuoteKind};
pub use side::Side;
pub use ticker::{ComboLeg, InstrumentKind, Ticker};
pub use tif::TimeInForce;
pub use types::{OrderId, Price, Quantity, Timestamp};

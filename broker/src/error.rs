//! Broker error types.

use std::path::PathBuf;
use std::time::Duration;

use tradelink::{OrderError, OrderId, PositionError, TickerError, UnknownExchangeError};

/// Errors that can occur during broker operations.
///
/// Direct calls return these synchronously. Failures that arise from
/// asynchronous backend activity (event delivery, listener callbacks,
/// dropped connections) are handed to broker-error listeners instead.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    UnknownExchange(#[from] UnknownExchangeError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,

    #[error("order {id} rejected: {reason}")]
    OrderRejected { id: OrderId, reason: String },

    #[error("order-id lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("historical data request failed: {0}")]
    HistoricalData(String),

    #[error("{listener} listener failed: {message}")]
    ListenerFailure { listener: String, message: String },

    #[error("invalid ticker: {0}")]
    InvalidTicker(#[from] TickerError),

    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("order id {issued} does not follow {previous}")]
    OrderIdRegression { previous: OrderId, issued: OrderId },

    #[error("order has no id; take one from the order-id lock first")]
    MissingOrderId,

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("order event processor is already running")]
    ProcessorRunning,

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BrokerError>;

//! Time-in-force: how long a working order stays live at the broker

use std::fmt;

/// Time-in-force instruction forwarded to the backend with each order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum TimeInForce {
    /// Expires at the end of the trading session.
    #[default]
    Day,

    /// Good-til-cancelled: works across sessions until filled or cancelled.
    Gtc,

    /// Immediate-or-cancel: whatever does not fill at once is cancelled.
    Ioc,

    /// Fill-or-kill: fill the whole quantity at once or cancel it all.
    Fok,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Day => write!(f, "DAY"),
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

//! Core scalar types: Price, Quantity, Timestamp, OrderId

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// Price in the instrument's quote currency.
///
/// Backends quote FX to five decimals and crypto to arbitrary precision, so
/// prices are carried as `f64` and never used as map keys.
pub type Price = f64;

/// Order quantity in shares, contracts or currency units. Always positive;
/// direction is carried by [`Side`](crate::Side).
pub type Quantity = u64;

/// Wall-clock instant as reported by the broker.
pub type Timestamp = DateTime<Utc>;

/// Backend-issued order identifier.
///
/// Ids handed out under the order-id lock are strictly increasing for the
/// lifetime of one broker session, so the derived ordering is meaningful.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(OrderId)
    }
}

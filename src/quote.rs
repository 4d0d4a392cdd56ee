//! Level-1 quote ticks.

use std::fmt;

use crate::{Ticker, Timestamp};

/// Which top-of-book field a quote tick updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum QuoteKind {
    Bid,
    Ask,
    Last,
    BidSize,
    AskSize,
    LastSize,
    Volume,
    Open,
    Close,
}

impl QuoteKind {
    /// Sizes and volume are quantities; everything else is a price.
    #[inline]
    pub fn is_size(self) -> bool {
        matches!(
            self,
            QuoteKind::BidSize | QuoteKind::AskSize | QuoteKind::LastSize | QuoteKind::Volume
        )
    }
}

/// A single level-1 update for one instrument.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quote {
    pub ticker: Ticker,
    pub kind: QuoteKind,
    pub value: f64,
    pub timestamp: Timestamp,
}

impl Quote {
    pub fn new(ticker: Ticker, kind: QuoteKind, value: f64, timestamp: Timestamp) -> Self {
        Self {
            ticker,
            kind,
            value,
            timestamp,
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}={}", self.ticker, self.kind, self.value)
    }
}

//! Price bars and the keys used to request them.

use std::fmt;

use chrono::{Duration, Months};

use crate::{Price, Ticker, Timestamp};

/// Unit of a bar length or of a historical request duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum BarUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl BarUnit {
    /// The instant `count` units before `end`, or `None` on calendar overflow.
    ///
    /// Months and years step by calendar months, the rest by fixed durations.
    pub fn before(self, end: Timestamp, count: u32) -> Option<Timestamp> {
        let n = i64::from(count);
        match self {
            BarUnit::Second => end.checked_sub_signed(Duration::seconds(n)),
            BarUnit::Minute => end.checked_sub_signed(Duration::minutes(n)),
            BarUnit::Hour => end.checked_sub_signed(Duration::hours(n)),
            BarUnit::Day => end.checked_sub_signed(Duration::days(n)),
            BarUnit::Week => end.checked_sub_signed(Duration::weeks(n)),
            BarUnit::Month => end.checked_sub_months(Months::new(count)),
            BarUnit::Year => end.checked_sub_months(Months::new(count.checked_mul(12)?)),
        }
    }
}

impl fmt::Display for BarUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BarUnit::Second => "SECOND",
            BarUnit::Minute => "MINUTE",
            BarUnit::Hour => "HOUR",
            BarUnit::Day => "DAY",
            BarUnit::Week => "WEEK",
            BarUnit::Month => "MONTH",
            BarUnit::Year => "YEAR",
        };
        f.write_str(s)
    }
}

/// Which price series a bar is built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DataField {
    #[default]
    Trades,
    Midpoint,
    Bid,
    Ask,
    BidAsk,
    HistoricalVolatility,
    OptionImpliedVolatility,
}

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BarData {
    /// Start of the bar period
    pub timestamp: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: f64,
    /// Bar length, in `unit`s
    pub length: u32,
    pub unit: BarUnit,
}

impl BarData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: f64,
        length: u32,
        unit: BarUnit,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            length,
            unit,
        }
    }

    /// High is the maximum and low the minimum of the four prices.
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.low <= self.high
    }

    /// Stable sort by timestamp, ascending.
    pub fn sort_ascending(bars: &mut [BarData]) {
        bars.sort_by_key(|bar| bar.timestamp);
    }

    /// Returns true if timestamps never decrease.
    pub fn is_ascending(bars: &[BarData]) -> bool {
        bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }
}

/// Subscription key for streaming bars: one backend subscription is shared
/// by every listener registered under an equal key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealtimeBarRequest {
    pub ticker: Ticker,
    pub bar_size: u32,
    pub unit: BarUnit,
    pub field: DataField,
}

impl RealtimeBarRequest {
    pub fn new(ticker: Ticker, bar_size: u32, unit: BarUnit, field: DataField) -> Self {
        Self {
            ticker,
            bar_size,
            unit,
            field,
        }
    }
}

impl fmt::Display for RealtimeBarRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:?}",
            self.ticker, self.bar_size, self.unit, self.field
        )
    }
}

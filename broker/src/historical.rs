//! Historical bar requests.

use std::fmt;

use tradelink::{BarUnit, DataField, Ticker, Timestamp};

use crate::error::BrokerError;

/// Bars for `ticker` covering `duration` `duration_unit`s up to `end`, in
/// bars of `bar_size` `bar_size_unit`s.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalDataRequest {
    pub ticker: Ticker,
    pub end: Timestamp,
    pub duration: u32,
    pub duration_unit: BarUnit,
    pub bar_size: u32,
    pub bar_size_unit: BarUnit,
    pub field: DataField,
    /// Restrict to regular trading hours
    pub regular_hours_only: bool,
}

impl HistoricalDataRequest {
    pub fn new(
        ticker: Ticker,
        end: Timestamp,
        duration: u32,
        duration_unit: BarUnit,
        bar_size: u32,
        bar_size_unit: BarUnit,
        field: DataField,
    ) -> Self {
        Self {
            ticker,
            end,
            duration,
            duration_unit,
            bar_size,
            bar_size_unit,
            field,
            regular_hours_only: false,
        }
    }

    pub fn regular_hours_only(mut self, yes: bool) -> Self {
        self.regular_hours_only = yes;
        self
    }

    /// Start of the requested window, or `None` if it underflows the calendar.
    pub fn start(&self) -> Option<Timestamp> {
        self.duration_unit.before(self.end, self.duration)
    }

    /// Returns true if `ts` lies inside `[start, end]`.
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start().is_some_and(|start| start <= ts && ts <= self.end)
    }

    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.duration == 0 {
            return Err(BrokerError::InvalidRequest("duration must be positive".into()));
        }
        if self.bar_size == 0 {
            return Err(BrokerError::InvalidRequest("bar size must be positive".into()));
        }
        if self.start().is_none() {
            return Err(BrokerError::InvalidRequest(format!(
                "{} {} before {} is out of range",
                self.duration, self.duration_unit, self.end
            )));
        }
        Ok(())
    }
}

impl fmt::Display for HistoricalDataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} to {} by {} {} {:?}",
            self.ticker,
            self.duration,
            self.duration_unit,
            self.end.format("%Y-%m-%d %H:%M:%S"),
            self.bar_size,
            self.bar_size_unit,
            self.field
        )
    }
}

//! Net holdings derived from fills.

use rustc_hash::FxHashMap;

use crate::error::PositionError;
use crate::{Fill, Price, Side, Ticker};

/// A position in a single instrument.
///
/// Tracks quantity (positive = long, negative = short) and the average fill
/// price of the open quantity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// Instrument this position is for
    pub ticker: Ticker,
    /// Net quantity: positive = long, negative = short, zero = flat
    pub quantity: i64,
    /// Volume-weighted average fill price of the open quantity
    pub avg_fill_price: Price,
}

impl Position {
    /// Create a new flat position for the given instrument.
    pub fn new(ticker: Ticker) -> Self {
        Self::reported(ticker, 0, 0.0)
    }

    /// A position as reported by a backend (no fill history).
    pub fn reported(ticker: Ticker, quantity: i64, avg_fill_price: Price) -> Self {
        Self {
            ticker,
            quantity,
            avg_fill_price,
        }
    }

    /// Apply a fill to this position.
    ///
    /// `qty` is signed: positive = buy, negative = sell. Adding to the
    /// position moves the average price (VWAP); reducing it keeps the
    /// entry price; flipping it starts over at `price`. A fill that would
    /// overflow the net quantity leaves the position unchanged.
    pub fn apply_fill(&mut self, qty: i64, price: Price) -> Result<(), PositionError> {
        let net = self
            .quantity
            .checked_add(qty)
            .ok_or_else(|| PositionError::Overflow {
                ticker: self.ticker.to_string(),
                quantity: qty.unsigned_abs(),
            })?;
        if qty == 0 {
            return Ok(());
        }

        let same_direction = (self.quantity > 0) == (qty > 0);
        if self.quantity == 0 {
            self.avg_fill_price = price;
        } else if same_direction {
            let cost = self.avg_fill_price * self.quantity as f64 + price * qty as f64;
            self.avg_fill_price = cost / net as f64;
        } else if net == 0 {
            self.avg_fill_price = 0.0;
        } else if (net > 0) != (self.quantity > 0) {
            self.avg_fill_price = price;
        }
        self.quantity = net;
        Ok(())
    }

    /// Returns true if the position is flat (zero quantity).
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}

/// Positions keyed by instrument, built by aggregating fills.
#[derive(Clone, Debug, Default)]
pub struct PositionBook {
    positions: FxHashMap<Ticker, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution of an order on `ticker` in direction `side`.
    ///
    /// Fails, leaving the book unchanged, if the fill does not fit the
    /// signed position range.
    pub fn record_fill(
        &mut self,
        ticker: &Ticker,
        side: Side,
        fill: Fill,
    ) -> Result<(), PositionError> {
        let magnitude = i64::try_from(fill.quantity).map_err(|_| PositionError::Overflow {
            ticker: ticker.to_string(),
            quantity: fill.quantity,
        })?;
        self.positions
            .entry(ticker.clone())
            .or_insert_with(|| Position::new(ticker.clone()))
            .apply_fill(side.sign() * magnitude, fill.price)
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&Position> {
        self.positions.get(ticker)
    }

    /// Net quantity for `ticker`, zero if never traded.
    pub fn quantity(&self, ticker: &Ticker) -> i64 {
        self.positions.get(ticker).map_or(0, |p| p.quantity)
    }

    /// Positions that are currently not flat.
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions
            .values()
            .filter(|p| !p.is_flat())
            .cloned()
            .collect()
    }

    /// Every instrument ever traded, including flat ones.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

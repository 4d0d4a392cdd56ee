//! Tradable instruments: equities, currency pairs, futures and combos.
//!
//! A [`Ticker`] carries the attributes every instrument shares (symbol,
//! venue, contract multiplier) plus an [`InstrumentKind`] tag with the
//! per-variant fields. Equality and hashing cover the full attribute set, so
//! two futures that differ only in expiry are different instruments.

use std::fmt;

use crate::error::TickerError;
use crate::Exchange;

/// Variant-specific attributes of a [`Ticker`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstrumentKind {
    Equity,
    Currency {
        quote_currency: String,
    },
    Futures {
        expiry_month: u32,
        expiry_year: i32,
    },
    Combo {
        legs: Vec<ComboLeg>,
    },
}

/// One constituent of a combo, traded `ratio` units per combo unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComboLeg {
    pub ticker: Ticker,
    pub ratio: u32,
}

impl ComboLeg {
    pub fn new(ticker: Ticker, ratio: u32) -> Self {
        Self { ticker, ratio }
    }
}

/// Identifier of a tradable instrument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawTicker"))]
pub struct Ticker {
    symbol: String,
    exchange: Exchange,
    multiplier: u32,
    kind: InstrumentKind,
}

/// Wire form of a [`Ticker`]; rebuilt through the constructors so a
/// decoded ticker obeys the same rules as one built in code. A combo's
/// symbol and venue are derived from its legs.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawTicker {
    symbol: String,
    exchange: Exchange,
    multiplier: u32,
    kind: InstrumentKind,
}

#[cfg(feature = "serde")]
impl TryFrom<RawTicker> for Ticker {
    type Error = TickerError;

    fn try_from(raw: RawTicker) -> Result<Self, Self::Error> {
        let ticker = match raw.kind {
            InstrumentKind::Equity => Ticker::equity(raw.symbol, raw.exchange)?,
            InstrumentKind::Currency { quote_currency } => {
                Ticker::currency(raw.symbol, quote_currency, raw.exchange)?
            }
            InstrumentKind::Futures {
                expiry_month,
                expiry_year,
            } => Ticker::futures(raw.symbol, raw.exchange, expiry_month, expiry_year)?,
            InstrumentKind::Combo { legs } => Ticker::combo(legs)?,
        };
        ticker.with_multiplier(raw.multiplier)
    }
}

fn checked_symbol(symbol: String) -> Result<String, TickerError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(TickerError::EmptySymbol);
    }
    if trimmed.len() == symbol.len() {
        Ok(symbol)
    } else {
        Ok(trimmed.to_string())
    }
}

impl Ticker {
    /// A stock or ETF.
    pub fn equity(symbol: impl Into<String>, exchange: Exchange) -> Result<Self, TickerError> {
        Ok(Self {
            symbol: checked_symbol(symbol.into())?,
            exchange,
            multiplier: 1,
            kind: InstrumentKind::Equity,
        })
    }

    /// A currency pair: `symbol` is the base currency, e.g. `EUR` in EUR.USD.
    pub fn currency(
        symbol: impl Into<String>,
        quote_currency: impl Into<String>,
        exchange: Exchange,
    ) -> Result<Self, TickerError> {
        let quote_currency = quote_currency.into().trim().to_string();
        if quote_currency.is_empty() {
            return Err(TickerError::EmptyCurrency);
        }
        Ok(Self {
            symbol: checked_symbol(symbol.into())?,
            exchange,
            multiplier: 1,
            kind: InstrumentKind::Currency { quote_currency },
        })
    }

    /// A futures contract expiring in `expiry_month` (1-12) of `expiry_year`.
    pub fn futures(
        symbol: impl Into<String>,
        exchange: Exchange,
        expiry_month: u32,
        expiry_year: i32,
    ) -> Result<Self, TickerError> {
        if !(1..=12).contains(&expiry_month) {
            return Err(TickerError::InvalidExpiryMonth(expiry_month));
        }
        Ok(Self {
            symbol: checked_symbol(symbol.into())?,
            exchange,
            multiplier: 1,
            kind: InstrumentKind::Futures {
                expiry_month,
                expiry_year,
            },
        })
    }

    /// A combo of two or more legs.
    ///
    /// The combo's symbol joins the leg symbols with `/`, its venue is the
    /// first leg's venue. Legs must be non-combo instruments with a
    /// positive ratio.
    pub fn combo(legs: Vec<ComboLeg>) -> Result<Self, TickerError> {
        if legs.len() < 2 {
            return Err(TickerError::TooFewLegs(legs.len()));
        }
        if legs.iter().any(|leg| leg.ratio == 0) {
            return Err(TickerError::ZeroRatio);
        }
        if legs.iter().any(|leg| leg.ticker.is_combo()) {
            return Err(TickerError::NestedCombo);
        }
        let symbol = legs
            .iter()
            .map(|leg| leg.ticker.symbol.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let exchange = legs[0].ticker.exchange;
        Ok(Self {
            symbol,
            exchange,
            multiplier: 1,
            kind: InstrumentKind::Combo { legs },
        })
    }

    /// Two-leg combo with explicit ratios.
    pub fn pair(
        first: Ticker,
        first_ratio: u32,
        second: Ticker,
        second_ratio: u32,
    ) -> Result<Self, TickerError> {
        Self::combo(vec![
            ComboLeg::new(first, first_ratio),
            ComboLeg::new(second, second_ratio),
        ])
    }

    /// Set the contract multiplier (defaults to 1).
    pub fn with_multiplier(mut self, multiplier: u32) -> Result<Self, TickerError> {
        if multiplier == 0 {
            return Err(TickerError::ZeroMultiplier);
        }
        self.multiplier = multiplier;
        Ok(self)
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    #[inline]
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    #[inline]
    pub fn kind(&self) -> &InstrumentKind {
        &self.kind
    }

    #[inline]
    pub fn is_combo(&self) -> bool {
        matches!(self.kind, InstrumentKind::Combo { .. })
    }

    /// Combo legs; empty for single instruments.
    pub fn legs(&self) -> &[ComboLeg] {
        match &self.kind {
            InstrumentKind::Combo { legs } => legs,
            _ => &[],
        }
    }

    pub fn quote_currency(&self) -> Option<&str> {
        match &self.kind {
            InstrumentKind::Currency { quote_currency } => Some(quote_currency),
            _ => None,
        }
    }

    /// `(month, year)` for futures.
    pub fn expiry(&self) -> Option<(u32, i32)> {
        match self.kind {
            InstrumentKind::Futures {
                expiry_month,
                expiry_year,
            } => Some((expiry_month, expiry_year)),
            _ => None,
        }
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstrumentKind::Equity => write!(f, "{}@{}", self.symbol, self.exchange),
            InstrumentKind::Currency { quote_currency } => {
                write!(f, "{}.{}@{}", self.symbol, quote_currency, self.exchange)
            }
            InstrumentKind::Futures {
                expiry_month,
                expiry_year,
            } => write!(
                f,
                "{} {}-{:02}@{}",
                self.symbol, expiry_year, expiry_month, self.exchange
            ),
            InstrumentKind::Combo { legs } => {
                write!(f, "[")?;
                for (i, leg) in legs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}x {}", leg.ratio, leg.ticker)?;
                }
                write!(f, "]")
            }
        }
    }
}

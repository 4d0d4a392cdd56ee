//! Exchange registry: the closed set of venue codes adapters emit and accept.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::error::UnknownExchangeError;

/// A trading venue, identified by its canonical wire code.
///
/// Values can only be obtained from the associated constants or through
/// [`Exchange::resolve`], so every `Exchange` in existence is registered.
/// Equality and hashing are by code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(into = "String")
)]
pub struct Exchange {
    code: &'static str,
}

macro_rules! exchanges {
    ($($name:ident => $code:literal),+ $(,)?) => {
        impl Exchange {
            $(pub const $name: Exchange = Exchange { code: $code };)+
        }

        /// Registration order. `Exchange::all` returns exactly this slice.
        const REGISTERED: &[Exchange] = &[$(Exchange::$name),+];
    };
}

exchanges! {
    ARCA => "ARCA",
    GLOBEX => "GLOBEX",
    NYMEX => "NYMEX",
    CBOE => "CBOE",
    ECBOT => "ECBOT",
    NYBOT => "NYBOT",
    CFE => "CFE",
    NYSE_LIFFE => "NYSELIFFE",
    IDEALPRO => "IDEALPRO",
    PSE => "PSE",
    SMART => "SMART",
    NASDAQ => "NASDAQ",
    TSEJ => "TSEJ",
    SEHKNTL => "SEHKNTL",
    SEHK => "SEHK",
    HKFE => "HKFE",
    OSE => "OSE.JPN",
    SGX => "SGX",
    BOX => "BOX",
    ACE => "ACE",
    AEB => "AEB",
    AMEX => "AMEX",
    ASX => "ASX",
    BELFOX => "BELFOX",
    BRUT => "BRUT",
    BTRADE => "BTRADE",
    BVME => "BVME",
    DTB => "DTB",
    EOE => "EOE",
    IBIS => "IBIS",
    IDEAL => "IDEAL",
    IDEM => "IDEM",
    INSTINET => "INSTINET",
    ISE => "ISE",
    ISLAND => "ISLAND",
    LIFFE => "LIFFE",
    LSE => "LSE",
    MATIF => "MATIF",
    MEFFRV => "MEFFRV",
    MONEP => "MONEP",
    MXT => "MXT",
    NYSE => "NYSE",
    OMLX => "OMLX",
    OMS => "OMS",
    PHLX => "PHLX",
    RDBK => "RDBK",
    SFB => "SFB",
    SNFE => "SNFE",
    SOFFEX => "SOFFEX",
    VIRTX => "VIRTX",
    VWAP => "VWAP",
    ZSE => "ZSE",
    BITMEX => "BITMEX",
}

fn index() -> &'static FxHashMap<&'static str, Exchange> {
    static INDEX: OnceLock<FxHashMap<&'static str, Exchange>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map = FxHashMap::default();
        for exchange in REGISTERED {
            map.entry(exchange.code).or_insert(*exchange);
        }
        map
    })
}

impl Exchange {
    /// Look up a venue by its canonical code. Matching is exact (case-sensitive).
    pub fn resolve(code: &str) -> Result<Exchange, UnknownExchangeError> {
        index()
            .get(code)
            .copied()
            .ok_or_else(|| UnknownExchangeError {
                code: code.to_string(),
            })
    }

    /// Every registered venue, in registration order.
    #[inline]
    pub fn all() -> &'static [Exchange] {
        REGISTERED
    }

    /// The canonical wire code, e.g. `"IDEALPRO"`.
    #[inline]
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exchange({})", self.code)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl FromStr for Exchange {
    type Err = UnknownExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Exchange::resolve(s)
    }
}

impl TryFrom<String> for Exchange {
    type Error = UnknownExchangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Exchange::resolve(&value)
    }
}

impl From<Exchange> for String {
    fn from(exchange: Exchange) -> Self {
        exchange.code.to_string()
    }
}

// Hand-written: a derive would tie the `&'static str` code to `'de`.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Exchange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Exchange::resolve(&code).map_err(serde::de::Error::custom)
    }
}

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::enums::CurrencyType;

/// An ISO-style currency with a display precision.
///
/// Equality and hashing consider only the code: two `USD` values are the
/// same currency regardless of how they were constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    code: String,
    precision: u32,
    kind: CurrencyType,
}

impl Currency {
    pub fn new(code: impl Into<String>, precision: u32, kind: CurrencyType) -> Self {
        let code = code.into();
        assert!(!code.is_empty(), "currency code must be non-empty");
        Self { code, precision, kind }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn kind(&self) -> CurrencyType {
        self.kind
    }

    pub fn usd() -> Self {
        Self::new("USD", 2, CurrencyType::Fiat)
    }

    pub fn eur() -> Self {
        Self::new("EUR", 2, CurrencyType::Fiat)
    }

    pub fn gbp() -> Self {
        Self::new("GBP", 2, CurrencyType::Fiat)
    }

    pub fn jpy() -> Self {
        Self::new("JPY", 0, CurrencyType::Fiat)
    }

    pub fn btc() -> Self {
        Self::new("BTC", 8, CurrencyType::Crypto)
    }

    pub fn eth() -> Self {
        Self::new("ETH", 8, CurrencyType::Crypto)
    }

    pub fn usdt() -> Self {
        Self::new("USDT", 2, CurrencyType::Crypto)
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Currency {}

impl Hash for Currency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

//! Identifier newtypes.
//!
//! Every identifier is a distinct nominal type wrapping a non-empty string.
//! Hashing mixes in the identifier kind, so two identifiers of different
//! kinds never collide just because they wrap the same text.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                let value = value.into();
                assert!(
                    !value.is_empty(),
                    concat!(stringify!($name), " value must be non-empty")
                );
                Self(value)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                // Kind tag first so equal strings of different kinds diverge.
                stringify!($name).hash(state);
                self.0.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

identifier!(
    /// Identifies the trader owning a kernel instance.
    TraderId
);
identifier!(
    /// Identifies a strategy instance.
    StrategyId
);
identifier!(
    /// Identifies a trading venue.
    Venue
);
identifier!(
    /// A ticker symbol, without the venue suffix.
    Symbol
);
identifier!(
    /// Identifies an account at a venue.
    AccountId
);
identifier!(
    /// Client-side order identifier, assigned by the order factory.
    ClientOrderId
);
identifier!(
    /// Venue-side order identifier, assigned on acceptance.
    VenueOrderId
);
identifier!(
    /// Identifies a position.
    PositionId
);
identifier!(
    /// Identifies a single fill at a venue.
    TradeId
);

#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("invalid instrument id '{0}', expected 'SYMBOL.VENUE'")]
    InvalidInstrumentId(String),
}

/// Composite instrument identifier in `SYMBOL.VENUE` form.
///
/// The venue is the substring after the final `.`, which lets symbols
/// themselves contain dots (e.g. `BRK.B.XNYS`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentId {
    symbol: Symbol,
    venue: Venue,
}

impl InstrumentId {
    pub fn new(symbol: Symbol, venue: Venue) -> Self {
        Self { symbol, venue }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }
}

impl Hash for InstrumentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "InstrumentId".hash(state);
        self.symbol.as_str().hash(state);
        self.venue.as_str().hash(state);
    }
}

impl FromStr for InstrumentId {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.rsplit_once('.') {
            Some((symbol, venue)) if !symbol.is_empty() && !venue.is_empty() => {
                Ok(Self::new(Symbol::new(symbol), Venue::new(venue)))
            }
            _ => Err(IdentifierError::InvalidInstrumentId(value.to_string())),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.venue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_display_round_trip() {
        let id = InstrumentId::new(Symbol::new("AAPL"), Venue::new("XNAS"));
        let parsed: InstrumentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_symbol_with_dots() {
        let id: InstrumentId = "BRK.B.XNYS".parse().unwrap();
        assert_eq!(id.symbol().as_str(), "BRK.B");
        assert_eq!(id.venue().as_str(), "XNYS");
    }

    #[test]
    fn test_invalid_instrument_id_rejected() {
        assert!("AAPL".parse::<InstrumentId>().is_err());
        assert!(".XNAS".parse::<InstrumentId>().is_err());
        assert!("AAPL.".parse::<InstrumentId>().is_err());
    }

    #[test]
    fn test_distinct_kinds_hash_apart() {
        let symbol = Symbol::new("SIM");
        let venue = Venue::new("SIM");
        assert_ne!(hash_of(&symbol), hash_of(&venue));
    }

    #[test]
    fn test_same_kind_same_string_hash_equal() {
        assert_eq!(hash_of(&Venue::new("SIM")), hash_of(&Venue::new("SIM")));
    }

    #[test]
    #[should_panic(expected = "must be non-empty")]
    fn test_empty_identifier_panics() {
        let _ = StrategyId::new("");
    }
}

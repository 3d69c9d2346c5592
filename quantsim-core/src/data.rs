//! Market data records: bars, quote ticks, and trade ticks.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{BarAggregation, OrderSide, PriceType};
use crate::identifiers::{InstrumentId, TradeId};
use crate::types::{Price, Quantity};
use crate::UnixNanos;

/// Aggregation specification: how many units of what, at which price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarSpecification {
    pub step: u32,
    pub aggregation: BarAggregation,
    pub price_type: PriceType,
}

impl BarSpecification {
    pub fn new(step: u32, aggregation: BarAggregation, price_type: PriceType) -> Self {
        Self { step, aggregation, price_type }
    }
}

impl fmt::Display for BarSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.step, self.aggregation, self.price_type)
    }
}

/// Fully-qualified bar series identity: instrument plus specification.
///
/// Its `Display` form is the token used in `data.bars.{bar_type}` topics,
/// e.g. `AAPL.XNAS-1-MINUTE-LAST`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarType {
    pub instrument_id: InstrumentId,
    pub spec: BarSpecification,
}

impl BarType {
    pub fn new(instrument_id: InstrumentId, spec: BarSpecification) -> Self {
        Self { instrument_id, spec }
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.instrument_id, self.spec)
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("invalid bar range: high={high} low={low}")]
    InvalidRange { high: Price, low: Price },

    #[error("open {open} outside high/low range")]
    OpenOutOfRange { open: Price },

    #[error("close {close} outside high/low range")]
    CloseOutOfRange { close: Price },
}

/// Single OHLCV aggregate for a fixed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub bar_type: BarType,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bar_type: BarType,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
        ts_event: UnixNanos,
        ts_init: UnixNanos,
    ) -> Self {
        Self { bar_type, open, high, low, close, volume, ts_event, ts_init }
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.bar_type.instrument_id
    }

    /// Validate OHLC coherence.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.high < self.low {
            return Err(BarError::InvalidRange { high: self.high, low: self.low });
        }
        if self.open < self.low || self.open > self.high {
            return Err(BarError::OpenOutOfRange { open: self.open });
        }
        if self.close < self.low || self.close > self.high {
            return Err(BarError::CloseOutOfRange { close: self.close });
        }
        Ok(())
    }
}

impl fmt::Display for Bar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} o={} h={} l={} c={} v={} ts={}",
            self.bar_type, self.open, self.high, self.low, self.close, self.volume, self.ts_event
        )
    }
}

/// Top-of-book quote snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTick {
    pub instrument_id: InstrumentId,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

impl QuoteTick {
    /// Midpoint of bid and ask, one digit finer than the quote precision.
    pub fn mid(&self) -> Price {
        let precision = self.bid_price.precision().max(self.ask_price.precision()) + 1;
        Price::new(
            (self.bid_price.value() + self.ask_price.value()) / rust_decimal::Decimal::TWO,
            precision,
        )
    }
}

/// A single executed trade at a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub instrument_id: InstrumentId,
    pub price: Price,
    pub size: Quantity,
    pub aggressor_side: OrderSide,
    pub trade_id: TradeId,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

/// Any market-data record accepted by the driver, in one closed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketData {
    Bar(Bar),
    Quote(QuoteTick),
    Trade(TradeTick),
}

impl MarketData {
    pub fn ts_event(&self) -> UnixNanos {
        match self {
            MarketData::Bar(bar) => bar.ts_event,
            MarketData::Quote(tick) => tick.ts_event,
            MarketData::Trade(tick) => tick.ts_event,
        }
    }
}

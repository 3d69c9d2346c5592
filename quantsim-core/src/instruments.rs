//! Tradable instrument definitions.
//!
//! A closed variant set over a shared specification: every variant carries
//! the same capability surface (precisions, increments, fees, bounds) plus
//! its own contract fields. All prices and quantities created for an
//! instrument go through [`Instrument::make_price`] / [`Instrument::make_qty`]
//! so they match the instrument's precisions.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::AssetClass;
use crate::identifiers::{InstrumentId, Symbol, Venue};
use crate::types::{Currency, Price, Quantity};
use crate::UnixNanos;

/// The capability set shared by every instrument variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub id: InstrumentId,
    pub asset_class: AssetClass,
    pub quote_currency: Currency,
    pub base_currency: Option<Currency>,
    pub price_precision: u32,
    pub size_precision: u32,
    pub price_increment: Price,
    pub size_increment: Quantity,
    pub multiplier: Decimal,
    pub lot_size: Option<Quantity>,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub min_quantity: Option<Quantity>,
    pub max_quantity: Option<Quantity>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

impl InstrumentSpec {
    /// Build a spec with increments derived from the precisions, unit
    /// multiplier, zero fees, and no quantity/price bounds.
    pub fn new(
        id: InstrumentId,
        asset_class: AssetClass,
        quote_currency: Currency,
        price_precision: u32,
        size_precision: u32,
    ) -> Self {
        let tick = Decimal::new(1, price_precision);
        let step = Decimal::new(1, size_precision);
        Self {
            id,
            asset_class,
            quote_currency,
            base_currency: None,
            price_precision,
            size_precision,
            price_increment: Price::new(tick, price_precision),
            size_increment: Quantity::new(step, size_precision),
            multiplier: Decimal::ONE,
            lot_size: None,
            maker_fee: Decimal::ZERO,
            taker_fee: Decimal::ZERO,
            min_quantity: None,
            max_quantity: None,
            min_price: None,
            max_price: None,
            ts_event: 0,
            ts_init: 0,
        }
    }

    pub fn with_fees(mut self, maker_fee: Decimal, taker_fee: Decimal) -> Self {
        self.maker_fee = maker_fee;
        self.taker_fee = taker_fee;
        self
    }

    pub fn with_quantity_bounds(mut self, min: Option<Quantity>, max: Option<Quantity>) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }

    pub fn with_price_bounds(mut self, min: Option<Price>, max: Option<Price>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }
}

/// A listed cash equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equity {
    pub spec: InstrumentSpec,
}

impl Equity {
    pub fn new(id: InstrumentId, quote_currency: Currency) -> Self {
        let mut spec = InstrumentSpec::new(id, AssetClass::Equity, quote_currency, 2, 0);
        spec.lot_size = Some(Quantity::new(Decimal::ONE, 0));
        Self { spec }
    }
}

/// A spot FX pair. `base_currency` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub spec: InstrumentSpec,
}

impl CurrencyPair {
    pub fn new(
        id: InstrumentId,
        base_currency: Currency,
        quote_currency: Currency,
        price_precision: u32,
        size_precision: u32,
    ) -> Self {
        let mut spec = InstrumentSpec::new(
            id,
            AssetClass::Fx,
            quote_currency,
            price_precision,
            size_precision,
        );
        spec.base_currency = Some(base_currency);
        Self { spec }
    }
}

/// A perpetual swap settled in `settlement_currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoPerpetual {
    pub spec: InstrumentSpec,
    pub settlement_currency: Currency,
}

impl CryptoPerpetual {
    pub fn new(
        id: InstrumentId,
        base_currency: Currency,
        quote_currency: Currency,
        settlement_currency: Currency,
        price_precision: u32,
        size_precision: u32,
    ) -> Self {
        let mut spec = InstrumentSpec::new(
            id,
            AssetClass::Crypto,
            quote_currency,
            price_precision,
            size_precision,
        );
        spec.base_currency = Some(base_currency);
        Self { spec, settlement_currency }
    }
}

/// A dated futures contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesContract {
    pub spec: InstrumentSpec,
    pub underlying: Symbol,
    pub expiry: NaiveDate,
}

impl FuturesContract {
    pub fn new(
        id: InstrumentId,
        asset_class: AssetClass,
        quote_currency: Currency,
        underlying: Symbol,
        expiry: NaiveDate,
        price_precision: u32,
        multiplier: Decimal,
    ) -> Self {
        let mut spec = InstrumentSpec::new(id, asset_class, quote_currency, price_precision, 0);
        spec.multiplier = multiplier;
        Self { spec, underlying, expiry }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Call,
    Put,
}

/// A listed option on an underlying symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsContract {
    pub spec: InstrumentSpec,
    pub underlying: Symbol,
    pub option_kind: OptionKind,
    pub strike: Price,
    pub expiry: NaiveDate,
}

impl OptionsContract {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: InstrumentId,
        quote_currency: Currency,
        underlying: Symbol,
        option_kind: OptionKind,
        strike: Price,
        expiry: NaiveDate,
        multiplier: Decimal,
    ) -> Self {
        let mut spec = InstrumentSpec::new(id, AssetClass::Equity, quote_currency, 2, 0);
        spec.multiplier = multiplier;
        Self { spec, underlying, option_kind, strike, expiry }
    }
}

/// Any tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instrument {
    Equity(Equity),
    CurrencyPair(CurrencyPair),
    CryptoPerpetual(CryptoPerpetual),
    FuturesContract(FuturesContract),
    OptionsContract(OptionsContract),
}

impl Instrument {
    pub fn spec(&self) -> &InstrumentSpec {
        match self {
            Instrument::Equity(i) => &i.spec,
            Instrument::CurrencyPair(i) => &i.spec,
            Instrument::CryptoPerpetual(i) => &i.spec,
            Instrument::FuturesContract(i) => &i.spec,
            Instrument::OptionsContract(i) => &i.spec,
        }
    }

    pub fn spec_mut(&mut self) -> &mut InstrumentSpec {
        match self {
            Instrument::Equity(i) => &mut i.spec,
            Instrument::CurrencyPair(i) => &mut i.spec,
            Instrument::CryptoPerpetual(i) => &mut i.spec,
            Instrument::FuturesContract(i) => &mut i.spec,
            Instrument::OptionsContract(i) => &mut i.spec,
        }
    }

    pub fn id(&self) -> &InstrumentId {
        &self.spec().id
    }

    pub fn venue(&self) -> &Venue {
        self.spec().id.venue()
    }

    pub fn quote_currency(&self) -> &Currency {
        &self.spec().quote_currency
    }

    pub fn price_precision(&self) -> u32 {
        self.spec().price_precision
    }

    pub fn size_precision(&self) -> u32 {
        self.spec().size_precision
    }

    pub fn taker_fee(&self) -> Decimal {
        self.spec().taker_fee
    }

    pub fn maker_fee(&self) -> Decimal {
        self.spec().maker_fee
    }

    pub fn multiplier(&self) -> Decimal {
        self.spec().multiplier
    }

    /// Quantize a raw value to this instrument's price precision.
    pub fn make_price(&self, value: Decimal) -> Price {
        Price::new(value, self.spec().price_precision)
    }

    /// Quantize a raw value to this instrument's size precision.
    pub fn make_qty(&self, value: Decimal) -> Quantity {
        Quantity::new(value, self.spec().size_precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn aapl() -> Instrument {
        Instrument::Equity(Equity::new(
            "AAPL.XNAS".parse().unwrap(),
            Currency::usd(),
        ))
    }

    #[test]
    fn test_equity_defaults() {
        let inst = aapl();
        assert_eq!(inst.price_precision(), 2);
        assert_eq!(inst.size_precision(), 0);
        assert_eq!(inst.spec().price_increment.value(), dec!(0.01));
        assert_eq!(inst.multiplier(), Decimal::ONE);
    }

    #[test]
    fn test_make_price_quantizes_to_instrument_precision() {
        let inst = aapl();
        let px = inst.make_price(dec!(187.4999));
        assert_eq!(px.value(), dec!(187.50));
        assert_eq!(px.precision(), 2);
    }

    #[test]
    fn test_make_qty_whole_shares() {
        let inst = aapl();
        assert_eq!(inst.make_qty(dec!(100.4)).value(), dec!(100));
    }

    #[test]
    fn test_currency_pair_has_base() {
        let pair = CurrencyPair::new(
            "EUR/USD.SIM".parse().unwrap(),
            Currency::eur(),
            Currency::usd(),
            5,
            0,
        );
        let inst = Instrument::CurrencyPair(pair);
        assert_eq!(inst.spec().base_currency.as_ref().unwrap().code(), "EUR");
        assert_eq!(inst.quote_currency().code(), "USD");
    }

    #[test]
    fn test_fee_builder() {
        let spec = InstrumentSpec::new(
            "BTCUSDT.BINA".parse().unwrap(),
            AssetClass::Crypto,
            Currency::usdt(),
            2,
            6,
        )
        .with_fees(dec!(0.0002), dec!(0.0004));
        assert_eq!(spec.taker_fee, dec!(0.0004));
    }
}

//! Portfolio aggregation queries over the cache.

use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::cache::Cache;
use crate::identifiers::{InstrumentId, Venue};
use crate::types::{Currency, Money, Price};

/// Read-only aggregation surface. Holds no state of its own; every answer
/// is derived from the cache at call time.
pub struct Portfolio {
    cache: Rc<RefCell<Cache>>,
}

impl Portfolio {
    pub fn new(cache: Rc<RefCell<Cache>>) -> Self {
        Self { cache }
    }

    /// Net signed quantity across open positions for the instrument.
    pub fn net_position(&self, instrument_id: &InstrumentId) -> Decimal {
        self.cache
            .borrow()
            .positions_open(Some(instrument_id), None)
            .iter()
            .map(|p| p.signed_qty())
            .sum()
    }

    pub fn is_net_long(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id) > Decimal::ZERO
    }

    pub fn is_net_short(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id) < Decimal::ZERO
    }

    pub fn is_flat(&self, instrument_id: &InstrumentId) -> bool {
        self.net_position(instrument_id).is_zero()
    }

    pub fn unrealized_pnl(&self, instrument_id: &InstrumentId, last_price: Price) -> Decimal {
        self.cache
            .borrow()
            .positions_open(Some(instrument_id), None)
            .iter()
            .map(|p| p.unrealized_pnl(last_price))
            .sum()
    }

    /// Realized PnL across all positions (open and closed) for the
    /// instrument, in each position's primary currency.
    pub fn realized_pnl(&self, instrument_id: &InstrumentId) -> Decimal {
        self.cache
            .borrow()
            .positions(Some(instrument_id), None)
            .iter()
            .map(|p| p.realized_pnl())
            .sum()
    }

    pub fn net_exposure(&self, instrument_id: &InstrumentId, last_price: Price) -> Decimal {
        self.cache
            .borrow()
            .positions_open(Some(instrument_id), None)
            .iter()
            .map(|p| p.notional_value(last_price))
            .sum()
    }

    pub fn total_pnl(&self, instrument_id: &InstrumentId, last_price: Price) -> Decimal {
        self.realized_pnl(instrument_id) + self.unrealized_pnl(instrument_id, last_price)
    }

    pub fn balance_total(&self, venue: &Venue, currency: Option<&Currency>) -> Option<Money> {
        self.cache
            .borrow()
            .account_for_venue(venue)
            .and_then(|a| a.balance_total(currency))
    }

    pub fn balance_free(&self, venue: &Venue, currency: Option<&Currency>) -> Option<Money> {
        self.cache
            .borrow()
            .account_for_venue(venue)
            .and_then(|a| a.balance_free(currency))
    }

    pub fn balance_locked(&self, venue: &Venue, currency: Option<&Currency>) -> Option<Money> {
        self.cache
            .borrow()
            .account_for_venue(venue)
            .and_then(|a| a.balance_locked(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{LiquiditySide, OrderKind, OrderSide};
    use crate::events::OrderFilled;
    use crate::identifiers::{
        AccountId, ClientOrderId, PositionId, StrategyId, TradeId, VenueOrderId,
    };
    use crate::position::Position;
    use crate::types::{Price, Quantity};
    use rust_decimal_macros::dec;

    fn fill(side: OrderSide, qty: Decimal, px: Decimal) -> OrderFilled {
        OrderFilled {
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "AAPL.XNAS".parse().unwrap(),
            client_order_id: ClientOrderId::new("O-S-1-1"),
            venue_order_id: VenueOrderId::new("V-XNAS-1"),
            account_id: AccountId::new("XNAS-001"),
            trade_id: TradeId::new("T-XNAS-1"),
            position_id: None,
            order_side: side,
            order_kind: OrderKind::Market,
            last_qty: Quantity::new(qty, 0),
            last_px: Price::new(px, 2),
            currency: Currency::usd(),
            commission: Money::zero(Currency::usd()),
            liquidity_side: LiquiditySide::Taker,
            ts_event: 1,
            ts_init: 1,
        }
    }

    #[test]
    fn test_net_position_sums_open_positions() {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let portfolio = Portfolio::new(Rc::clone(&cache));
        let instrument_id: InstrumentId = "AAPL.XNAS".parse().unwrap();

        assert!(portfolio.is_flat(&instrument_id));

        cache.borrow_mut().add_position(Position::new(
            PositionId::new("P-1"),
            fill(OrderSide::Buy, dec!(100), dec!(50)),
        ));
        cache.borrow_mut().add_position(Position::new(
            PositionId::new("P-2"),
            fill(OrderSide::Sell, dec!(30), dec!(55)),
        ));

        assert_eq!(portfolio.net_position(&instrument_id), dec!(70));
        assert!(portfolio.is_net_long(&instrument_id));
    }

    #[test]
    fn test_unrealized_pnl_over_open_positions() {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let portfolio = Portfolio::new(Rc::clone(&cache));
        let instrument_id: InstrumentId = "AAPL.XNAS".parse().unwrap();

        cache.borrow_mut().add_position(Position::new(
            PositionId::new("P-1"),
            fill(OrderSide::Buy, dec!(100), dec!(50)),
        ));

        assert_eq!(
            portfolio.unrealized_pnl(&instrument_id, Price::new(dec!(52), 2)),
            dec!(200)
        );
    }

    #[test]
    fn test_balances_for_unknown_venue_are_none() {
        let cache = Rc::new(RefCell::new(Cache::new()));
        let portfolio = Portfolio::new(cache);
        assert!(portfolio.balance_total(&Venue::new("SIM"), None).is_none());
    }
}

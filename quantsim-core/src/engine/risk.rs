//! Pre-trade risk gate.
//!
//! The sole soft-fail channel in the kernel: every user-driven rejection
//! travels through an [`OrderDenied`] event with a machine-readable reason
//! prefix (`HALTED`, `REDUCING`, `UNKNOWN_INSTRUMENT`, ...).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::cache::Cache;
use crate::enums::{OrderSide, TradingState};
use crate::events::OrderDenied;
use crate::orders::Order;
use crate::portfolio::Portfolio;
use crate::UnixNanos;

pub struct RiskEngine {
    portfolio: Rc<Portfolio>,
    cache: Rc<RefCell<Cache>>,
    trading_state: Cell<TradingState>,
}

impl RiskEngine {
    pub fn new(portfolio: Rc<Portfolio>, cache: Rc<RefCell<Cache>>) -> Self {
        Self {
            portfolio,
            cache,
            trading_state: Cell::new(TradingState::Active),
        }
    }

    pub fn trading_state(&self) -> TradingState {
        self.trading_state.get()
    }

    pub fn set_trading_state(&self, state: TradingState) {
        self.trading_state.set(state);
    }

    /// Validate an order pre-trade. `None` means pass.
    pub fn validate_order(&self, order: &Order, ts: UnixNanos) -> Option<OrderDenied> {
        if let Some(reason) = self.check(order) {
            warn!(
                client_order_id = %order.client_order_id(),
                reason = %reason,
                "order denied"
            );
            return Some(OrderDenied {
                strategy_id: order.strategy_id().clone(),
                instrument_id: order.instrument_id().clone(),
                client_order_id: order.client_order_id().clone(),
                reason,
                ts_event: ts,
                ts_init: ts,
            });
        }
        None
    }

    fn check(&self, order: &Order) -> Option<String> {
        // 1. Global trading state.
        match self.trading_state.get() {
            TradingState::Halted => {
                return Some("HALTED: all order flow is denied".to_string());
            }
            TradingState::Reducing => {
                let net = self.portfolio.net_position(order.instrument_id());
                let increases = match order.side() {
                    OrderSide::Buy => net >= Decimal::ZERO,
                    OrderSide::Sell => net <= Decimal::ZERO,
                };
                if increases {
                    return Some(
                        "REDUCING: only position-reducing orders are allowed".to_string(),
                    );
                }
            }
            TradingState::Active => {}
        }

        let cache = self.cache.borrow();

        // 2. Instrument must be known.
        let Some(instrument) = cache.instrument(order.instrument_id()) else {
            return Some(format!(
                "UNKNOWN_INSTRUMENT: {} not found in cache",
                order.instrument_id()
            ));
        };

        // 3. Quantity precision and bounds.
        if order.quantity().precision() != instrument.size_precision() {
            return Some(format!(
                "QUANTITY_PRECISION: {} != instrument size precision {}",
                order.quantity().precision(),
                instrument.size_precision()
            ));
        }
        if let Some(min) = instrument.spec().min_quantity {
            if order.quantity() < min {
                return Some(format!(
                    "QUANTITY_TOO_SMALL: {} below minimum {min}",
                    order.quantity()
                ));
            }
        }
        if let Some(max) = instrument.spec().max_quantity {
            if order.quantity() > max {
                return Some(format!(
                    "QUANTITY_TOO_LARGE: {} above maximum {max}",
                    order.quantity()
                ));
            }
        }

        // 4. Prices on limit/stop variants.
        for price in [order.price(), order.trigger_price()].into_iter().flatten() {
            if !price.is_positive() {
                return Some(format!("PRICE_NOT_POSITIVE: {price}"));
            }
            if price.precision() != instrument.price_precision() {
                return Some(format!(
                    "PRICE_PRECISION: {} != instrument price precision {}",
                    price.precision(),
                    instrument.price_precision()
                ));
            }
            if let Some(min) = instrument.spec().min_price {
                if price < min {
                    return Some(format!("PRICE_TOO_LOW: {price} below minimum {min}"));
                }
            }
            if let Some(max) = instrument.spec().max_price {
                if price > max {
                    return Some(format!("PRICE_TOO_HIGH: {price} above maximum {max}"));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{OrderKind, TimeInForce};
    use crate::events::OrderInitialized;
    use crate::identifiers::{ClientOrderId, PositionId, StrategyId, TraderId};
    use crate::instruments::{Equity, Instrument};
    use crate::position::Position;
    use crate::types::{Currency, Price, Quantity};
    use rust_decimal_macros::dec;

    fn setup() -> (Rc<RefCell<Cache>>, RiskEngine) {
        let cache = Rc::new(RefCell::new(Cache::new()));
        cache
            .borrow_mut()
            .add_instrument(Instrument::Equity(Equity::new(
                "AAPL.XNAS".parse().unwrap(),
                Currency::usd(),
            )))
            .unwrap();
        let portfolio = Rc::new(Portfolio::new(Rc::clone(&cache)));
        let risk = RiskEngine::new(portfolio, Rc::clone(&cache));
        (cache, risk)
    }

    fn order(side: OrderSide, qty_precision: u32) -> Order {
        Order::new(OrderInitialized {
            trader_id: TraderId::new("T-1"),
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "AAPL.XNAS".parse().unwrap(),
            client_order_id: ClientOrderId::new("O-S-1-1"),
            order_side: side,
            order_kind: OrderKind::Market,
            quantity: Quantity::new(dec!(1), qty_precision),
            time_in_force: TimeInForce::Gtc,
            price: None,
            trigger_price: None,
            ts_event: 0,
            ts_init: 0,
        })
    }

    fn long_position() -> Position {
        use crate::enums::LiquiditySide;
        use crate::events::OrderFilled;
        use crate::identifiers::{AccountId, TradeId, VenueOrderId};
        use crate::types::Money;

        Position::new(
            PositionId::new("P-1"),
            OrderFilled {
                strategy_id: StrategyId::new("S-1"),
                instrument_id: "AAPL.XNAS".parse().unwrap(),
                client_order_id: ClientOrderId::new("O-S-1-0"),
                venue_order_id: VenueOrderId::new("V-1"),
                account_id: AccountId::new("XNAS-001"),
                trade_id: TradeId::new("T-1"),
                position_id: None,
                order_side: OrderSide::Buy,
                order_kind: OrderKind::Market,
                last_qty: Quantity::new(dec!(10), 0),
                last_px: Price::new(dec!(50), 2),
                currency: Currency::usd(),
                commission: Money::zero(Currency::usd()),
                liquidity_side: LiquiditySide::Taker,
                ts_event: 0,
                ts_init: 0,
            },
        )
    }

    #[test]
    fn test_active_state_passes_valid_order() {
        let (_cache, risk) = setup();
        assert!(risk.validate_order(&order(OrderSide::Buy, 0), 0).is_none());
    }

    #[test]
    fn test_halted_denies_everything() {
        let (_cache, risk) = setup();
        risk.set_trading_state(TradingState::Halted);
        let denied = risk.validate_order(&order(OrderSide::Buy, 0), 0).unwrap();
        assert!(denied.reason.starts_with("HALTED"));
    }

    #[test]
    fn test_reducing_denies_increasing_buy_allows_sell() {
        let (cache, risk) = setup();
        cache.borrow_mut().add_position(long_position());
        risk.set_trading_state(TradingState::Reducing);

        let denied = risk.validate_order(&order(OrderSide::Buy, 0), 0).unwrap();
        assert!(denied.reason.starts_with("REDUCING"));

        assert!(risk.validate_order(&order(OrderSide::Sell, 0), 0).is_none());
    }

    #[test]
    fn test_unknown_instrument_denied() {
        let (_cache, risk) = setup();
        let unknown = Order::new(OrderInitialized {
            trader_id: TraderId::new("T-1"),
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "TSLA.XNAS".parse().unwrap(),
            client_order_id: ClientOrderId::new("O-S-1-9"),
            order_side: OrderSide::Buy,
            order_kind: OrderKind::Market,
            quantity: Quantity::new(dec!(1), 0),
            time_in_force: TimeInForce::Gtc,
            price: None,
            trigger_price: None,
            ts_event: 0,
            ts_init: 0,
        });
        let denied = risk.validate_order(&unknown, 0).unwrap();
        assert!(denied.reason.starts_with("UNKNOWN_INSTRUMENT"));
    }

    #[test]
    fn test_quantity_precision_mismatch_denied() {
        let (_cache, risk) = setup();
        let denied = risk.validate_order(&order(OrderSide::Buy, 2), 0).unwrap();
        assert!(denied.reason.starts_with("QUANTITY_PRECISION"));
    }

    #[test]
    fn test_price_precision_mismatch_denied() {
        let (_cache, risk) = setup();
        let bad = Order::new(OrderInitialized {
            trader_id: TraderId::new("T-1"),
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "AAPL.XNAS".parse().unwrap(),
            client_order_id: ClientOrderId::new("O-S-1-2"),
            order_side: OrderSide::Buy,
            order_kind: OrderKind::Limit,
            quantity: Quantity::new(dec!(1), 0),
            time_in_force: TimeInForce::Gtc,
            price: Some(Price::new(dec!(100.1234), 4)),
            trigger_price: None,
            ts_event: 0,
            ts_init: 0,
        });
        let denied = risk.validate_order(&bad, 0).unwrap();
        assert!(denied.reason.starts_with("PRICE_PRECISION"));
    }

    #[test]
    fn test_quantity_bounds_enforced() {
        let (cache, risk) = setup();
        {
            let mut inst = Equity::new("MSFT.XNAS".parse().unwrap(), Currency::usd());
            inst.spec.min_quantity = Some(Quantity::new(dec!(10), 0));
            inst.spec.max_quantity = Some(Quantity::new(dec!(1000), 0));
            cache
                .borrow_mut()
                .add_instrument(Instrument::Equity(inst))
                .unwrap();
        }
        let small = Order::new(OrderInitialized {
            trader_id: TraderId::new("T-1"),
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "MSFT.XNAS".parse().unwrap(),
            client_order_id: ClientOrderId::new("O-S-1-3"),
            order_side: OrderSide::Buy,
            order_kind: OrderKind::Market,
            quantity: Quantity::new(dec!(1), 0),
            time_in_force: TimeInForce::Gtc,
            price: None,
            trigger_price: None,
            ts_event: 0,
            ts_init: 0,
        });
        let denied = risk.validate_order(&small, 0).unwrap();
        assert!(denied.reason.starts_with("QUANTITY_TOO_SMALL"));
    }
}

//! Per-instrument bar matching.
//!
//! Open orders are checked against each bar's OHLC in acceptance order.
//! Only full fills are modeled. The fill-price policy is deterministic and
//! conservative: when the bar opens through a limit or stop level, the fill
//! prints at the open rather than the stale level, and a limit never fills
//! at a worse price than its limit.

use quantsim_core::cache::Cache;
use quantsim_core::data::Bar;
use quantsim_core::enums::{OrderKind, OrderSide};
use quantsim_core::identifiers::{ClientOrderId, InstrumentId};
use quantsim_core::orders::Order;
use quantsim_core::types::Price;

/// A matched order and the price it fills at.
#[derive(Debug, Clone, PartialEq)]
pub struct FillDecision {
    pub client_order_id: ClientOrderId,
    pub price: Price,
}

/// Fill check against bar OHLC.
///
/// | order            | triggered when        | fill price      |
/// |------------------|-----------------------|-----------------|
/// | market           | always                | `O`             |
/// | limit buy `p`    | `L <= p`              | `min(p, O)`     |
/// | limit sell `p`   | `H >= p`              | `max(p, O)`     |
/// | stop buy `t`     | `H >= t`              | `max(t, O)`     |
/// | stop sell `t`    | `L <= t`              | `min(t, O)`     |
/// | stop-limit buy   | `H >= t` and `L <= p` | `p`             |
/// | stop-limit sell  | `L <= t` and `H >= p` | `p`             |
pub fn check_fill(order: &Order, bar: &Bar) -> Option<Price> {
    match order.kind() {
        OrderKind::Market => Some(bar.open),
        OrderKind::Limit => {
            let limit = order.price().expect("limit order has a price");
            match order.side() {
                OrderSide::Buy if bar.low <= limit => Some(limit.min(bar.open)),
                OrderSide::Sell if bar.high >= limit => Some(limit.max(bar.open)),
                _ => None,
            }
        }
        OrderKind::StopMarket => {
            let trigger = order.trigger_price().expect("stop order has a trigger");
            match order.side() {
                OrderSide::Buy if bar.high >= trigger => Some(trigger.max(bar.open)),
                OrderSide::Sell if bar.low <= trigger => Some(trigger.min(bar.open)),
                _ => None,
            }
        }
        OrderKind::StopLimit => {
            let trigger = order.trigger_price().expect("stop-limit order has a trigger");
            let limit = order.price().expect("stop-limit order has a price");
            match order.side() {
                OrderSide::Buy if bar.high >= trigger && bar.low <= limit => Some(limit),
                OrderSide::Sell if bar.low <= trigger && bar.high >= limit => Some(limit),
                _ => None,
            }
        }
    }
}

/// Ordered list of open orders for one instrument.
pub struct MatchingEngine {
    instrument_id: InstrumentId,
    open_orders: Vec<ClientOrderId>,
}

impl MatchingEngine {
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            open_orders: Vec::new(),
        }
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    /// Append an order in acceptance order.
    pub fn add_order(&mut self, client_order_id: ClientOrderId) {
        if !self.open_orders.contains(&client_order_id) {
            self.open_orders.push(client_order_id);
        }
    }

    /// Remove an order; returns whether it was present.
    pub fn remove_order(&mut self, client_order_id: &ClientOrderId) -> bool {
        let before = self.open_orders.len();
        self.open_orders.retain(|id| id != client_order_id);
        self.open_orders.len() != before
    }

    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    pub fn open_order_ids(&self) -> &[ClientOrderId] {
        &self.open_orders
    }

    /// Resolve open orders against the bar, removing the ones that fill.
    ///
    /// The open list is snapshotted at entry: orders arriving while fills
    /// are being handled first match against the next bar.
    pub fn process_bar(&mut self, bar: &Bar, cache: &Cache) -> Vec<FillDecision> {
        let snapshot = self.open_orders.clone();
        let mut fills = Vec::new();

        for client_order_id in snapshot {
            let Some(order) = cache.order(&client_order_id) else {
                self.remove_order(&client_order_id);
                continue;
            };
            if !order.is_open() {
                self.remove_order(&client_order_id);
                continue;
            }
            if let Some(price) = check_fill(order, bar) {
                self.remove_order(&client_order_id);
                fills.push(FillDecision { client_order_id, price });
            }
        }

        fills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantsim_core::data::{BarSpecification, BarType};
    use quantsim_core::enums::{BarAggregation, PriceType, TimeInForce};
    use quantsim_core::events::OrderInitialized;
    use quantsim_core::identifiers::{StrategyId, TraderId};
    use quantsim_core::types::Quantity;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar::new(
            BarType::new(
                "AAPL.SIM".parse().unwrap(),
                BarSpecification::new(1, BarAggregation::Minute, PriceType::Last),
            ),
            Price::new(open, 2),
            Price::new(high, 2),
            Price::new(low, 2),
            Price::new(close, 2),
            Quantity::new(dec!(1000), 0),
            1,
            1,
        )
    }

    fn order(
        side: OrderSide,
        kind: OrderKind,
        price: Option<Decimal>,
        trigger: Option<Decimal>,
    ) -> Order {
        Order::new(OrderInitialized {
            trader_id: TraderId::new("T-1"),
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "AAPL.SIM".parse().unwrap(),
            client_order_id: ClientOrderId::new("O-S-1-1"),
            order_side: side,
            order_kind: kind,
            quantity: Quantity::new(dec!(100), 0),
            time_in_force: TimeInForce::Gtc,
            price: price.map(|p| Price::new(p, 2)),
            trigger_price: trigger.map(|p| Price::new(p, 2)),
            ts_event: 0,
            ts_init: 0,
        })
    }

    #[test]
    fn test_market_fills_at_open() {
        let o = order(OrderSide::Buy, OrderKind::Market, None, None);
        let b = bar(dec!(100), dec!(101), dec!(99), dec!(100.5));
        assert_eq!(check_fill(&o, &b).unwrap().value(), dec!(100));
    }

    #[test]
    fn test_limit_buy_fills_at_open_through_price() {
        // Bar opens below the limit: realistic fill is the open.
        let o = order(OrderSide::Buy, OrderKind::Limit, Some(dec!(96)), None);
        let b = bar(dec!(95), dec!(96), dec!(93), dec!(95));
        assert_eq!(check_fill(&o, &b).unwrap().value(), dec!(95));
    }

    #[test]
    fn test_limit_buy_no_touch_no_fill() {
        let o = order(OrderSide::Buy, OrderKind::Limit, Some(dec!(92)), None);
        let b = bar(dec!(95), dec!(96), dec!(93), dec!(95));
        assert!(check_fill(&o, &b).is_none());
    }

    #[test]
    fn test_limit_sell_never_below_limit() {
        let o = order(OrderSide::Sell, OrderKind::Limit, Some(dec!(101)), None);
        let b = bar(dec!(100), dec!(102), dec!(99), dec!(101));
        assert_eq!(check_fill(&o, &b).unwrap().value(), dec!(101));

        // Opens above the limit: fill at the open.
        let gap = bar(dec!(103), dec!(104), dec!(100), dec!(103));
        assert_eq!(check_fill(&o, &gap).unwrap().value(), dec!(103));
    }

    #[test]
    fn test_stop_buy_triggers_at_high() {
        let o = order(OrderSide::Buy, OrderKind::StopMarket, None, Some(dec!(101)));
        let b = bar(dec!(100), dec!(102), dec!(99), dec!(101.5));
        assert_eq!(check_fill(&o, &b).unwrap().value(), dec!(101));
    }

    #[test]
    fn test_stop_sell_gap_fills_at_open() {
        let o = order(OrderSide::Sell, OrderKind::StopMarket, None, Some(dec!(99)));
        // Gaps through the stop: fill at the (worse) open.
        let b = bar(dec!(95), dec!(95.5), dec!(94), dec!(95.2));
        assert_eq!(check_fill(&o, &b).unwrap().value(), dec!(95));
    }

    #[test]
    fn test_stop_limit_buy_fills_at_limit() {
        let o = order(
            OrderSide::Buy,
            OrderKind::StopLimit,
            Some(dec!(102)),
            Some(dec!(103)),
        );
        let b = bar(dec!(100), dec!(105), dec!(99), dec!(104));
        assert_eq!(check_fill(&o, &b).unwrap().value(), dec!(102));
    }

    #[test]
    fn test_stop_limit_buy_triggered_but_limit_unreachable() {
        let o = order(
            OrderSide::Buy,
            OrderKind::StopLimit,
            Some(dec!(102)),
            Some(dec!(103)),
        );
        // Triggered (high >= 103) but low never reaches the 102 limit.
        let b = bar(dec!(103), dec!(105), dec!(102.5), dec!(104));
        assert!(check_fill(&o, &b).is_none());
    }

    #[test]
    fn test_open_list_keeps_acceptance_order() {
        let mut engine = MatchingEngine::new("AAPL.SIM".parse().unwrap());
        engine.add_order(ClientOrderId::new("O-1"));
        engine.add_order(ClientOrderId::new("O-2"));
        engine.add_order(ClientOrderId::new("O-1")); // dedupe

        assert_eq!(engine.open_order_count(), 2);
        assert_eq!(engine.open_order_ids()[0].as_str(), "O-1");

        assert!(engine.remove_order(&ClientOrderId::new("O-1")));
        assert!(!engine.remove_order(&ClientOrderId::new("O-1")));
        assert_eq!(engine.open_order_count(), 1);
    }
}

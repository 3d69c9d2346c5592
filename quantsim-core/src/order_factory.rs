//! Per-strategy order construction.

use std::cell::Cell;

use crate::enums::{OrderKind, OrderSide, TimeInForce};
use crate::events::OrderInitialized;
use crate::identifiers::{ClientOrderId, InstrumentId, StrategyId, TraderId};
use crate::orders::Order;
use crate::types::{Price, Quantity};
use crate::UnixNanos;

/// Issues orders with monotonically increasing client order ids of the form
/// `O-{strategy_id}-{n}`.
pub struct OrderFactory {
    trader_id: TraderId,
    strategy_id: StrategyId,
    counter: Cell<u64>,
}

impl OrderFactory {
    pub fn new(trader_id: TraderId, strategy_id: StrategyId) -> Self {
        Self {
            trader_id,
            strategy_id,
            counter: Cell::new(0),
        }
    }

    pub fn reset(&self) {
        self.counter.set(0);
    }

    fn next_order_id(&self) -> ClientOrderId {
        let n = self.counter.get() + 1;
        self.counter.set(n);
        ClientOrderId::new(format!("O-{}-{n}", self.strategy_id))
    }

    fn init(
        &self,
        instrument_id: InstrumentId,
        side: OrderSide,
        kind: OrderKind,
        quantity: Quantity,
        time_in_force: TimeInForce,
        price: Option<Price>,
        trigger_price: Option<Price>,
        ts_init: UnixNanos,
    ) -> OrderInitialized {
        OrderInitialized {
            trader_id: self.trader_id.clone(),
            strategy_id: self.strategy_id.clone(),
            instrument_id,
            client_order_id: self.next_order_id(),
            order_side: side,
            order_kind: kind,
            quantity,
            time_in_force,
            price,
            trigger_price,
            ts_event: ts_init,
            ts_init,
        }
    }

    pub fn market(
        &self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        ts_init: UnixNanos,
    ) -> Order {
        Order::new(self.init(
            instrument_id,
            side,
            OrderKind::Market,
            quantity,
            TimeInForce::Gtc,
            None,
            None,
            ts_init,
        ))
    }

    pub fn limit(
        &self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        price: Price,
        ts_init: UnixNanos,
    ) -> Order {
        Order::new(self.init(
            instrument_id,
            side,
            OrderKind::Limit,
            quantity,
            TimeInForce::Gtc,
            Some(price),
            None,
            ts_init,
        ))
    }

    pub fn stop_market(
        &self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trigger_price: Price,
        ts_init: UnixNanos,
    ) -> Order {
        Order::new(self.init(
            instrument_id,
            side,
            OrderKind::StopMarket,
            quantity,
            TimeInForce::Gtc,
            None,
            Some(trigger_price),
            ts_init,
        ))
    }

    pub fn stop_limit(
        &self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        price: Price,
        trigger_price: Price,
        ts_init: UnixNanos,
    ) -> Order {
        Order::new(self.init(
            instrument_id,
            side,
            OrderKind::StopLimit,
            quantity,
            TimeInForce::Gtc,
            Some(price),
            Some(trigger_price),
            ts_init,
        ))
    }
}

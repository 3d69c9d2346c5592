//! Event-sourced orders and their status machine.
//!
//! An order is constructed from an [`OrderInitialized`] event and mutates
//! only by applying further events. `apply` enforces the status transition
//! table; an illegal transition is an invariant violation and aborts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{OrderKind, OrderSide, OrderStatus, TimeInForce};
use crate::events::{OrderEvent, OrderFilled, OrderInitialized, OrderUpdated};
use crate::identifiers::{
    ClientOrderId, InstrumentId, StrategyId, TraderId, VenueOrderId,
};
use crate::types::{Price, Quantity};
use crate::UnixNanos;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    client_order_id: ClientOrderId,
    venue_order_id: Option<VenueOrderId>,
    trader_id: TraderId,
    strategy_id: StrategyId,
    instrument_id: InstrumentId,
    side: OrderSide,
    kind: OrderKind,
    quantity: Quantity,
    time_in_force: TimeInForce,
    price: Option<Price>,
    trigger_price: Option<Price>,
    status: OrderStatus,
    filled_qty: Quantity,
    leaves_qty: Quantity,
    avg_px: Option<Decimal>,
    events: Vec<OrderEvent>,
    ts_init: UnixNanos,
    ts_last: UnixNanos,
}

impl Order {
    /// Build an order from its initialization event.
    pub fn new(init: OrderInitialized) -> Self {
        match init.order_kind {
            OrderKind::Market => {}
            OrderKind::Limit => {
                assert!(init.price.is_some(), "limit order requires a price");
            }
            OrderKind::StopMarket => {
                assert!(
                    init.trigger_price.is_some(),
                    "stop-market order requires a trigger price"
                );
            }
            OrderKind::StopLimit => {
                assert!(init.price.is_some(), "stop-limit order requires a price");
                assert!(
                    init.trigger_price.is_some(),
                    "stop-limit order requires a trigger price"
                );
            }
        }
        let precision = init.quantity.precision();
        Self {
            client_order_id: init.client_order_id.clone(),
            venue_order_id: None,
            trader_id: init.trader_id.clone(),
            strategy_id: init.strategy_id.clone(),
            instrument_id: init.instrument_id.clone(),
            side: init.order_side,
            kind: init.order_kind,
            quantity: init.quantity,
            time_in_force: init.time_in_force,
            price: init.price,
            trigger_price: init.trigger_price,
            status: OrderStatus::Initialized,
            filled_qty: Quantity::zero(precision),
            leaves_qty: init.quantity,
            avg_px: None,
            ts_init: init.ts_init,
            ts_last: init.ts_event,
            events: vec![OrderEvent::Initialized(init)],
        }
    }

    pub fn client_order_id(&self) -> &ClientOrderId {
        &self.client_order_id
    }

    pub fn venue_order_id(&self) -> Option<&VenueOrderId> {
        self.venue_order_id.as_ref()
    }

    pub fn trader_id(&self) -> &TraderId {
        &self.trader_id
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    pub fn price(&self) -> Option<Price> {
        self.price
    }

    pub fn trigger_price(&self) -> Option<Price> {
        self.trigger_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn filled_qty(&self) -> Quantity {
        self.filled_qty
    }

    pub fn leaves_qty(&self) -> Quantity {
        self.leaves_qty
    }

    pub fn avg_px(&self) -> Option<Decimal> {
        self.avg_px
    }

    pub fn events(&self) -> &[OrderEvent] {
        &self.events
    }

    pub fn ts_init(&self) -> UnixNanos {
        self.ts_init
    }

    pub fn ts_last(&self) -> UnixNanos {
        self.ts_last
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Apply an event, enforcing the transition table.
    pub fn apply(&mut self, event: OrderEvent) {
        match &event {
            OrderEvent::Initialized(_) => {
                panic!("OrderInitialized is consumed at construction, not applied")
            }
            OrderEvent::Denied(_) => self.transition(OrderStatus::Denied),
            OrderEvent::Submitted(_) => self.transition(OrderStatus::Submitted),
            OrderEvent::Accepted(e) => {
                self.transition(OrderStatus::Accepted);
                self.venue_order_id = Some(e.venue_order_id.clone());
            }
            OrderEvent::Rejected(_) => self.transition(OrderStatus::Rejected),
            OrderEvent::Canceled(_) => self.transition(OrderStatus::Canceled),
            OrderEvent::Expired(_) => self.transition(OrderStatus::Expired),
            OrderEvent::Updated(e) => self.apply_updated(e),
            OrderEvent::Filled(e) => self.apply_filled(e),
        }
        self.ts_last = event.ts_event();
        self.events.push(event);
    }

    fn transition(&mut self, target: OrderStatus) {
        assert!(
            self.status.can_transition_to(target),
            "invalid order state transition: {:?} -> {:?} ({})",
            self.status,
            target,
            self.client_order_id
        );
        self.status = target;
    }

    fn apply_updated(&mut self, event: &OrderUpdated) {
        // Modification applies to working orders only and resolves to Accepted.
        assert!(
            matches!(
                self.status,
                OrderStatus::Accepted | OrderStatus::PendingUpdate | OrderStatus::PendingCancel
            ),
            "invalid order state transition: {:?} -> Accepted ({})",
            self.status,
            self.client_order_id
        );
        if let Some(quantity) = event.quantity {
            assert!(
                quantity >= self.filled_qty,
                "update quantity {quantity} below filled quantity {}",
                self.filled_qty
            );
            self.quantity = quantity;
            self.leaves_qty = quantity - self.filled_qty;
        }
        if event.price.is_some() {
            self.price = event.price;
        }
        if event.trigger_price.is_some() {
            self.trigger_price = event.trigger_price;
        }
        self.status = OrderStatus::Accepted;
    }

    fn apply_filled(&mut self, event: &OrderFilled) {
        assert!(
            event.last_qty <= self.leaves_qty,
            "fill quantity {} exceeds leaves quantity {} ({})",
            event.last_qty,
            self.leaves_qty,
            self.client_order_id
        );

        let new_filled = self.filled_qty + event.last_qty;
        let target = if new_filled == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(target);

        // Weighted-average fill price.
        let prev_filled = self.filled_qty.value();
        let prev_avg = self.avg_px.unwrap_or_default();
        let fill_qty = event.last_qty.value();
        let total = prev_filled + fill_qty;
        if total > Decimal::ZERO {
            self.avg_px =
                Some((prev_avg * prev_filled + event.last_px.value() * fill_qty) / total);
        }

        self.filled_qty = new_filled;
        self.leaves_qty = self.quantity - new_filled;
        self.venue_order_id = Some(event.venue_order_id.clone());
    }
}

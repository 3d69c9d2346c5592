//! Execution engine: order lifecycle coordination and position mutation.
//!
//! Orders flow strategy -> risk gate -> cache -> venue endpoint; events flow
//! back from the venue through the `ExecutionEngine` endpoint, mutate the
//! order and position records in the cache, and fan out on
//! `events.order.{strategy_id}` / `events.position.{strategy_id}`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::cache::Cache;
use crate::engine::RiskEngine;
use crate::enums::OmsType;
use crate::events::{
    OrderEvent, OrderFilled, OrderSubmitted, PositionChanged, PositionClosed, PositionEvent,
    PositionOpened,
};
use crate::identifiers::{ClientOrderId, PositionId, Venue};
use crate::msgbus::{BusMessage, MessageBus, TradingCommand};
use crate::orders::Order;
use crate::position::Position;
use crate::types::{Price, Quantity};

/// Endpoint name venue events are sent to.
pub const ENDPOINT: &str = "ExecutionEngine";

pub struct ExecutionEngine {
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    risk: Rc<RiskEngine>,
    oms_types: RefCell<HashMap<Venue, OmsType>>,
    position_counter: Cell<u64>,
}

impl ExecutionEngine {
    pub fn new(
        cache: Rc<RefCell<Cache>>,
        msgbus: Rc<MessageBus>,
        risk: Rc<RiskEngine>,
    ) -> Rc<Self> {
        let engine = Rc::new(Self {
            cache,
            msgbus,
            risk,
            oms_types: RefCell::new(HashMap::new()),
            position_counter: Cell::new(0),
        });
        let weak = Rc::downgrade(&engine);
        engine.msgbus.register(
            ENDPOINT,
            Rc::new(move |msg| {
                if let BusMessage::Order(event) = msg {
                    if let Some(engine) = weak.upgrade() {
                        engine.process_event(event.clone());
                    }
                }
            }),
        );
        engine
    }

    /// Record the order-management discipline for a venue. The venue's
    /// exchange registers its own `Exchange.{venue}` endpoint.
    pub fn register_venue(&self, venue: Venue, oms_type: OmsType) {
        self.oms_types.borrow_mut().insert(venue, oms_type);
    }

    fn oms_type(&self, venue: &Venue) -> OmsType {
        self.oms_types
            .borrow()
            .get(venue)
            .copied()
            .unwrap_or(OmsType::Netting)
    }

    /// Run the risk gate and route the order to its venue.
    pub fn submit_order(&self, mut order: Order) {
        let venue = order.instrument_id().venue().clone();
        assert!(
            self.oms_types.borrow().contains_key(&venue),
            "no venue registered for {venue}"
        );

        let ts = order.ts_init();
        if let Some(denied) = self.risk.validate_order(&order, ts) {
            // Denied orders are never persisted; the strategy still hears
            // about them on its event topic.
            let strategy_id = order.strategy_id().clone();
            let event = OrderEvent::Denied(denied);
            order.apply(event.clone());
            self.msgbus
                .publish(&format!("events.order.{strategy_id}"), &BusMessage::Order(event));
            return;
        }

        debug!(client_order_id = %order.client_order_id(), "submitting order");
        let event = OrderEvent::Submitted(OrderSubmitted {
            strategy_id: order.strategy_id().clone(),
            instrument_id: order.instrument_id().clone(),
            client_order_id: order.client_order_id().clone(),
            ts_event: ts,
            ts_init: ts,
        });
        order.apply(event.clone());

        let strategy_id = order.strategy_id().clone();
        let client_order_id = order.client_order_id().clone();
        self.cache.borrow_mut().add_order(order);

        self.msgbus
            .publish(&format!("events.order.{strategy_id}"), &BusMessage::Order(event));
        self.msgbus.send(
            &format!("Exchange.{venue}"),
            &BusMessage::Command(TradingCommand::SubmitOrder { client_order_id }),
        );
    }

    /// Forward a cancel to the order's venue.
    pub fn cancel_order(&self, client_order_id: &ClientOrderId) {
        let Some(venue) = self
            .cache
            .borrow()
            .order(client_order_id)
            .map(|o| o.instrument_id().venue().clone())
        else {
            warn!(client_order_id = %client_order_id, "cancel for unknown order dropped");
            return;
        };
        self.msgbus.send(
            &format!("Exchange.{venue}"),
            &BusMessage::Command(TradingCommand::CancelOrder {
                client_order_id: client_order_id.clone(),
            }),
        );
    }

    /// Forward a modification to the order's venue.
    ///
    /// Modification of working orders is not re-validated against the risk
    /// gate; only the filled-quantity floor is enforced here.
    pub fn modify_order(
        &self,
        client_order_id: &ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    ) {
        let (venue, filled_qty) = {
            let cache = self.cache.borrow();
            let Some(order) = cache.order(client_order_id) else {
                warn!(client_order_id = %client_order_id, "modify for unknown order dropped");
                return;
            };
            (order.instrument_id().venue().clone(), order.filled_qty())
        };
        if let Some(quantity) = quantity {
            if quantity < filled_qty {
                warn!(
                    client_order_id = %client_order_id,
                    "modify rejected: new quantity {quantity} below filled {filled_qty}"
                );
                return;
            }
        }
        self.msgbus.send(
            &format!("Exchange.{venue}"),
            &BusMessage::Command(TradingCommand::ModifyOrder {
                client_order_id: client_order_id.clone(),
                quantity,
                price,
                trigger_price,
            }),
        );
    }

    /// Apply a venue-originated event to the order it targets and fan out.
    pub fn process_event(&self, event: OrderEvent) {
        let client_order_id = event.client_order_id().clone();
        let strategy_id = {
            let mut cache = self.cache.borrow_mut();
            let order = cache
                .order_mut(&client_order_id)
                .unwrap_or_else(|| panic!("no order found for {client_order_id}"));
            order.apply(event.clone());
            order.strategy_id().clone()
        };

        self.msgbus.publish(
            &format!("events.order.{strategy_id}"),
            &BusMessage::Order(event.clone()),
        );

        if let OrderEvent::Filled(fill) = event {
            self.handle_fill(fill);
        }
    }

    fn handle_fill(&self, fill: OrderFilled) {
        let venue = fill.instrument_id.venue().clone();
        match self.oms_type(&venue) {
            OmsType::Netting => self.handle_fill_netting(fill),
            OmsType::Hedging => self.handle_fill_hedging(fill),
        }
    }

    fn handle_fill_netting(&self, fill: OrderFilled) {
        // One position per (instrument, strategy).
        let position_id = self
            .cache
            .borrow()
            .positions_open(Some(&fill.instrument_id), Some(&fill.strategy_id))
            .first()
            .map(|p| p.id().clone());

        match position_id {
            Some(position_id) => self.apply_to_position(&position_id, fill),
            None => self.open_position(fill),
        }
    }

    fn handle_fill_hedging(&self, fill: OrderFilled) {
        if let Some(position_id) = fill.position_id.clone() {
            assert!(
                self.cache.borrow().position(&position_id).is_some(),
                "no position found for {position_id}"
            );
            self.apply_to_position(&position_id, fill);
            return;
        }

        let position_id = self
            .cache
            .borrow()
            .positions_open(Some(&fill.instrument_id), None)
            .first()
            .map(|p| p.id().clone());

        match position_id {
            Some(position_id) => self.apply_to_position(&position_id, fill),
            None => self.open_position(fill),
        }
    }

    fn apply_to_position(&self, position_id: &PositionId, fill: OrderFilled) {
        let event = {
            let mut cache = self.cache.borrow_mut();
            let position = cache
                .position_mut(position_id)
                .unwrap_or_else(|| panic!("no position found for {position_id}"));
            let last_px = fill.last_px;
            let ts = fill.ts_event;
            position.apply(fill.clone());

            if position.is_closed() {
                PositionEvent::Closed(PositionClosed {
                    strategy_id: position.strategy_id().clone(),
                    instrument_id: position.instrument_id().clone(),
                    position_id: position_id.clone(),
                    signed_qty: position.signed_qty(),
                    realized_pnl: position.realized_pnl(),
                    last_px,
                    ts_event: ts,
                    ts_init: ts,
                })
            } else {
                PositionEvent::Changed(PositionChanged {
                    strategy_id: position.strategy_id().clone(),
                    instrument_id: position.instrument_id().clone(),
                    position_id: position_id.clone(),
                    position_side: position.side(),
                    signed_qty: position.signed_qty(),
                    quantity: position.quantity(),
                    avg_px_open: position.avg_px_open(),
                    realized_pnl: position.realized_pnl(),
                    last_px,
                    ts_event: ts,
                    ts_init: ts,
                })
            }
        };

        let strategy_id = event.strategy_id().clone();
        self.msgbus.publish(
            &format!("events.position.{strategy_id}"),
            &BusMessage::Position(event),
        );
    }

    fn open_position(&self, fill: OrderFilled) {
        let n = self.position_counter.get() + 1;
        self.position_counter.set(n);
        let position_id = PositionId::new(format!("P-{n}"));

        debug!(position_id = %position_id, instrument_id = %fill.instrument_id, "opening position");
        let last_px = fill.last_px;
        let ts = fill.ts_event;
        let position = Position::new(position_id.clone(), fill);

        let event = PositionEvent::Opened(PositionOpened {
            strategy_id: position.strategy_id().clone(),
            instrument_id: position.instrument_id().clone(),
            position_id,
            position_side: position.side(),
            signed_qty: position.signed_qty(),
            quantity: position.quantity(),
            avg_px_open: position.avg_px_open(),
            last_px,
            ts_event: ts,
            ts_init: ts,
        });

        let strategy_id = position.strategy_id().clone();
        self.cache.borrow_mut().add_position(position);
        self.msgbus.publish(
            &format!("events.position.{strategy_id}"),
            &BusMessage::Position(event),
        );
    }
}

//! Strategy trait and the adapter wiring strategies into the kernel.
//!
//! User strategies implement [`Strategy`] with whatever callbacks they need;
//! every callback has a default no-op body. The [`StrategyActor`] adapter
//! owns the bus subscriptions, feeds registered indicators before `on_bar`,
//! and translates each received event kind into exactly one callback.
//!
//! Events produced while one of the strategy's own callbacks is still on the
//! stack (e.g. `on_bar` submits an order whose `OrderSubmitted` targets this
//! strategy) are queued and delivered, in order, when the outer callback
//! returns. Delivery order is deterministic either way.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::cache::Cache;
use crate::clock::{Clock, TimeEvent};
use crate::data::{Bar, BarType, QuoteTick, TradeTick};
use crate::engine::{DataEngine, ExecutionEngine};
use crate::enums::{OrderSide, PositionSide};
use crate::events::{
    OrderAccepted, OrderCanceled, OrderDenied, OrderEvent, OrderExpired, OrderFilled,
    OrderRejected, OrderSubmitted, OrderUpdated, PositionChanged, PositionClosed, PositionEvent,
    PositionOpened,
};
use crate::identifiers::{ClientOrderId, InstrumentId, StrategyId};
use crate::indicators::Indicator;
use crate::msgbus::{BusMessage, MessageBus};
use crate::order_factory::OrderFactory;
use crate::orders::Order;
use crate::portfolio::Portfolio;
use crate::position::Position;
use crate::types::{Price, Quantity};
use crate::UnixNanos;

/// User strategy logic. Override what you need; defaults do nothing.
#[allow(unused_variables)]
pub trait Strategy: 'static {
    fn strategy_id(&self) -> StrategyId;

    // ── Lifecycle ──

    fn on_start(&mut self, ctx: &StrategyContext) {}
    fn on_stop(&mut self, ctx: &StrategyContext) {}
    fn on_reset(&mut self, ctx: &StrategyContext) {}

    // ── Data ──

    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) {}
    fn on_quote_tick(&mut self, ctx: &StrategyContext, tick: &QuoteTick) {}
    fn on_trade_tick(&mut self, ctx: &StrategyContext, tick: &TradeTick) {}
    fn on_time_event(&mut self, ctx: &StrategyContext, event: &TimeEvent) {}

    // ── Order events ──

    fn on_order_denied(&mut self, ctx: &StrategyContext, event: &OrderDenied) {}
    fn on_order_submitted(&mut self, ctx: &StrategyContext, event: &OrderSubmitted) {}
    fn on_order_accepted(&mut self, ctx: &StrategyContext, event: &OrderAccepted) {}
    fn on_order_rejected(&mut self, ctx: &StrategyContext, event: &OrderRejected) {}
    fn on_order_canceled(&mut self, ctx: &StrategyContext, event: &OrderCanceled) {}
    fn on_order_expired(&mut self, ctx: &StrategyContext, event: &OrderExpired) {}
    fn on_order_updated(&mut self, ctx: &StrategyContext, event: &OrderUpdated) {}
    fn on_order_filled(&mut self, ctx: &StrategyContext, event: &OrderFilled) {}

    // ── Position events ──

    fn on_position_opened(&mut self, ctx: &StrategyContext, event: &PositionOpened) {}
    fn on_position_changed(&mut self, ctx: &StrategyContext, event: &PositionChanged) {}
    fn on_position_closed(&mut self, ctx: &StrategyContext, event: &PositionClosed) {}
}

/// Kernel handles injected at registration time.
pub struct StrategyContext {
    strategy_id: StrategyId,
    clock: Rc<dyn Clock>,
    cache: Rc<RefCell<Cache>>,
    portfolio: Rc<Portfolio>,
    msgbus: Rc<MessageBus>,
    order_factory: Rc<OrderFactory>,
    exec_engine: Rc<ExecutionEngine>,
    data_engine: Rc<DataEngine>,
    actor: Weak<StrategyActor>,
}

impl StrategyContext {
    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    pub fn now_ns(&self) -> UnixNanos {
        self.clock.timestamp_ns()
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn cache(&self) -> &Rc<RefCell<Cache>> {
        &self.cache
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn order_factory(&self) -> &OrderFactory {
        &self.order_factory
    }

    // ── Commands ──

    pub fn submit_order(&self, order: Order) {
        self.exec_engine.submit_order(order);
    }

    pub fn cancel_order(&self, client_order_id: &ClientOrderId) {
        self.exec_engine.cancel_order(client_order_id);
    }

    pub fn modify_order(
        &self,
        client_order_id: &ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    ) {
        self.exec_engine
            .modify_order(client_order_id, quantity, price, trigger_price);
    }

    /// Cancel every open order this strategy has for the instrument.
    pub fn cancel_all_orders(&self, instrument_id: &InstrumentId) {
        let ids: Vec<ClientOrderId> = self
            .cache
            .borrow()
            .orders_open(Some(instrument_id), Some(&self.strategy_id))
            .iter()
            .map(|o| o.client_order_id().clone())
            .collect();
        for id in ids {
            self.exec_engine.cancel_order(&id);
        }
    }

    /// Submit a market order closing the whole position.
    pub fn close_position(&self, position: &Position) {
        if !position.is_open() {
            return;
        }
        let side = match position.side() {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
            PositionSide::Flat => return,
        };
        let order = self.order_factory.market(
            position.instrument_id().clone(),
            side,
            position.quantity(),
            self.clock.timestamp_ns(),
        );
        self.submit_order(order);
    }

    pub fn close_all_positions(&self, instrument_id: &InstrumentId) {
        let positions: Vec<Position> = self
            .cache
            .borrow()
            .positions_open(Some(instrument_id), Some(&self.strategy_id))
            .into_iter()
            .cloned()
            .collect();
        for position in positions {
            self.close_position(&position);
        }
    }

    // ── Subscriptions ──

    pub fn subscribe_bars(&self, bar_type: BarType) {
        let topic = format!("data.bars.{bar_type}");
        if !self.claim_topic(&topic) {
            return;
        }
        self.data_engine.subscribe_bars(bar_type.clone());
        let actor = self.actor.clone();
        self.msgbus.subscribe(
            &topic,
            Rc::new(move |msg| {
                if let BusMessage::Bar(bar) = msg {
                    if let Some(actor) = actor.upgrade() {
                        actor.deliver(ActorMessage::Bar(bar.clone()));
                    }
                }
            }),
        );
    }

    pub fn subscribe_quote_ticks(&self, instrument_id: InstrumentId) {
        let topic = format!("data.quotes.{instrument_id}");
        if !self.claim_topic(&topic) {
            return;
        }
        self.data_engine.subscribe_quote_ticks(instrument_id.clone());
        let actor = self.actor.clone();
        self.msgbus.subscribe(
            &topic,
            Rc::new(move |msg| {
                if let BusMessage::Quote(tick) = msg {
                    if let Some(actor) = actor.upgrade() {
                        actor.deliver(ActorMessage::Quote(tick.clone()));
                    }
                }
            }),
        );
    }

    pub fn subscribe_trade_ticks(&self, instrument_id: InstrumentId) {
        let topic = format!("data.trades.{instrument_id}");
        if !self.claim_topic(&topic) {
            return;
        }
        self.data_engine.subscribe_trade_ticks(instrument_id.clone());
        let actor = self.actor.clone();
        self.msgbus.subscribe(
            &topic,
            Rc::new(move |msg| {
                if let BusMessage::Trade(tick) = msg {
                    if let Some(actor) = actor.upgrade() {
                        actor.deliver(ActorMessage::Trade(tick.clone()));
                    }
                }
            }),
        );
    }

    /// Record a data topic as subscribed; returns false when the strategy
    /// already listens on it (repeated `on_start` across runs must not
    /// double-deliver).
    fn claim_topic(&self, topic: &str) -> bool {
        let Some(actor) = self.actor.upgrade() else {
            return false;
        };
        let mut topics = actor.data_topics.borrow_mut();
        if topics.iter().any(|t| t == topic) {
            return false;
        }
        topics.push(topic.to_string());
        true
    }

    /// Register an indicator to be fed every bar of `bar_type`, in
    /// registration order, before `on_bar` runs.
    pub fn register_indicator_for_bars(
        &self,
        bar_type: BarType,
        indicator: Rc<RefCell<dyn Indicator>>,
    ) {
        if let Some(actor) = self.actor.upgrade() {
            actor.indicators.borrow_mut().push((bar_type, indicator));
        }
    }

    /// Install a named timer whose events arrive via `on_time_event`.
    pub fn set_timer(&self, name: &str, interval_ns: i64, stop_time_ns: Option<UnixNanos>) {
        let actor = self.actor.clone();
        self.clock.set_timer(
            name,
            interval_ns,
            None,
            stop_time_ns,
            Rc::new(move |event| {
                if let Some(actor) = actor.upgrade() {
                    actor.deliver(ActorMessage::Time(event.clone()));
                }
            }),
        );
    }

    pub fn cancel_timer(&self, name: &str) {
        self.clock.cancel_timer(name);
    }
}

enum ActorMessage {
    Start,
    Stop,
    Reset,
    Bar(Bar),
    Quote(QuoteTick),
    Trade(TradeTick),
    Order(OrderEvent),
    Position(PositionEvent),
    Time(TimeEvent),
}

/// Adapter owning one strategy instance and its pending-event queue.
pub struct StrategyActor {
    strategy: RefCell<Box<dyn Strategy>>,
    ctx: StrategyContext,
    indicators: RefCell<Vec<(BarType, Rc<RefCell<dyn Indicator>>)>>,
    data_topics: RefCell<Vec<String>>,
    pending: RefCell<VecDeque<ActorMessage>>,
}

impl StrategyActor {
    /// Wire a strategy into the kernel: build its context and order factory
    /// and subscribe it to its own order/position event topics.
    pub fn register(
        strategy: Box<dyn Strategy>,
        clock: Rc<dyn Clock>,
        cache: Rc<RefCell<Cache>>,
        portfolio: Rc<Portfolio>,
        msgbus: Rc<MessageBus>,
        exec_engine: Rc<ExecutionEngine>,
        data_engine: Rc<DataEngine>,
    ) -> Rc<Self> {
        let strategy_id = strategy.strategy_id();
        let order_factory = Rc::new(OrderFactory::new(
            msgbus.trader_id().clone(),
            strategy_id.clone(),
        ));

        let actor = Rc::new_cyclic(|weak: &Weak<StrategyActor>| StrategyActor {
            strategy: RefCell::new(strategy),
            ctx: StrategyContext {
                strategy_id: strategy_id.clone(),
                clock,
                cache,
                portfolio,
                msgbus: Rc::clone(&msgbus),
                order_factory,
                exec_engine,
                data_engine,
                actor: weak.clone(),
            },
            indicators: RefCell::new(Vec::new()),
            data_topics: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
        });

        let weak = Rc::downgrade(&actor);
        msgbus.subscribe(
            &format!("events.order.{strategy_id}"),
            Rc::new(move |msg| {
                if let BusMessage::Order(event) = msg {
                    if let Some(actor) = weak.upgrade() {
                        actor.deliver(ActorMessage::Order(event.clone()));
                    }
                }
            }),
        );
        let weak = Rc::downgrade(&actor);
        msgbus.subscribe(
            &format!("events.position.{strategy_id}"),
            Rc::new(move |msg| {
                if let BusMessage::Position(event) = msg {
                    if let Some(actor) = weak.upgrade() {
                        actor.deliver(ActorMessage::Position(event.clone()));
                    }
                }
            }),
        );

        actor
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.ctx.strategy_id
    }

    pub fn ctx(&self) -> &StrategyContext {
        &self.ctx
    }

    pub fn start(&self) {
        self.deliver(ActorMessage::Start);
    }

    pub fn stop(&self) {
        self.deliver(ActorMessage::Stop);
    }

    pub fn reset(&self) {
        for (_, indicator) in self.indicators.borrow().iter() {
            indicator.borrow_mut().reset();
        }
        self.ctx.order_factory.reset();
        self.deliver(ActorMessage::Reset);
    }

    /// Deliver a message, or queue it if one of this strategy's callbacks is
    /// already executing; the outer call drains the queue in order.
    fn deliver(&self, msg: ActorMessage) {
        self.pending.borrow_mut().push_back(msg);
        let Ok(mut strategy) = self.strategy.try_borrow_mut() else {
            return;
        };
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(msg) => self.dispatch(strategy.as_mut(), msg),
                None => break,
            }
        }
    }

    fn dispatch(&self, strategy: &mut dyn Strategy, msg: ActorMessage) {
        match msg {
            ActorMessage::Start => strategy.on_start(&self.ctx),
            ActorMessage::Stop => strategy.on_stop(&self.ctx),
            ActorMessage::Reset => strategy.on_reset(&self.ctx),
            ActorMessage::Bar(bar) => {
                // Indicators first, in registration order; collect so the
                // registry borrow is released before user code runs.
                let matching: Vec<Rc<RefCell<dyn Indicator>>> = self
                    .indicators
                    .borrow()
                    .iter()
                    .filter(|(bt, _)| *bt == bar.bar_type)
                    .map(|(_, ind)| Rc::clone(ind))
                    .collect();
                for indicator in matching {
                    indicator.borrow_mut().handle_bar(&bar);
                }
                strategy.on_bar(&self.ctx, &bar);
            }
            ActorMessage::Quote(tick) => strategy.on_quote_tick(&self.ctx, &tick),
            ActorMessage::Trade(tick) => strategy.on_trade_tick(&self.ctx, &tick),
            ActorMessage::Time(event) => strategy.on_time_event(&self.ctx, &event),
            ActorMessage::Order(event) => match event {
                OrderEvent::Initialized(_) => {}
                OrderEvent::Denied(e) => strategy.on_order_denied(&self.ctx, &e),
                OrderEvent::Submitted(e) => strategy.on_order_submitted(&self.ctx, &e),
                OrderEvent::Accepted(e) => strategy.on_order_accepted(&self.ctx, &e),
                OrderEvent::Rejected(e) => strategy.on_order_rejected(&self.ctx, &e),
                OrderEvent::Canceled(e) => strategy.on_order_canceled(&self.ctx, &e),
                OrderEvent::Expired(e) => strategy.on_order_expired(&self.ctx, &e),
                OrderEvent::Updated(e) => strategy.on_order_updated(&self.ctx, &e),
                OrderEvent::Filled(e) => strategy.on_order_filled(&self.ctx, &e),
            },
            ActorMessage::Position(event) => match event {
                PositionEvent::Opened(e) => strategy.on_position_opened(&self.ctx, &e),
                PositionEvent::Changed(e) => strategy.on_position_changed(&self.ctx, &e),
                PositionEvent::Closed(e) => strategy.on_position_closed(&self.ctx, &e),
            },
        }
    }
}

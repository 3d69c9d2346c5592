//! Data engine: routes market data into the cache and out to subscribers.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::cache::Cache;
use crate::data::{Bar, BarType, QuoteTick, TradeTick};
use crate::identifiers::InstrumentId;
use crate::msgbus::{BusMessage, MessageBus};

/// Thin router: every record is appended to the cache's typed series and
/// then published on its `data.*` topic. Subscription intents are registered
/// here so the engine knows which series are live.
pub struct DataEngine {
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    bar_subscriptions: RefCell<Vec<BarType>>,
    quote_subscriptions: RefCell<Vec<InstrumentId>>,
    trade_subscriptions: RefCell<Vec<InstrumentId>>,
}

impl DataEngine {
    pub fn new(cache: Rc<RefCell<Cache>>, msgbus: Rc<MessageBus>) -> Self {
        Self {
            cache,
            msgbus,
            bar_subscriptions: RefCell::new(Vec::new()),
            quote_subscriptions: RefCell::new(Vec::new()),
            trade_subscriptions: RefCell::new(Vec::new()),
        }
    }

    pub fn subscribe_bars(&self, bar_type: BarType) {
        let mut subs = self.bar_subscriptions.borrow_mut();
        if !subs.contains(&bar_type) {
            debug!(bar_type = %bar_type, "subscribing bars");
            subs.push(bar_type);
        }
    }

    pub fn unsubscribe_bars(&self, bar_type: &BarType) {
        self.bar_subscriptions.borrow_mut().retain(|b| b != bar_type);
    }

    pub fn subscribe_quote_ticks(&self, instrument_id: InstrumentId) {
        let mut subs = self.quote_subscriptions.borrow_mut();
        if !subs.contains(&instrument_id) {
            subs.push(instrument_id);
        }
    }

    pub fn unsubscribe_quote_ticks(&self, instrument_id: &InstrumentId) {
        self.quote_subscriptions
            .borrow_mut()
            .retain(|i| i != instrument_id);
    }

    pub fn subscribe_trade_ticks(&self, instrument_id: InstrumentId) {
        let mut subs = self.trade_subscriptions.borrow_mut();
        if !subs.contains(&instrument_id) {
            subs.push(instrument_id);
        }
    }

    pub fn unsubscribe_trade_ticks(&self, instrument_id: &InstrumentId) {
        self.trade_subscriptions
            .borrow_mut()
            .retain(|i| i != instrument_id);
    }

    pub fn bar_subscriptions(&self) -> Vec<BarType> {
        self.bar_subscriptions.borrow().clone()
    }

    pub fn process_bar(&self, bar: Bar) {
        let topic = format!("data.bars.{}", bar.bar_type);
        self.cache.borrow_mut().add_bar(bar.clone());
        self.msgbus.publish(&topic, &BusMessage::Bar(bar));
    }

    pub fn process_quote_tick(&self, tick: QuoteTick) {
        let topic = format!("data.quotes.{}", tick.instrument_id);
        self.cache.borrow_mut().add_quote_tick(tick.clone());
        self.msgbus.publish(&topic, &BusMessage::Quote(tick));
    }

    pub fn process_trade_tick(&self, tick: TradeTick) {
        let topic = format!("data.trades.{}", tick.instrument_id);
        self.cache.borrow_mut().add_trade_tick(tick.clone());
        self.msgbus.publish(&topic, &BusMessage::Trade(tick));
    }
}

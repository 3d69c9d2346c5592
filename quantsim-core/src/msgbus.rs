//! Synchronous message bus: topic pub/sub plus point-to-point endpoints.
//!
//! Delivery is immediate and on the caller's stack. `publish` snapshots the
//! subscriber list before dispatch, so a handler that subscribes or
//! unsubscribes mid-publish never affects the iteration in progress.
//!
//! Topic grammar:
//! - `data.bars.{bar_type}` / `data.quotes.{instrument_id}` / `data.trades.{instrument_id}`
//! - `events.order.{strategy_id}` / `events.position.{strategy_id}`
//!
//! Endpoints: `Exchange.{venue}` for order commands, `ExecutionEngine` for
//! venue-originated events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::data::{Bar, QuoteTick, TradeTick};
use crate::events::{OrderEvent, PositionEvent};
use crate::identifiers::{ClientOrderId, TraderId};
use crate::types::{Price, Quantity};

/// Commands routed to venue endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradingCommand {
    SubmitOrder {
        client_order_id: ClientOrderId,
    },
    CancelOrder {
        client_order_id: ClientOrderId,
    },
    ModifyOrder {
        client_order_id: ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    },
}

/// Everything that travels over the bus, in one closed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BusMessage {
    Bar(Bar),
    Quote(QuoteTick),
    Trade(TradeTick),
    Order(OrderEvent),
    Position(PositionEvent),
    Command(TradingCommand),
}

pub type Handler = Rc<dyn Fn(&BusMessage)>;

/// Identifies one subscription for later removal.
///
/// Closures have no identity in Rust, so `unsubscribe` takes the token
/// returned by `subscribe` instead of the handler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

struct Subscription {
    token: SubscriptionToken,
    handler: Handler,
}

/// Single-threaded synchronous bus. Interior mutability keeps every method
/// on `&self` so components can hold plain `Rc<MessageBus>` handles.
pub struct MessageBus {
    trader_id: TraderId,
    subscriptions: RefCell<HashMap<String, Vec<Subscription>>>,
    endpoints: RefCell<HashMap<String, Handler>>,
    next_token: Cell<u64>,
}

impl MessageBus {
    pub fn new(trader_id: TraderId) -> Self {
        Self {
            trader_id,
            subscriptions: RefCell::new(HashMap::new()),
            endpoints: RefCell::new(HashMap::new()),
            next_token: Cell::new(0),
        }
    }

    pub fn trader_id(&self) -> &TraderId {
        &self.trader_id
    }

    /// Append `handler` to the topic's subscriber list.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.get());
        self.next_token.set(token.0 + 1);
        self.subscriptions
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push(Subscription { token, handler });
        token
    }

    pub fn unsubscribe(&self, topic: &str, token: SubscriptionToken) {
        if let Some(subs) = self.subscriptions.borrow_mut().get_mut(topic) {
            subs.retain(|s| s.token != token);
        }
    }

    /// Deliver `msg` to every current subscriber of `topic`, in
    /// subscription order, before returning.
    pub fn publish(&self, topic: &str, msg: &BusMessage) {
        let snapshot: Vec<Handler> = match self.subscriptions.borrow().get(topic) {
            Some(subs) => subs.iter().map(|s| Rc::clone(&s.handler)).collect(),
            None => return,
        };
        for handler in snapshot {
            handler(msg);
        }
    }

    /// Register the endpoint's single handler, replacing any previous one.
    pub fn register(&self, endpoint: &str, handler: Handler) {
        self.endpoints
            .borrow_mut()
            .insert(endpoint.to_string(), handler);
    }

    pub fn deregister(&self, endpoint: &str) {
        self.endpoints.borrow_mut().remove(endpoint);
    }

    /// Send to a 1-to-1 endpoint. Sending to an unregistered endpoint is a
    /// no-op.
    pub fn send(&self, endpoint: &str, msg: &BusMessage) {
        let handler = self.endpoints.borrow().get(endpoint).map(Rc::clone);
        if let Some(handler) = handler {
            handler(msg);
        }
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscriptions
            .borrow()
            .get(topic)
            .is_some_and(|subs| !subs.is_empty())
    }

    /// Topics with at least one subscriber, sorted for determinism.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }

    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> =
            self.endpoints.borrow().keys().cloned().collect();
        endpoints.sort();
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> Rc<MessageBus> {
        Rc::new(MessageBus::new(TraderId::new("TRADER-001")))
    }

    fn msg(n: u64) -> BusMessage {
        BusMessage::Command(TradingCommand::SubmitOrder {
            client_order_id: ClientOrderId::new(format!("O-{n}")),
        })
    }

    #[test]
    fn test_publish_delivers_in_subscription_order() {
        let bus = bus();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let log_a = Rc::clone(&log);
        bus.subscribe("data.bars.X", Rc::new(move |_| log_a.borrow_mut().push("a")));
        let log_b = Rc::clone(&log);
        bus.subscribe("data.bars.X", Rc::new(move |_| log_b.borrow_mut().push("b")));

        bus.publish("data.bars.X", &msg(1));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe_by_token() {
        let bus = bus();
        let count = Rc::new(Cell::new(0u32));

        let count_inner = Rc::clone(&count);
        let token = bus.subscribe("t", Rc::new(move |_| count_inner.set(count_inner.get() + 1)));

        bus.publish("t", &msg(1));
        bus.unsubscribe("t", token);
        bus.publish("t", &msg(2));

        assert_eq!(count.get(), 1);
        assert!(!bus.has_subscribers("t"));
    }

    #[test]
    fn test_subscribe_during_publish_misses_current_message() {
        let bus = bus();
        let count = Rc::new(Cell::new(0u32));

        let bus_inner = Rc::clone(&bus);
        let count_inner = Rc::clone(&count);
        bus.subscribe(
            "t",
            Rc::new(move |_| {
                let count_late = Rc::clone(&count_inner);
                bus_inner.subscribe("t", Rc::new(move |_| count_late.set(count_late.get() + 1)));
            }),
        );

        bus.publish("t", &msg(1));
        assert_eq!(count.get(), 0, "late subscriber must not see the in-flight message");

        bus.publish("t", &msg(2));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_unsubscribe_during_publish_still_delivers_snapshot() {
        let bus = bus();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let second_token: Rc<RefCell<Option<SubscriptionToken>>> = Rc::new(RefCell::new(None));

        let bus_inner = Rc::clone(&bus);
        let token_ref = Rc::clone(&second_token);
        let log_a = Rc::clone(&log);
        bus.subscribe(
            "t",
            Rc::new(move |_| {
                log_a.borrow_mut().push("a");
                if let Some(token) = *token_ref.borrow() {
                    bus_inner.unsubscribe("t", token);
                }
            }),
        );
        let log_b = Rc::clone(&log);
        let token = bus.subscribe("t", Rc::new(move |_| log_b.borrow_mut().push("b")));
        *second_token.borrow_mut() = Some(token);

        // First publish: "a" unsubscribes "b", but the snapshot still delivers it.
        bus.publish("t", &msg(1));
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        // Second publish: "b" is gone.
        bus.publish("t", &msg(2));
        assert_eq!(*log.borrow(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_send_to_unregistered_endpoint_is_noop() {
        let bus = bus();
        bus.send("Exchange.SIM", &msg(1));
    }

    #[test]
    fn test_endpoint_at_most_one_handler() {
        let bus = bus();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let log_a = Rc::clone(&log);
        bus.register("ExecutionEngine", Rc::new(move |_| log_a.borrow_mut().push("a")));
        let log_b = Rc::clone(&log);
        bus.register("ExecutionEngine", Rc::new(move |_| log_b.borrow_mut().push("b")));

        bus.send("ExecutionEngine", &msg(1));
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn test_topics_sorted() {
        let bus = bus();
        bus.subscribe("b.topic", Rc::new(|_| {}));
        bus.subscribe("a.topic", Rc::new(|_| {}));
        assert_eq!(bus.topics(), vec!["a.topic".to_string(), "b.topic".to_string()]);
    }
}

//! Simulated exchange: one per venue.
//!
//! Owns the venue account, a matching engine per instrument, and the fee
//! policy. Commands arrive on the `Exchange.{venue}` bus endpoint; order
//! events leave through the `ExecutionEngine` endpoint.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use quantsim_core::account::Account;
use quantsim_core::cache::{Cache, CacheError};
use quantsim_core::data::Bar;
use quantsim_core::engine::execution::ENDPOINT as EXEC_ENDPOINT;
use quantsim_core::enums::{AccountType, LiquiditySide, OmsType, OrderSide};
use quantsim_core::events::{
    OrderAccepted, OrderCanceled, OrderEvent, OrderFilled, OrderUpdated,
};
use quantsim_core::identifiers::{
    AccountId, ClientOrderId, InstrumentId, TradeId, Venue, VenueOrderId,
};
use quantsim_core::msgbus::{BusMessage, MessageBus, TradingCommand};
use quantsim_core::types::{Currency, Money, Price, Quantity};
use quantsim_core::UnixNanos;

use crate::matching::MatchingEngine;

pub struct SimulatedExchange {
    venue: Venue,
    oms_type: OmsType,
    account_id: AccountId,
    base_currency: Currency,
    msgbus: Rc<MessageBus>,
    cache: Rc<RefCell<Cache>>,
    matching: RefCell<HashMap<InstrumentId, MatchingEngine>>,
    venue_order_counter: Cell<u64>,
    trade_counter: Cell<u64>,
}

impl SimulatedExchange {
    /// Create the exchange, its account (cached under the venue), and its
    /// `Exchange.{venue}` endpoint.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue: Venue,
        oms_type: OmsType,
        account_type: AccountType,
        base_currency: Currency,
        starting_balances: Vec<Money>,
        default_leverage: Decimal,
        msgbus: Rc<MessageBus>,
        cache: Rc<RefCell<Cache>>,
    ) -> Result<Rc<Self>, CacheError> {
        let account_id = AccountId::new(format!("{venue}-001"));
        let account = match account_type {
            AccountType::Cash => {
                Account::cash(account_id.clone(), base_currency.clone(), starting_balances)
            }
            AccountType::Margin => Account::margin(
                account_id.clone(),
                base_currency.clone(),
                starting_balances,
                default_leverage,
            ),
        };
        cache.borrow_mut().add_account(venue.clone(), account)?;

        info!(venue = %venue, oms = ?oms_type, account = ?account_type, "venue created");
        let exchange = Rc::new(Self {
            venue: venue.clone(),
            oms_type,
            account_id,
            base_currency,
            msgbus: Rc::clone(&msgbus),
            cache,
            matching: RefCell::new(HashMap::new()),
            venue_order_counter: Cell::new(0),
            trade_counter: Cell::new(0),
        });

        let weak = Rc::downgrade(&exchange);
        msgbus.register(
            &format!("Exchange.{venue}"),
            Rc::new(move |msg| {
                if let BusMessage::Command(command) = msg {
                    if let Some(exchange) = weak.upgrade() {
                        exchange.handle_command(command.clone());
                    }
                }
            }),
        );

        Ok(exchange)
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub fn oms_type(&self) -> OmsType {
        self.oms_type
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn base_currency(&self) -> &Currency {
        &self.base_currency
    }

    pub fn open_order_count(&self) -> usize {
        self.matching
            .borrow()
            .values()
            .map(|m| m.open_order_count())
            .sum()
    }

    /// Create the matching engine for an instrument listed on this venue.
    pub fn register_instrument(&self, instrument_id: InstrumentId) {
        self.matching
            .borrow_mut()
            .entry(instrument_id.clone())
            .or_insert_with(|| MatchingEngine::new(instrument_id));
    }

    fn handle_command(&self, command: TradingCommand) {
        match command {
            TradingCommand::SubmitOrder { client_order_id } => {
                self.process_order(&client_order_id)
            }
            TradingCommand::CancelOrder { client_order_id } => {
                self.cancel_order(&client_order_id)
            }
            TradingCommand::ModifyOrder {
                client_order_id,
                quantity,
                price,
                trigger_price,
            } => self.modify_order(&client_order_id, quantity, price, trigger_price),
        }
    }

    /// Assign a venue order id, emit `OrderAccepted`, and put the order on
    /// its instrument's book.
    pub fn process_order(&self, client_order_id: &ClientOrderId) {
        let (strategy_id, instrument_id, ts) = {
            let cache = self.cache.borrow();
            let order = cache
                .order(client_order_id)
                .unwrap_or_else(|| panic!("no order found for {client_order_id}"));
            (
                order.strategy_id().clone(),
                order.instrument_id().clone(),
                order.ts_init(),
            )
        };

        let n = self.venue_order_counter.get() + 1;
        self.venue_order_counter.set(n);
        let venue_order_id = VenueOrderId::new(format!("V-{}-{n}", self.venue));

        debug!(client_order_id = %client_order_id, venue_order_id = %venue_order_id, "order accepted");
        self.msgbus.send(
            EXEC_ENDPOINT,
            &BusMessage::Order(OrderEvent::Accepted(OrderAccepted {
                strategy_id,
                instrument_id: instrument_id.clone(),
                client_order_id: client_order_id.clone(),
                venue_order_id,
                account_id: self.account_id.clone(),
                ts_event: ts,
                ts_init: ts,
            })),
        );

        self.matching
            .borrow_mut()
            .entry(instrument_id.clone())
            .or_insert_with(|| MatchingEngine::new(instrument_id))
            .add_order(client_order_id.clone());
    }

    /// Remove from the book and emit `OrderCanceled` if the order was open.
    pub fn cancel_order(&self, client_order_id: &ClientOrderId) {
        let Some((strategy_id, instrument_id, venue_order_id, ts)) = ({
            let cache = self.cache.borrow();
            cache.order(client_order_id).map(|o| {
                (
                    o.strategy_id().clone(),
                    o.instrument_id().clone(),
                    o.venue_order_id().cloned(),
                    o.ts_last(),
                )
            })
        }) else {
            return;
        };

        let removed = self
            .matching
            .borrow_mut()
            .get_mut(&instrument_id)
            .map(|m| m.remove_order(client_order_id))
            .unwrap_or(false);
        if !removed {
            return;
        }

        self.msgbus.send(
            EXEC_ENDPOINT,
            &BusMessage::Order(OrderEvent::Canceled(OrderCanceled {
                strategy_id,
                instrument_id,
                client_order_id: client_order_id.clone(),
                venue_order_id,
                ts_event: ts,
                ts_init: ts,
            })),
        );
    }

    /// Emit `OrderUpdated` with the replacement values.
    pub fn modify_order(
        &self,
        client_order_id: &ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    ) {
        let Some((strategy_id, instrument_id, venue_order_id, ts)) = ({
            let cache = self.cache.borrow();
            cache.order(client_order_id).map(|o| {
                (
                    o.strategy_id().clone(),
                    o.instrument_id().clone(),
                    o.venue_order_id().cloned(),
                    o.ts_last(),
                )
            })
        }) else {
            return;
        };

        self.msgbus.send(
            EXEC_ENDPOINT,
            &BusMessage::Order(OrderEvent::Updated(OrderUpdated {
                strategy_id,
                instrument_id,
                client_order_id: client_order_id.clone(),
                venue_order_id,
                quantity,
                price,
                trigger_price,
                ts_event: ts,
                ts_init: ts,
            })),
        );
    }

    /// Resolve open orders on the bar's instrument and settle the fills.
    pub fn process_bar(&self, bar: &Bar) {
        let decisions = {
            let cache = self.cache.borrow();
            match self.matching.borrow_mut().get_mut(bar.instrument_id()) {
                Some(engine) => engine.process_bar(bar, &cache),
                None => return,
            }
        };

        for decision in decisions {
            self.fill_order(&decision.client_order_id, decision.price, bar.ts_event);
        }
    }

    fn fill_order(&self, client_order_id: &ClientOrderId, fill_px: Price, ts: UnixNanos) {
        let (fill, notional, commission_amount, quote_currency) = {
            let cache = self.cache.borrow();
            let order = cache
                .order(client_order_id)
                .unwrap_or_else(|| panic!("no order found for {client_order_id}"));
            let instrument = cache
                .instrument(order.instrument_id())
                .unwrap_or_else(|| panic!("no instrument found for {}", order.instrument_id()));

            let fill_qty = order.leaves_qty();
            let notional = fill_qty.value() * fill_px.value() * instrument.multiplier();
            let commission_amount = notional * instrument.taker_fee();
            let quote_currency = instrument.quote_currency().clone();
            let commission = Money::new(commission_amount, quote_currency.clone());

            let n = self.trade_counter.get() + 1;
            self.trade_counter.set(n);
            let trade_id = TradeId::new(format!("T-{}-{n}", self.venue));

            let venue_order_id = order
                .venue_order_id()
                .cloned()
                .unwrap_or_else(|| panic!("order {client_order_id} filled before acceptance"));

            let fill = OrderFilled {
                strategy_id: order.strategy_id().clone(),
                instrument_id: order.instrument_id().clone(),
                client_order_id: client_order_id.clone(),
                venue_order_id,
                account_id: self.account_id.clone(),
                trade_id,
                position_id: None,
                order_side: order.side(),
                order_kind: order.kind(),
                last_qty: fill_qty,
                last_px: fill_px,
                currency: quote_currency.clone(),
                commission,
                liquidity_side: LiquiditySide::Taker,
                ts_event: ts,
                ts_init: ts,
            };
            (fill, notional, commission_amount, quote_currency)
        };

        self.settle(&fill, notional, commission_amount, &quote_currency);

        debug!(
            client_order_id = %client_order_id,
            px = %fill_px,
            qty = %fill.last_qty,
            "order filled"
        );
        self.msgbus
            .send(EXEC_ENDPOINT, &BusMessage::Order(OrderEvent::Filled(fill)));
    }

    /// Apply the fill's signed notional and commission to the account in
    /// the instrument's quote currency. A currency with no balance entry
    /// starts from zero; there is no conversion.
    fn settle(
        &self,
        fill: &OrderFilled,
        notional: Decimal,
        commission_amount: Decimal,
        currency: &Currency,
    ) {
        let signed_notional = match fill.order_side {
            OrderSide::Buy => -notional,
            OrderSide::Sell => notional,
        };

        let mut cache = self.cache.borrow_mut();
        let account = cache
            .account_for_venue_mut(&self.venue)
            .unwrap_or_else(|| panic!("no account found for venue {}", self.venue));

        let (old_total, locked) = account
            .balance(currency)
            .map(|b| (b.total().amount(), b.locked().amount()))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        let new_total = old_total + signed_notional - commission_amount;
        account.update_balance(currency, new_total, locked);
        account.update_commissions(currency, commission_amount);
    }
}

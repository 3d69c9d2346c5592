//! Event records for orders, positions, and accounts.
//!
//! Events are plain records with a kind discriminator (the enum variant).
//! Orders mutate exclusively by applying these events; the engines publish
//! them on `events.order.{strategy_id}` / `events.position.{strategy_id}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    LiquiditySide, OrderKind, OrderSide, PositionSide, TimeInForce,
};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
    VenueOrderId,
};
use crate::types::{AccountBalance, Currency, Money, Price, Quantity};
use crate::UnixNanos;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInitialized {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub order_side: OrderSide,
    pub order_kind: OrderKind,
    pub quantity: Quantity,
    pub time_in_force: TimeInForce,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDenied {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub reason: String,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub reason: String,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdated {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub quantity: Option<Quantity>,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFilled {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
    pub trade_id: TradeId,
    pub position_id: Option<PositionId>,
    pub order_side: OrderSide,
    pub order_kind: OrderKind,
    pub last_qty: Quantity,
    pub last_px: Price,
    pub currency: Currency,
    pub commission: Money,
    pub liquidity_side: LiquiditySide,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

/// Any order event, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Initialized(OrderInitialized),
    Denied(OrderDenied),
    Submitted(OrderSubmitted),
    Accepted(OrderAccepted),
    Rejected(OrderRejected),
    Canceled(OrderCanceled),
    Expired(OrderExpired),
    Updated(OrderUpdated),
    Filled(OrderFilled),
}

impl OrderEvent {
    pub fn client_order_id(&self) -> &ClientOrderId {
        match self {
            OrderEvent::Initialized(e) => &e.client_order_id,
            OrderEvent::Denied(e) => &e.client_order_id,
            OrderEvent::Submitted(e) => &e.client_order_id,
            OrderEvent::Accepted(e) => &e.client_order_id,
            OrderEvent::Rejected(e) => &e.client_order_id,
            OrderEvent::Canceled(e) => &e.client_order_id,
            OrderEvent::Expired(e) => &e.client_order_id,
            OrderEvent::Updated(e) => &e.client_order_id,
            OrderEvent::Filled(e) => &e.client_order_id,
        }
    }

    pub fn strategy_id(&self) -> &StrategyId {
        match self {
            OrderEvent::Initialized(e) => &e.strategy_id,
            OrderEvent::Denied(e) => &e.strategy_id,
            OrderEvent::Submitted(e) => &e.strategy_id,
            OrderEvent::Accepted(e) => &e.strategy_id,
            OrderEvent::Rejected(e) => &e.strategy_id,
            OrderEvent::Canceled(e) => &e.strategy_id,
            OrderEvent::Expired(e) => &e.strategy_id,
            OrderEvent::Updated(e) => &e.strategy_id,
            OrderEvent::Filled(e) => &e.strategy_id,
        }
    }

    pub fn ts_event(&self) -> UnixNanos {
        match self {
            OrderEvent::Initialized(e) => e.ts_event,
            OrderEvent::Denied(e) => e.ts_event,
            OrderEvent::Submitted(e) => e.ts_event,
            OrderEvent::Accepted(e) => e.ts_event,
            OrderEvent::Rejected(e) => e.ts_event,
            OrderEvent::Canceled(e) => e.ts_event,
            OrderEvent::Expired(e) => e.ts_event,
            OrderEvent::Updated(e) => e.ts_event,
            OrderEvent::Filled(e) => e.ts_event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOpened {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub position_side: PositionSide,
    pub signed_qty: Decimal,
    pub quantity: Quantity,
    pub avg_px_open: Decimal,
    pub last_px: Price,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChanged {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub position_side: PositionSide,
    pub signed_qty: Decimal,
    pub quantity: Quantity,
    pub avg_px_open: Decimal,
    pub realized_pnl: Decimal,
    pub last_px: Price,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClosed {
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub signed_qty: Decimal,
    pub realized_pnl: Decimal,
    pub last_px: Price,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

/// Any position event, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionEvent {
    Opened(PositionOpened),
    Changed(PositionChanged),
    Closed(PositionClosed),
}

impl PositionEvent {
    pub fn position_id(&self) -> &PositionId {
        match self {
            PositionEvent::Opened(e) => &e.position_id,
            PositionEvent::Changed(e) => &e.position_id,
            PositionEvent::Closed(e) => &e.position_id,
        }
    }

    pub fn strategy_id(&self) -> &StrategyId {
        match self {
            PositionEvent::Opened(e) => &e.strategy_id,
            PositionEvent::Changed(e) => &e.strategy_id,
            PositionEvent::Closed(e) => &e.strategy_id,
        }
    }
}

/// Snapshot of account balances after a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub account_id: AccountId,
    pub balances: Vec<AccountBalance>,
    pub ts_event: UnixNanos,
    pub ts_init: UnixNanos,
}

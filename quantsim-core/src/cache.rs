//! In-memory state store.
//!
//! The cache owns every entity record: instruments, accounts, orders,
//! positions, and the market-data series. Engines reference entities by
//! identifier and look them up here; nothing holds direct pointers between
//! records. Insertion-ordered id lists back every multi-entity query so
//! iteration order never depends on hash state.

use std::collections::HashMap;

use thiserror::Error;

use crate::account::Account;
use crate::data::{Bar, BarType, QuoteTick, TradeTick};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, Venue,
};
use crate::instruments::Instrument;
use crate::orders::Order;
use crate::position::Position;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("instrument {0} already registered")]
    DuplicateInstrument(InstrumentId),

    #[error("account already registered for venue {0}")]
    DuplicateAccount(Venue),
}

#[derive(Default)]
pub struct Cache {
    instruments: HashMap<InstrumentId, Instrument>,
    instrument_ids: Vec<InstrumentId>,

    accounts: HashMap<AccountId, Account>,
    account_ids: Vec<AccountId>,
    accounts_by_venue: HashMap<Venue, AccountId>,

    orders: HashMap<ClientOrderId, Order>,
    order_ids: Vec<ClientOrderId>,
    orders_by_venue: HashMap<Venue, Vec<ClientOrderId>>,
    orders_by_strategy: HashMap<StrategyId, Vec<ClientOrderId>>,
    orders_by_instrument: HashMap<InstrumentId, Vec<ClientOrderId>>,

    positions: HashMap<PositionId, Position>,
    position_ids: Vec<PositionId>,
    positions_by_venue: HashMap<Venue, Vec<PositionId>>,
    positions_by_strategy: HashMap<StrategyId, Vec<PositionId>>,
    positions_by_instrument: HashMap<InstrumentId, Vec<PositionId>>,

    bars: HashMap<BarType, Vec<Bar>>,
    quote_ticks: HashMap<InstrumentId, Vec<QuoteTick>>,
    trade_ticks: HashMap<InstrumentId, Vec<TradeTick>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Instruments ──

    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<(), CacheError> {
        let id = instrument.id().clone();
        if self.instruments.contains_key(&id) {
            return Err(CacheError::DuplicateInstrument(id));
        }
        self.instrument_ids.push(id.clone());
        self.instruments.insert(id, instrument);
        Ok(())
    }

    pub fn instrument(&self, instrument_id: &InstrumentId) -> Option<&Instrument> {
        self.instruments.get(instrument_id)
    }

    pub fn instruments(&self) -> Vec<&Instrument> {
        self.instrument_ids
            .iter()
            .filter_map(|id| self.instruments.get(id))
            .collect()
    }

    // ── Accounts ──

    pub fn add_account(&mut self, venue: Venue, account: Account) -> Result<(), CacheError> {
        if self.accounts_by_venue.contains_key(&venue) {
            return Err(CacheError::DuplicateAccount(venue));
        }
        let id = account.id().clone();
        self.account_ids.push(id.clone());
        self.accounts_by_venue.insert(venue, id.clone());
        self.accounts.insert(id, account);
        Ok(())
    }

    pub fn account(&self, account_id: &AccountId) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn account_mut(&mut self, account_id: &AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(account_id)
    }

    pub fn account_for_venue(&self, venue: &Venue) -> Option<&Account> {
        self.accounts_by_venue
            .get(venue)
            .and_then(|id| self.accounts.get(id))
    }

    pub fn account_for_venue_mut(&mut self, venue: &Venue) -> Option<&mut Account> {
        let id = self.accounts_by_venue.get(venue).cloned();
        match id {
            Some(id) => self.accounts.get_mut(&id),
            None => None,
        }
    }

    pub fn accounts(&self) -> Vec<&Account> {
        self.account_ids
            .iter()
            .filter_map(|id| self.accounts.get(id))
            .collect()
    }

    // ── Orders ──

    pub fn add_order(&mut self, order: Order) {
        let id = order.client_order_id().clone();
        assert!(
            !self.orders.contains_key(&id),
            "order {id} already cached"
        );
        self.order_ids.push(id.clone());
        self.orders_by_venue
            .entry(order.instrument_id().venue().clone())
            .or_default()
            .push(id.clone());
        self.orders_by_strategy
            .entry(order.strategy_id().clone())
            .or_default()
            .push(id.clone());
        self.orders_by_instrument
            .entry(order.instrument_id().clone())
            .or_default()
            .push(id.clone());
        self.orders.insert(id, order);
    }

    pub fn order(&self, client_order_id: &ClientOrderId) -> Option<&Order> {
        self.orders.get(client_order_id)
    }

    pub fn order_mut(&mut self, client_order_id: &ClientOrderId) -> Option<&mut Order> {
        self.orders.get_mut(client_order_id)
    }

    /// Orders filtered by instrument and/or strategy, in insertion order.
    pub fn orders(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Order> {
        let ids: &[ClientOrderId] = if let Some(instrument_id) = instrument_id {
            self.orders_by_instrument
                .get(instrument_id)
                .map(Vec::as_slice)
                .unwrap_or_default()
        } else if let Some(strategy_id) = strategy_id {
            self.orders_by_strategy
                .get(strategy_id)
                .map(Vec::as_slice)
                .unwrap_or_default()
        } else {
            &self.order_ids
        };
        ids.iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|o| {
                instrument_id.map_or(true, |i| o.instrument_id() == i)
                    && strategy_id.map_or(true, |s| o.strategy_id() == s)
            })
            .collect()
    }

    pub fn orders_open(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Order> {
        self.orders(instrument_id, strategy_id)
            .into_iter()
            .filter(|o| o.is_open())
            .collect()
    }

    pub fn orders_closed(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Order> {
        self.orders(instrument_id, strategy_id)
            .into_iter()
            .filter(|o| o.is_closed())
            .collect()
    }

    pub fn orders_for_venue(&self, venue: &Venue) -> Vec<&Order> {
        self.orders_by_venue
            .get(venue)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.orders.get(id))
            .collect()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // ── Positions ──

    pub fn add_position(&mut self, position: Position) {
        let id = position.id().clone();
        assert!(
            !self.positions.contains_key(&id),
            "position {id} already cached"
        );
        self.position_ids.push(id.clone());
        self.positions_by_venue
            .entry(position.instrument_id().venue().clone())
            .or_default()
            .push(id.clone());
        self.positions_by_strategy
            .entry(position.strategy_id().clone())
            .or_default()
            .push(id.clone());
        self.positions_by_instrument
            .entry(position.instrument_id().clone())
            .or_default()
            .push(id.clone());
        self.positions.insert(id, position);
    }

    pub fn position(&self, position_id: &PositionId) -> Option<&Position> {
        self.positions.get(position_id)
    }

    pub fn position_mut(&mut self, position_id: &PositionId) -> Option<&mut Position> {
        self.positions.get_mut(position_id)
    }

    /// Positions filtered by instrument and/or strategy, in insertion order.
    pub fn positions(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        let ids: &[PositionId] = if let Some(instrument_id) = instrument_id {
            self.positions_by_instrument
                .get(instrument_id)
                .map(Vec::as_slice)
                .unwrap_or_default()
        } else if let Some(strategy_id) = strategy_id {
            self.positions_by_strategy
                .get(strategy_id)
                .map(Vec::as_slice)
                .unwrap_or_default()
        } else {
            &self.position_ids
        };
        ids.iter()
            .filter_map(|id| self.positions.get(id))
            .filter(|p| {
                instrument_id.map_or(true, |i| p.instrument_id() == i)
                    && strategy_id.map_or(true, |s| p.strategy_id() == s)
            })
            .collect()
    }

    pub fn positions_open(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.positions(instrument_id, strategy_id)
            .into_iter()
            .filter(|p| p.is_open())
            .collect()
    }

    pub fn positions_closed(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.positions(instrument_id, strategy_id)
            .into_iter()
            .filter(|p| p.is_closed())
            .collect()
    }

    pub fn positions_for_venue(&self, venue: &Venue) -> Vec<&Position> {
        self.positions_by_venue
            .get(venue)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.positions.get(id))
            .collect()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    // ── Market data ──

    pub fn add_bar(&mut self, bar: Bar) {
        self.bars.entry(bar.bar_type.clone()).or_default().push(bar);
    }

    pub fn bars(&self, bar_type: &BarType) -> &[Bar] {
        self.bars.get(bar_type).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn last_bar(&self, bar_type: &BarType) -> Option<&Bar> {
        self.bars.get(bar_type).and_then(|bars| bars.last())
    }

    pub fn add_quote_tick(&mut self, tick: QuoteTick) {
        self.quote_ticks
            .entry(tick.instrument_id.clone())
            .or_default()
            .push(tick);
    }

    pub fn quote_ticks(&self, instrument_id: &InstrumentId) -> &[QuoteTick] {
        self.quote_ticks
            .get(instrument_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn add_trade_tick(&mut self, tick: TradeTick) {
        self.trade_ticks
            .entry(tick.instrument_id.clone())
            .or_default()
            .push(tick);
    }

    pub fn trade_ticks(&self, instrument_id: &InstrumentId) -> &[TradeTick] {
        self.trade_ticks
            .get(instrument_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{OrderKind, OrderSide, TimeInForce};
    use crate::events::OrderInitialized;
    use crate::identifiers::TraderId;
    use crate::instruments::Equity;
    use crate::types::{Currency, Quantity};
    use rust_decimal_macros::dec;

    fn instrument() -> Instrument {
        Instrument::Equity(Equity::new("AAPL.XNAS".parse().unwrap(), Currency::usd()))
    }

    fn order(n: u32) -> Order {
        Order::new(OrderInitialized {
            trader_id: TraderId::new("TRADER-001"),
            strategy_id: StrategyId::new("S-1"),
            instrument_id: "AAPL.XNAS".parse().unwrap(),
            client_order_id: ClientOrderId::new(format!("O-S-1-{n}")),
            order_side: OrderSide::Buy,
            order_kind: OrderKind::Market,
            quantity: Quantity::new(dec!(100), 0),
            time_in_force: TimeInForce::Gtc,
            price: None,
            trigger_price: None,
            ts_event: 0,
            ts_init: 0,
        })
    }

    #[test]
    fn test_duplicate_instrument_rejected() {
        let mut cache = Cache::new();
        cache.add_instrument(instrument()).unwrap();
        assert!(matches!(
            cache.add_instrument(instrument()),
            Err(CacheError::DuplicateInstrument(_))
        ));
    }

    #[test]
    fn test_orders_filtered_by_instrument() {
        let mut cache = Cache::new();
        cache.add_order(order(1));
        cache.add_order(order(2));

        let id: InstrumentId = "AAPL.XNAS".parse().unwrap();
        assert_eq!(cache.orders(Some(&id), None).len(), 2);

        let other: InstrumentId = "MSFT.XNAS".parse().unwrap();
        assert!(cache.orders(Some(&other), None).is_empty());
    }

    #[test]
    fn test_orders_iteration_in_insertion_order() {
        let mut cache = Cache::new();
        for n in 1..=5 {
            cache.add_order(order(n));
        }
        let ids: Vec<&str> = cache
            .orders(None, None)
            .iter()
            .map(|o| o.client_order_id().as_str())
            .collect();
        assert_eq!(ids, vec!["O-S-1-1", "O-S-1-2", "O-S-1-3", "O-S-1-4", "O-S-1-5"]);
    }

    #[test]
    fn test_orders_for_venue() {
        let mut cache = Cache::new();
        cache.add_order(order(1));
        assert_eq!(cache.orders_for_venue(&Venue::new("XNAS")).len(), 1);
        assert!(cache.orders_for_venue(&Venue::new("SIM")).is_empty());
    }

    #[test]
    #[should_panic(expected = "already cached")]
    fn test_duplicate_order_panics() {
        let mut cache = Cache::new();
        cache.add_order(order(1));
        cache.add_order(order(1));
    }

    #[test]
    fn test_account_for_venue() {
        let mut cache = Cache::new();
        let account = Account::cash(AccountId::new("SIM-001"), Currency::usd(), vec![]);
        cache.add_account(Venue::new("SIM"), account).unwrap();

        assert!(cache.account_for_venue(&Venue::new("SIM")).is_some());
        assert!(cache.account_for_venue(&Venue::new("XNAS")).is_none());
    }

    #[test]
    fn test_bars_append_in_order() {
        use crate::data::{Bar, BarSpecification, BarType};
        use crate::enums::{BarAggregation, PriceType};
        use crate::types::Price;

        let mut cache = Cache::new();
        let bar_type = BarType::new(
            "AAPL.XNAS".parse().unwrap(),
            BarSpecification::new(1, BarAggregation::Minute, PriceType::Last),
        );
        for ts in 1..=3 {
            cache.add_bar(Bar::new(
                bar_type.clone(),
                Price::new(dec!(100), 2),
                Price::new(dec!(101), 2),
                Price::new(dec!(99), 2),
                Price::new(dec!(100), 2),
                Quantity::new(dec!(1000), 0),
                ts,
                ts,
            ));
        }
        assert_eq!(cache.bars(&bar_type).len(), 3);
        assert_eq!(cache.last_bar(&bar_type).unwrap().ts_event, 3);
    }
}

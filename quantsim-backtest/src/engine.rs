//! Backtest driver.
//!
//! Owns the kernel (clock, bus, cache, engines, portfolio), one simulated
//! exchange per venue, the registered strategies, and the merged data
//! stream. Per record the driver advances the clock, routes bars to the
//! venue's matching engine first and to the data engine second, so a
//! strategy acting on bar T always sees its previous orders resolved
//! against bar T and never looks ahead within the same bar.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use quantsim_core::cache::{Cache, CacheError};
use quantsim_core::clock::{Clock, TestClock};
use quantsim_core::data::MarketData;
use quantsim_core::engine::{DataEngine, ExecutionEngine, RiskEngine};
use quantsim_core::enums::{AccountType, OmsType};
use quantsim_core::identifiers::{TraderId, Venue};
use quantsim_core::instruments::Instrument;
use quantsim_core::msgbus::MessageBus;
use quantsim_core::portfolio::Portfolio;
use quantsim_core::strategy::{Strategy, StrategyActor};
use quantsim_core::types::{Currency, Money};
use quantsim_core::UnixNanos;

use crate::exchange::SimulatedExchange;
use crate::results::BacktestResult;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no venue registered for {0}")]
    UnknownVenue(Venue),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Configuration for one simulated venue.
#[derive(Debug, Clone)]
pub struct VenueConfig {
    pub name: String,
    pub oms_type: OmsType,
    pub account_type: AccountType,
    pub base_currency: Currency,
    pub starting_balances: Vec<Money>,
    pub default_leverage: Decimal,
}

impl VenueConfig {
    pub fn new(
        name: impl Into<String>,
        oms_type: OmsType,
        account_type: AccountType,
        base_currency: Currency,
        starting_balances: Vec<Money>,
    ) -> Self {
        Self {
            name: name.into(),
            oms_type,
            account_type,
            base_currency,
            starting_balances,
            default_leverage: Decimal::ONE,
        }
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.default_leverage = leverage;
        self
    }
}

pub struct BacktestEngine {
    clock: Rc<TestClock>,
    msgbus: Rc<MessageBus>,
    cache: Rc<RefCell<Cache>>,
    portfolio: Rc<Portfolio>,
    risk_engine: Rc<RiskEngine>,
    exec_engine: Rc<ExecutionEngine>,
    data_engine: Rc<DataEngine>,
    exchanges: Vec<Rc<SimulatedExchange>>,
    exchange_index: HashMap<Venue, usize>,
    strategies: Vec<Rc<StrategyActor>>,
    data: Vec<MarketData>,
    result: Option<BacktestResult>,
}

impl BacktestEngine {
    pub fn new(trader_id: &str) -> Self {
        let clock = Rc::new(TestClock::new(0));
        let msgbus = Rc::new(MessageBus::new(TraderId::new(trader_id)));
        let cache = Rc::new(RefCell::new(Cache::new()));
        let portfolio = Rc::new(Portfolio::new(Rc::clone(&cache)));
        let risk_engine = Rc::new(RiskEngine::new(Rc::clone(&portfolio), Rc::clone(&cache)));
        let exec_engine =
            ExecutionEngine::new(Rc::clone(&cache), Rc::clone(&msgbus), Rc::clone(&risk_engine));
        let data_engine = Rc::new(DataEngine::new(Rc::clone(&cache), Rc::clone(&msgbus)));

        Self {
            clock,
            msgbus,
            cache,
            portfolio,
            risk_engine,
            exec_engine,
            data_engine,
            exchanges: Vec::new(),
            exchange_index: HashMap::new(),
            strategies: Vec::new(),
            data: Vec::new(),
            result: None,
        }
    }

    // ── Setup ──

    pub fn add_venue(&mut self, config: VenueConfig) -> Result<(), BacktestError> {
        let venue = Venue::new(config.name);
        let exchange = SimulatedExchange::new(
            venue.clone(),
            config.oms_type,
            config.account_type,
            config.base_currency,
            config.starting_balances,
            config.default_leverage,
            Rc::clone(&self.msgbus),
            Rc::clone(&self.cache),
        )?;
        self.exec_engine.register_venue(venue.clone(), config.oms_type);
        self.exchange_index.insert(venue, self.exchanges.len());
        self.exchanges.push(exchange);
        Ok(())
    }

    /// Register an instrument with the cache and its venue's exchange.
    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<(), BacktestError> {
        let venue = instrument.venue().clone();
        let Some(&index) = self.exchange_index.get(&venue) else {
            return Err(BacktestError::UnknownVenue(venue));
        };
        let instrument_id = instrument.id().clone();
        self.cache.borrow_mut().add_instrument(instrument)?;
        self.exchanges[index].register_instrument(instrument_id);
        Ok(())
    }

    pub fn add_data(&mut self, records: Vec<MarketData>) {
        self.data.extend(records);
    }

    pub fn add_bars(&mut self, bars: Vec<quantsim_core::data::Bar>) {
        self.data.extend(bars.into_iter().map(MarketData::Bar));
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) {
        let actor = StrategyActor::register(
            strategy,
            Rc::clone(&self.clock) as Rc<dyn Clock>,
            Rc::clone(&self.cache),
            Rc::clone(&self.portfolio),
            Rc::clone(&self.msgbus),
            Rc::clone(&self.exec_engine),
            Rc::clone(&self.data_engine),
        );
        self.strategies.push(actor);
    }

    // ── Run ──

    pub fn run(&mut self, start: Option<UnixNanos>, end: Option<UnixNanos>) {
        // Stable sort: records with equal timestamps keep insertion order.
        self.data.sort_by_key(|d| d.ts_event());

        let in_range = |ts: UnixNanos| {
            start.map_or(true, |s| ts >= s) && end.map_or(true, |e| ts <= e)
        };

        info!(records = self.data.len(), "backtest run starting");
        for actor in &self.strategies {
            actor.start();
        }

        let starting_balance = self.total_balance();
        let mut balance_curve: Vec<(UnixNanos, Decimal)> = Vec::new();

        let records: Vec<MarketData> = self
            .data
            .iter()
            .filter(|d| in_range(d.ts_event()))
            .cloned()
            .collect();

        for record in records {
            // Fire elapsed timers before the record is processed.
            for event in self.clock.advance_to(record.ts_event()) {
                event.fire();
            }

            let ts = record.ts_event();
            match record {
                MarketData::Bar(bar) => {
                    // Matching first, data delivery second.
                    let venue = bar.instrument_id().venue();
                    if let Some(&index) = self.exchange_index.get(venue) {
                        self.exchanges[index].process_bar(&bar);
                    }
                    self.data_engine.process_bar(bar);
                }
                MarketData::Quote(tick) => self.data_engine.process_quote_tick(tick),
                MarketData::Trade(tick) => self.data_engine.process_trade_tick(tick),
            }
            // One balance sample per record, after its dispatch returns.
            balance_curve.push((ts, self.total_balance()));
        }

        for actor in &self.strategies {
            actor.stop();
        }

        let ending_balance = self.total_balance();
        self.result = Some(BacktestResult::build(
            starting_balance,
            ending_balance,
            balance_curve,
            &self.cache.borrow(),
        ));
        info!("backtest run complete");
    }

    pub fn get_result(&self) -> Option<&BacktestResult> {
        self.result.as_ref()
    }

    /// Clear data and results and reset strategies for another run.
    pub fn reset(&mut self) {
        self.data.clear();
        self.result = None;
        for actor in &self.strategies {
            actor.reset();
        }
    }

    // ── Access ──

    pub fn clock(&self) -> &Rc<TestClock> {
        &self.clock
    }

    pub fn msgbus(&self) -> &Rc<MessageBus> {
        &self.msgbus
    }

    pub fn cache(&self) -> &Rc<RefCell<Cache>> {
        &self.cache
    }

    pub fn portfolio(&self) -> &Rc<Portfolio> {
        &self.portfolio
    }

    pub fn risk_engine(&self) -> &Rc<RiskEngine> {
        &self.risk_engine
    }

    /// Total account value across venues, each in its base currency.
    fn total_balance(&self) -> Decimal {
        let cache = self.cache.borrow();
        self.exchanges
            .iter()
            .filter_map(|exchange| {
                cache
                    .account_for_venue(exchange.venue())
                    .and_then(|a| a.balance_total(None))
                    .map(|m| m.amount())
            })
            .sum()
    }
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new("BACKTESTER-001")
    }
}

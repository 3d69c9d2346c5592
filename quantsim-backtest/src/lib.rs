//! QuantSim backtest — bar-driven simulation on top of the core kernel.
//!
//! Provides the per-instrument matching engine, the simulated exchange, the
//! backtest driver, and the results builder.

pub mod engine;
pub mod exchange;
pub mod matching;
pub mod results;
pub mod strategies;

pub use engine::{BacktestEngine, BacktestError, VenueConfig};
pub use exchange::SimulatedExchange;
pub use results::BacktestResult;

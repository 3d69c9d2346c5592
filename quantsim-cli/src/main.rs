//! QuantSim demo runner.
//!
//! Generates deterministic synthetic bars, runs the EMA-cross strategy
//! through the full kernel, and prints the result table (or JSON).

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;

use quantsim_backtest::engine::{BacktestEngine, VenueConfig};
use quantsim_backtest::strategies::{EmaCross, EmaCrossConfig};
use quantsim_core::data::{Bar, BarSpecification, BarType};
use quantsim_core::enums::{AccountType, BarAggregation, OmsType, PriceType};
use quantsim_core::instruments::{Equity, Instrument};
use quantsim_core::types::{Currency, Money, Price, Quantity};

const NS_PER_MIN: i64 = 60_000_000_000;

#[derive(Parser, Debug)]
#[command(name = "quantsim", about = "Run a demo EMA-cross backtest on synthetic data")]
struct Args {
    /// Number of synthetic one-minute bars to generate
    #[arg(long, default_value_t = 500)]
    bars: i64,

    /// Starting account balance in USD
    #[arg(long, default_value = "100000")]
    balance: Decimal,

    /// Fast EMA period
    #[arg(long, default_value_t = 10)]
    fast: usize,

    /// Slow EMA period
    #[arg(long, default_value_t = 20)]
    slow: usize,

    /// Trade size in shares
    #[arg(long, default_value = "100")]
    size: Decimal,

    /// Taker fee rate charged by the simulated venue
    #[arg(long, default_value = "0.0005")]
    taker_fee: Decimal,

    /// Print the result as JSON instead of a table
    #[arg(long)]
    json: bool,
}

/// Deterministic price path: a slow trend with a repeating oscillation.
/// No RNG, so every run with the same arguments is bit-identical.
fn synthetic_bars(bar_type: &BarType, count: i64) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let trend = Decimal::new(10_000 + i * 3, 2);
            let swing = Decimal::new(((i * 31) % 400) - 200, 2);
            let open = trend + swing;
            let drift = Decimal::new(((i * 17) % 120) - 60, 2);
            let close = open + drift;
            let high = open.max(close) + Decimal::new(75, 2);
            let low = open.min(close) - Decimal::new(75, 2);
            Bar::new(
                bar_type.clone(),
                Price::new(open, 2),
                Price::new(high, 2),
                Price::new(low, 2),
                Price::new(close, 2),
                Quantity::new(Decimal::from(10_000), 0),
                (i + 1) * NS_PER_MIN,
                (i + 1) * NS_PER_MIN,
            )
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let bar_type = BarType::new(
        "AAPL.SIM".parse().context("parsing instrument id")?,
        BarSpecification::new(1, BarAggregation::Minute, PriceType::Last),
    );

    let mut equity = Equity::new(bar_type.instrument_id.clone(), Currency::usd());
    equity.spec.taker_fee = args.taker_fee;

    let mut engine = BacktestEngine::new("BACKTESTER-001");
    engine
        .add_venue(VenueConfig::new(
            "SIM",
            OmsType::Netting,
            AccountType::Cash,
            Currency::usd(),
            vec![Money::new(args.balance, Currency::usd())],
        ))
        .context("adding venue")?;
    engine
        .add_instrument(Instrument::Equity(equity))
        .context("adding instrument")?;
    engine.add_strategy(Box::new(EmaCross::new(EmaCrossConfig::new(
        bar_type.clone(),
        args.fast,
        args.slow,
        args.size,
    ))));

    info!(bars = args.bars, "generating synthetic data");
    engine.add_bars(synthetic_bars(&bar_type, args.bars));

    engine.run(None, None);

    let result = engine
        .get_result()
        .context("backtest produced no result")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{result}");
    }

    Ok(())
}

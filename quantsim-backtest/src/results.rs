//! Backtest result record and the statistics behind it.
//!
//! Monetary fields stay exact (`Decimal`); ratio statistics (Sharpe, win
//! rate, profit factor, drawdown fraction) are derived analytics and use
//! `f64` — they never feed back into simulation state.

use std::fmt;

use chrono::DateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quantsim_core::cache::Cache;
use quantsim_core::UnixNanos;

/// Complete summary of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub start_ns: UnixNanos,
    pub end_ns: UnixNanos,
    pub total_orders: usize,
    pub total_positions: usize,
    pub total_fills: usize,
    pub starting_balance: Decimal,
    pub ending_balance: Decimal,
    pub total_return: Decimal,
    pub total_commissions: Decimal,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub balance_curve: Vec<(UnixNanos, Decimal)>,
}

impl BacktestResult {
    /// Build the result from the final cache state and the recorded
    /// balance curve.
    pub fn build(
        starting_balance: Decimal,
        ending_balance: Decimal,
        balance_curve: Vec<(UnixNanos, Decimal)>,
        cache: &Cache,
    ) -> Self {
        let total_orders = cache.order_count();
        let total_positions = cache.position_count();
        let total_fills = cache
            .orders(None, None)
            .iter()
            .filter(|o| o.is_filled())
            .count();

        let total_commissions: Decimal = cache
            .accounts()
            .iter()
            .flat_map(|a| a.commissions().iter().map(|(_, amount)| *amount))
            .sum();

        // Win/loss statistics over closed positions.
        let mut wins: Vec<Decimal> = Vec::new();
        let mut losses: Vec<Decimal> = Vec::new();
        for position in cache.positions_closed(None, None) {
            let pnl = position.realized_pnl();
            if pnl > Decimal::ZERO {
                wins.push(pnl);
            } else if pnl < Decimal::ZERO {
                losses.push(pnl);
            }
        }
        let closed = wins.len() + losses.len();
        let win_rate = if closed > 0 {
            wins.len() as f64 / closed as f64
        } else {
            0.0
        };
        let avg_win = mean_decimal(&wins);
        let avg_loss = mean_decimal(&losses);
        let gross_profit: Decimal = wins.iter().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();
        let profit_factor = profit_factor(gross_profit, gross_loss);

        Self {
            start_ns: balance_curve.first().map(|(ts, _)| *ts).unwrap_or(0),
            end_ns: balance_curve.last().map(|(ts, _)| *ts).unwrap_or(0),
            total_orders,
            total_positions,
            total_fills,
            starting_balance,
            ending_balance,
            total_return: ending_balance - starting_balance,
            total_commissions,
            max_drawdown: max_drawdown(&balance_curve),
            sharpe_ratio: sharpe_ratio(&balance_curve),
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            balance_curve,
        }
    }
}

// ─── Metric helpers ─────────────────────────────────────────────────

/// Maximum drawdown as a fraction of the running peak.
pub fn max_drawdown(balance_curve: &[(UnixNanos, Decimal)]) -> f64 {
    if balance_curve.is_empty() {
        return 0.0;
    }
    let mut peak = balance_curve[0].1;
    let mut max_dd = 0.0_f64;
    for (_, balance) in balance_curve {
        if *balance > peak {
            peak = *balance;
        }
        if peak > Decimal::ZERO {
            let dd = ((peak - *balance) / peak).to_f64().unwrap_or(0.0);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio over balance-curve returns.
///
/// `mean(r) / stddev(r) * sqrt(252)` with sample standard deviation;
/// zero when the curve is too short or has no variance.
pub fn sharpe_ratio(balance_curve: &[(UnixNanos, Decimal)]) -> f64 {
    if balance_curve.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = balance_curve
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].1;
            if prev > Decimal::ZERO {
                ((w[1].1 - prev) / prev).to_f64()
            } else {
                None
            }
        })
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1) as f64;
    let std = variance.sqrt();
    if std > 0.0 {
        mean / std * 252.0_f64.sqrt()
    } else {
        0.0
    }
}

/// Gross profit over gross loss; infinity when there are wins and no
/// losses, zero when there are no wins.
pub fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
    if gross_profit <= Decimal::ZERO {
        return 0.0;
    }
    if gross_loss.is_zero() {
        return f64::INFINITY;
    }
    (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
}

fn mean_decimal(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

impl fmt::Display for BacktestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn ts(ns: UnixNanos) -> String {
            DateTime::from_timestamp_nanos(ns)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        }

        writeln!(f, "{:=<54}", "")?;
        writeln!(f, "BACKTEST RESULTS")?;
        writeln!(f, "{:=<54}", "")?;
        writeln!(f, "  {:<28}: {:>22}", "Start", ts(self.start_ns))?;
        writeln!(f, "  {:<28}: {:>22}", "End", ts(self.end_ns))?;
        writeln!(f, "  {:<28}: {:>22}", "Total Orders", self.total_orders)?;
        writeln!(f, "  {:<28}: {:>22}", "Total Positions", self.total_positions)?;
        writeln!(f, "  {:<28}: {:>22}", "Total Fills", self.total_fills)?;
        writeln!(f, "  {:<28}: {:>22}", "Starting Balance", self.starting_balance.to_string())?;
        writeln!(f, "  {:<28}: {:>22}", "Ending Balance", self.ending_balance.to_string())?;
        writeln!(f, "  {:<28}: {:>22}", "Total Return", self.total_return.to_string())?;
        writeln!(f, "  {:<28}: {:>22}", "Total Commissions", self.total_commissions.to_string())?;
        writeln!(f, "  {:<28}: {:>22.4}", "Max Drawdown", self.max_drawdown)?;
        writeln!(f, "  {:<28}: {:>22.4}", "Sharpe Ratio", self.sharpe_ratio)?;
        writeln!(f, "  {:<28}: {:>22.4}", "Win Rate", self.win_rate)?;
        writeln!(f, "  {:<28}: {:>22.4}", "Profit Factor", self.profit_factor)?;
        writeln!(f, "  {:<28}: {:>22}", "Avg Win", self.avg_win.to_string())?;
        writeln!(f, "  {:<28}: {:>22}", "Avg Loss", self.avg_loss.to_string())?;
        write!(f, "{:=<54}", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn curve(balances: &[i64]) -> Vec<(UnixNanos, Decimal)> {
        balances
            .iter()
            .enumerate()
            .map(|(i, b)| (i as UnixNanos, Decimal::from(*b)))
            .collect()
    }

    // ── Max drawdown ──

    #[test]
    fn max_drawdown_known_curve() {
        let dd = max_drawdown(&curve(&[100_000, 110_000, 90_000, 95_000]));
        let expected = 20_000.0 / 110_000.0;
        assert!((dd - expected).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown(&curve(&[100, 110, 120, 130])), 0.0);
    }

    #[test]
    fn max_drawdown_empty() {
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_zero_for_constant_curve() {
        assert_eq!(sharpe_ratio(&curve(&[100, 100, 100, 100])), 0.0);
    }

    #[test]
    fn sharpe_positive_for_alternating_gains() {
        let mut balances = vec![100_000];
        for i in 1..100 {
            let prev = balances[i - 1];
            let gain = if i % 2 == 0 { 200 } else { 50 };
            balances.push(prev + gain);
        }
        assert!(sharpe_ratio(&curve(&balances)) > 0.0);
    }

    #[test]
    fn sharpe_zero_for_short_curve() {
        assert_eq!(sharpe_ratio(&curve(&[100, 110])), 0.0);
    }

    // ── Profit factor ──

    #[test]
    fn profit_factor_ratio() {
        assert_eq!(profit_factor(dec!(800), dec!(200)), 4.0);
    }

    #[test]
    fn profit_factor_no_losses_is_infinite() {
        assert!(profit_factor(dec!(800), dec!(0)).is_infinite());
    }

    #[test]
    fn profit_factor_no_wins_is_zero() {
        assert_eq!(profit_factor(dec!(0), dec!(500)), 0.0);
    }

    // ── Build ──

    #[test]
    fn build_from_empty_cache() {
        let cache = Cache::new();
        let result = BacktestResult::build(
            dec!(10000),
            dec!(10000),
            curve(&[10_000, 10_000]),
            &cache,
        );
        assert_eq!(result.total_orders, 0);
        assert_eq!(result.total_return, dec!(0));
        assert_eq!(result.win_rate, 0.0);
        assert_eq!(result.start_ns, 0);
        assert_eq!(result.end_ns, 1);
    }
}

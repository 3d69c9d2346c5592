//! Position accounting over order fills.
//!
//! A position tracks a signed quantity: positive long, negative short. Fills
//! in the same direction weighted-average the entry price; opposing fills
//! realize PnL on the closed slice and may flip the position into a fresh
//! leg at the fill price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{OrderSide, PositionSide};
use crate::events::OrderFilled;
use crate::identifiers::{AccountId, InstrumentId, PositionId, StrategyId};
use crate::types::{Currency, Price, Quantity};
use crate::UnixNanos;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    instrument_id: InstrumentId,
    strategy_id: StrategyId,
    account_id: AccountId,
    currency: Currency,
    side: PositionSide,
    signed_qty: Decimal,
    avg_px_open: Decimal,
    avg_px_close: Decimal,
    realized_pnl: Vec<(Currency, Decimal)>,
    commissions: Vec<(Currency, Decimal)>,
    qty_precision: u32,
    ts_opened: UnixNanos,
    ts_closed: Option<UnixNanos>,
    events: Vec<OrderFilled>,
}

fn accrue(ledger: &mut Vec<(Currency, Decimal)>, currency: &Currency, amount: Decimal) {
    for (c, total) in ledger.iter_mut() {
        if c == currency {
            *total += amount;
            return;
        }
    }
    ledger.push((currency.clone(), amount));
}

fn ledger_get(ledger: &[(Currency, Decimal)], currency: &Currency) -> Decimal {
    ledger
        .iter()
        .find(|(c, _)| c == currency)
        .map(|(_, v)| *v)
        .unwrap_or_default()
}

impl Position {
    /// Open a position from its first fill.
    pub fn new(id: PositionId, fill: OrderFilled) -> Self {
        let mut position = Self {
            id,
            instrument_id: fill.instrument_id.clone(),
            strategy_id: fill.strategy_id.clone(),
            account_id: fill.account_id.clone(),
            currency: fill.currency.clone(),
            side: PositionSide::Flat,
            signed_qty: Decimal::ZERO,
            avg_px_open: Decimal::ZERO,
            avg_px_close: Decimal::ZERO,
            realized_pnl: Vec::new(),
            commissions: Vec::new(),
            qty_precision: fill.last_qty.precision(),
            ts_opened: fill.ts_event,
            ts_closed: None,
            events: Vec::new(),
        };
        position.apply(fill);
        position
    }

    pub fn id(&self) -> &PositionId {
        &self.id
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    pub fn strategy_id(&self) -> &StrategyId {
        &self.strategy_id
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn side(&self) -> PositionSide {
        self.side
    }

    pub fn signed_qty(&self) -> Decimal {
        self.signed_qty
    }

    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.signed_qty.abs(), self.qty_precision)
    }

    pub fn avg_px_open(&self) -> Decimal {
        self.avg_px_open
    }

    pub fn avg_px_close(&self) -> Decimal {
        self.avg_px_close
    }

    /// Realized PnL in the position's primary currency.
    pub fn realized_pnl(&self) -> Decimal {
        ledger_get(&self.realized_pnl, &self.currency)
    }

    pub fn realized_pnl_ledger(&self) -> &[(Currency, Decimal)] {
        &self.realized_pnl
    }

    pub fn commissions(&self) -> &[(Currency, Decimal)] {
        &self.commissions
    }

    pub fn ts_opened(&self) -> UnixNanos {
        self.ts_opened
    }

    pub fn ts_closed(&self) -> Option<UnixNanos> {
        self.ts_closed
    }

    pub fn events(&self) -> &[OrderFilled] {
        &self.events
    }

    pub fn is_open(&self) -> bool {
        self.side != PositionSide::Flat
    }

    pub fn is_closed(&self) -> bool {
        self.side == PositionSide::Flat && !self.events.is_empty()
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    /// Apply a fill to the position.
    pub fn apply(&mut self, fill: OrderFilled) {
        assert!(
            self.ts_closed.is_none(),
            "cannot apply a fill to closed position {}",
            self.id
        );

        accrue(
            &mut self.commissions,
            fill.commission.currency(),
            fill.commission.amount(),
        );

        let fill_qty = fill.last_qty.value();
        let fill_px = fill.last_px.value();
        let dq = match fill.order_side {
            OrderSide::Buy => fill_qty,
            OrderSide::Sell => -fill_qty,
        };

        let old_signed = self.signed_qty;
        let same_direction = old_signed.is_zero()
            || (old_signed > Decimal::ZERO) == (dq > Decimal::ZERO);

        if same_direction {
            // Opening from flat, or adding in the current direction.
            let old_abs = old_signed.abs();
            let total = old_abs + fill_qty;
            if total > Decimal::ZERO {
                self.avg_px_open =
                    (self.avg_px_open * old_abs + fill_px * fill_qty) / total;
            }
            self.signed_qty += dq;
        } else {
            // Reducing, possibly through zero.
            let close_qty = fill_qty.min(old_signed.abs());
            let pnl = if old_signed > Decimal::ZERO {
                close_qty * (fill_px - self.avg_px_open)
            } else {
                close_qty * (self.avg_px_open - fill_px)
            };
            accrue(&mut self.realized_pnl, &fill.currency, pnl);

            let open_qty = fill_qty - close_qty;
            self.signed_qty += dq;
            self.avg_px_close = fill_px;

            if open_qty > Decimal::ZERO {
                // Flipped: the remainder opens a fresh leg at the fill price.
                self.avg_px_open = fill_px;
            }
        }

        self.side = if self.signed_qty > Decimal::ZERO {
            PositionSide::Long
        } else if self.signed_qty < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        };

        if self.signed_qty.is_zero() {
            self.ts_closed = Some(fill.ts_event);
        }

        self.events.push(fill);
    }

    /// Unrealized PnL of the open quantity at `last_price`.
    pub fn unrealized_pnl(&self, last_price: Price) -> Decimal {
        match self.side {
            PositionSide::Flat => Decimal::ZERO,
            PositionSide::Long => {
                self.signed_qty.abs() * (last_price.value() - self.avg_px_open)
            }
            PositionSide::Short => {
                self.signed_qty.abs() * (self.avg_px_open - last_price.value())
            }
        }
    }

    pub fn total_pnl(&self, last_price: Price) -> Decimal {
        self.realized_pnl() + self.unrealized_pnl(last_price)
    }

    pub fn notional_value(&self, last_price: Price) -> Decimal {
        self.signed_qty.abs() * last_price.value()
    }
}

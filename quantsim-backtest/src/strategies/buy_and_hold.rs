use rust_decimal::Decimal;

use quantsim_core::data::{Bar, BarType};
use quantsim_core::enums::OrderSide;
use quantsim_core::identifiers::StrategyId;
use quantsim_core::strategy::{Strategy, StrategyContext};

/// Buys once on the first bar and holds for the rest of the run.
pub struct BuyAndHold {
    strategy_id: StrategyId,
    bar_type: BarType,
    trade_size: Decimal,
    bought: bool,
}

impl BuyAndHold {
    pub fn new(bar_type: BarType, trade_size: Decimal) -> Self {
        Self {
            strategy_id: StrategyId::new("BuyAndHold"),
            bar_type,
            trade_size,
            bought: false,
        }
    }
}

impl Strategy for BuyAndHold {
    fn strategy_id(&self) -> StrategyId {
        self.strategy_id.clone()
    }

    fn on_start(&mut self, ctx: &StrategyContext) {
        ctx.subscribe_bars(self.bar_type.clone());
    }

    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) {
        if self.bought {
            return;
        }
        let Some(qty) = ctx
            .cache()
            .borrow()
            .instrument(bar.instrument_id())
            .map(|i| i.make_qty(self.trade_size))
        else {
            return;
        };
        let order = ctx.order_factory().market(
            bar.instrument_id().clone(),
            OrderSide::Buy,
            qty,
            bar.ts_event,
        );
        ctx.submit_order(order);
        self.bought = true;
    }

    fn on_reset(&mut self, _ctx: &StrategyContext) {
        self.bought = false;
    }
}

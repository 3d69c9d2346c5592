use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;

use quantsim_core::data::{Bar, BarType};
use quantsim_core::enums::OrderSide;
use quantsim_core::identifiers::{InstrumentId, StrategyId};
use quantsim_core::indicators::{ExponentialMovingAverage, Indicator};
use quantsim_core::strategy::{Strategy, StrategyContext};

#[derive(Debug, Clone)]
pub struct EmaCrossConfig {
    pub bar_type: BarType,
    pub fast_period: usize,
    pub slow_period: usize,
    pub trade_size: Decimal,
}

impl EmaCrossConfig {
    pub fn new(bar_type: BarType, fast_period: usize, slow_period: usize, trade_size: Decimal) -> Self {
        assert!(
            fast_period < slow_period,
            "fast period must be shorter than slow period"
        );
        Self { bar_type, fast_period, slow_period, trade_size }
    }
}

/// Fast/slow EMA crossover: long when the fast average is above the slow,
/// short when below, reversing through flat on each cross.
pub struct EmaCross {
    strategy_id: StrategyId,
    config: EmaCrossConfig,
    instrument_id: InstrumentId,
    fast_ema: Rc<RefCell<ExponentialMovingAverage>>,
    slow_ema: Rc<RefCell<ExponentialMovingAverage>>,
}

impl EmaCross {
    pub fn new(config: EmaCrossConfig) -> Self {
        let fast_ema = Rc::new(RefCell::new(ExponentialMovingAverage::new(
            config.fast_period,
        )));
        let slow_ema = Rc::new(RefCell::new(ExponentialMovingAverage::new(
            config.slow_period,
        )));
        Self {
            strategy_id: StrategyId::new("EMACross"),
            instrument_id: config.bar_type.instrument_id.clone(),
            config,
            fast_ema,
            slow_ema,
        }
    }

    fn entry_order(&self, ctx: &StrategyContext, side: OrderSide, ts: i64) {
        let Some(qty) = ctx
            .cache()
            .borrow()
            .instrument(&self.instrument_id)
            .map(|i| i.make_qty(self.config.trade_size))
        else {
            return;
        };
        let order =
            ctx.order_factory()
                .market(self.instrument_id.clone(), side, qty, ts);
        ctx.submit_order(order);
    }
}

impl Strategy for EmaCross {
    fn strategy_id(&self) -> StrategyId {
        self.strategy_id.clone()
    }

    fn on_start(&mut self, ctx: &StrategyContext) {
        ctx.register_indicator_for_bars(
            self.config.bar_type.clone(),
            Rc::clone(&self.fast_ema) as Rc<RefCell<dyn Indicator>>,
        );
        ctx.register_indicator_for_bars(
            self.config.bar_type.clone(),
            Rc::clone(&self.slow_ema) as Rc<RefCell<dyn Indicator>>,
        );
        ctx.subscribe_bars(self.config.bar_type.clone());
    }

    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) {
        if !self.slow_ema.borrow().initialized() {
            return;
        }
        let fast = self.fast_ema.borrow().value();
        let slow = self.slow_ema.borrow().value();

        let is_long = ctx.portfolio().is_net_long(&self.instrument_id);
        let is_short = ctx.portfolio().is_net_short(&self.instrument_id);

        if fast > slow && !is_long {
            if is_short {
                ctx.close_all_positions(&self.instrument_id);
            }
            self.entry_order(ctx, OrderSide::Buy, bar.ts_event);
        } else if fast < slow && !is_short {
            if is_long {
                ctx.close_all_positions(&self.instrument_id);
            }
            self.entry_order(ctx, OrderSide::Sell, bar.ts_event);
        }
    }

    fn on_stop(&mut self, ctx: &StrategyContext) {
        ctx.close_all_positions(&self.instrument_id);
    }

    fn on_reset(&mut self, _ctx: &StrategyContext) {
        self.fast_ema.borrow_mut().reset();
        self.slow_ema.borrow_mut().reset();
    }
}

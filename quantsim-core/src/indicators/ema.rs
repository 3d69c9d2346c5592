use super::Indicator;
use crate::data::Bar;

/// Exponential moving average of bar closes.
pub struct ExponentialMovingAverage {
    name: String,
    period: usize,
    multiplier: f64,
    value: f64,
    count: usize,
}

impl ExponentialMovingAverage {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "EMA period must be positive");
        Self {
            name: format!("EMA({period})"),
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            value: 0.0,
            count: 0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for ExponentialMovingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_bar(&mut self, bar: &Bar) {
        self.count += 1;
        let price = bar.close.as_f64();
        if self.count == 1 {
            self.value = price;
        } else {
            self.value = (price - self.value) * self.multiplier + self.value;
        }
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn initialized(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BarSpecification, BarType};
    use crate::enums::{BarAggregation, PriceType};
    use crate::types::{Price, Quantity};
    use rust_decimal::Decimal;

    fn bar(close: i64) -> Bar {
        let px = Price::new(Decimal::from(close), 2);
        Bar::new(
            BarType::new(
                "AAPL.XNAS".parse().unwrap(),
                BarSpecification::new(1, BarAggregation::Minute, PriceType::Last),
            ),
            px,
            px,
            px,
            px,
            Quantity::new(Decimal::from(1000), 0),
            0,
            0,
        )
    }

    #[test]
    fn test_ema_seeds_with_first_close() {
        let mut ema = ExponentialMovingAverage::new(10);
        ema.handle_bar(&bar(50));
        assert_eq!(ema.value(), 50.0);
        assert!(!ema.initialized());
    }

    #[test]
    fn test_ema_converges_toward_price() {
        let mut ema = ExponentialMovingAverage::new(2);
        ema.handle_bar(&bar(10));
        for _ in 0..20 {
            ema.handle_bar(&bar(30));
        }
        assert!((ema.value() - 30.0).abs() < 1e-6);
        assert!(ema.initialized());
    }
}

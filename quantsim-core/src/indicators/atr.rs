use super::Indicator;
use crate::data::Bar;

/// Average true range with Wilder smoothing after the seed period.
pub struct AverageTrueRange {
    name: String,
    period: usize,
    value: f64,
    prev_close: Option<f64>,
    sum_tr: f64,
    count: usize,
}

impl AverageTrueRange {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ATR period must be positive");
        Self {
            name: format!("ATR({period})"),
            period,
            value: 0.0,
            prev_close: None,
            sum_tr: 0.0,
            count: 0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for AverageTrueRange {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_bar(&mut self, bar: &Bar) {
        self.count += 1;
        let high = bar.high.as_f64();
        let low = bar.low.as_f64();
        let close = bar.close.as_f64();

        let tr = match self.prev_close {
            None => high - low,
            Some(prev) => (high - low)
                .max((high - prev).abs())
                .max((low - prev).abs()),
        };

        if self.count <= self.period {
            self.sum_tr += tr;
            if self.count == self.period {
                self.value = self.sum_tr / self.period as f64;
            }
        } else {
            self.value = (self.value * (self.period as f64 - 1.0) + tr) / self.period as f64;
        }

        self.prev_close = Some(close);
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn initialized(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.prev_close = None;
        self.sum_tr = 0.0;
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

    fn bar(high: i64, low: i64, close: i64) -> Bar {
        Bar::new(
            BarType::new(
                "AAPL.XNAS".parse().unwrap(),
                BarSpecification::new(1, BarAggregation::Minute, PriceType::Last),
            ),
            Price::new(Decimal::from(low), 2),
            Price::new(Decimal::from(high), 2),
            Price::new(Decimal::from(low), 2),
            Price::new(Decimal::from(close), 2),
            Quantity::new(Decimal::from(1000), 0),
            0,
            0,
        )
    }

    #[test]
    fn test_atr_seed_is_mean_true_range() {
        let mut atr = AverageTrueRange::new(2);
        atr.handle_bar(&bar(110, 100, 105)); // TR = 10
        assert!(!atr.initialized());
        atr.handle_bar(&bar(112, 104, 110)); // TR = max(8, 7, 1) = 8
        assert!(atr.initialized());
        assert_eq!(atr.value(), 9.0);
    }

    #[test]
    fn test_atr_wilder_smoothing_after_seed() {
        let mut atr = AverageTrueRange::new(2);
        atr.handle_bar(&bar(110, 100, 105));
        atr.handle_bar(&bar(112, 104, 110));
        atr.handle_bar(&bar(114, 110, 112)); // TR = 4; (9*1 + 4)/2 = 6.5
        assert_eq!(atr.value(), 6.5);
    }

    #[test]
    fn test_gap_uses_prev_close() {
        let mut atr = AverageTrueRange::new(1);
        atr.handle_bar(&bar(110, 100, 105));
        // Gap up: high-prev_close dominates.
        atr.handle_bar(&bar(130, 125, 128));
        assert_eq!(atr.value(), 25.0);
    }
}

use std::collections::VecDeque;

use super::Indicator;
use crate::data::Bar;

/// Simple moving average of bar closes.
pub struct SimpleMovingAverage {
    name: String,
    period: usize,
    window: VecDeque<f64>,
    value: f64,
    count: usize,
}

impl SimpleMovingAverage {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be positive");
        Self {
            name: format!("SMA({period})"),
            period,
            window: VecDeque::with_capacity(period),
            value: 0.0,
            count: 0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for SimpleMovingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_bar(&mut self, bar: &Bar) {
        self.count += 1;
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(bar.close.as_f64());
        self.value = self.window.iter().sum::<f64>() / self.window.len() as f64;
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn initialized(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.window.clear();
        self.value = 0.0;
        self.count = 0;
    }
}

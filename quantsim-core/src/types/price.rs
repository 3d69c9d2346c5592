use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

fn quantize(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// A fixed-precision price, quantized half-up at construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Price {
    value: Decimal,
    precision: u32,
}

impl Price {
    pub fn new(value: Decimal, precision: u32) -> Self {
        Self {
            value: quantize(value, precision),
            precision,
        }
    }

    /// Parse from a string literal, mainly for fixtures and config.
    pub fn from_str_checked(value: &str, precision: u32) -> Option<Self> {
        Decimal::from_str(value).ok().map(|d| Self::new(d, precision))
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn as_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    pub fn min(self, other: Self) -> Self {
        if other.value < self.value {
            other
        } else {
            self
        }
    }

    pub fn max(self, other: Self) -> Self {
        if other.value > self.value {
            other
        } else {
            self
        }
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price::new(self.value + rhs.value, self.precision.max(rhs.precision))
    }
}

impl Sub for Price {
    type Output = Price;

    fn sub(self, rhs: Price) -> Price {
        Price::new(self.value - rhs.value, self.precision.max(rhs.precision))
    }
}

impl Mul<Decimal> for Price {
    type Output = Price;

    fn mul(self, rhs: Decimal) -> Price {
        Price::new(self.value * rhs, self.precision)
    }
}

impl Neg for Price {
    type Output = Price;

    fn neg(self) -> Price {
        Price::new(-self.value, self.precision)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A fixed-precision non-negative quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quantity {
    value: Decimal,
    precision: u32,
}

impl Quantity {
    pub fn new(value: Decimal, precision: u32) -> Self {
        let value = quantize(value, precision);
        assert!(
            value >= Decimal::ZERO,
            "Quantity value must be non-negative, got {value}"
        );
        Self { value, precision }
    }

    pub fn zero(precision: u32) -> Self {
        Self::new(Decimal::ZERO, precision)
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn as_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.value + rhs.value, self.precision.max(rhs.precision))
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.value - rhs.value, self.precision.max(rhs.precision))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

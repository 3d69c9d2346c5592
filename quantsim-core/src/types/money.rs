use std::fmt;
use std::ops::Neg;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::Currency;

/// A monetary amount in a specific currency.
///
/// Arithmetic across currencies is an invariant violation and aborts: there
/// is no conversion anywhere in the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        let amount = amount
            .round_dp_with_strategy(currency.precision(), RoundingStrategy::MidpointAwayFromZero);
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn as_f64(&self) -> f64 {
        self.amount.to_f64().unwrap_or(0.0)
    }

    pub fn add(&self, other: &Money) -> Money {
        assert_eq!(
            self.currency, other.currency,
            "cannot add {} and {}",
            self.currency, other.currency
        );
        Money::new(self.amount + other.amount, self.currency.clone())
    }

    pub fn sub(&self, other: &Money) -> Money {
        assert_eq!(
            self.currency, other.currency,
            "cannot subtract {} from {}",
            other.currency, self.currency
        );
        Money::new(self.amount - other.amount, self.currency.clone())
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::new(-self.amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// A single-currency account balance with `free = total - locked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    total: Money,
    locked: Money,
    free: Money,
}

impl AccountBalance {
    /// Builds a balance from total and locked; `free` is derived.
    pub fn new(total: Money, locked: Money) -> Self {
        assert_eq!(
            total.currency(),
            locked.currency(),
            "balance components must share a currency"
        );
        let free = total.sub(&locked);
        Self { total, locked, free }
    }

    pub fn total(&self) -> &Money {
        &self.total
    }

    pub fn locked(&self) -> &Money {
        &self.locked
    }

    pub fn free(&self) -> &Money {
        &self.free
    }

    pub fn currency(&self) -> &Currency {
        self.total.currency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_quantized_to_currency_precision() {
        let m = Money::new(dec!(10.005), Currency::usd());
        assert_eq!(m.amount(), dec!(10.01));
    }

    #[test]
    fn test_money_same_currency_arithmetic() {
        let a = Money::new(dec!(100), Currency::usd());
        let b = Money::new(dec!(40.50), Currency::usd());
        assert_eq!(a.sub(&b).amount(), dec!(59.50));
        assert_eq!(a.add(&b).amount(), dec!(140.50));
    }

    #[test]
    #[should_panic(expected = "cannot add")]
    fn test_money_currency_mismatch_panics() {
        let a = Money::new(dec!(100), Currency::usd());
        let b = Money::new(dec!(100), Currency::eur());
        let _ = a.add(&b);
    }

    #[test]
    fn test_balance_free_is_derived() {
        let bal = AccountBalance::new(
            Money::new(dec!(1000), Currency::usd()),
            Money::new(dec!(250), Currency::usd()),
        );
        assert_eq!(bal.free().amount(), dec!(750));
        assert_eq!(bal.total().amount(), dec!(1000));
    }

    #[test]
    #[should_panic(expected = "share a currency")]
    fn test_balance_currency_mismatch_panics() {
        let _ = AccountBalance::new(
            Money::new(dec!(1000), Currency::usd()),
            Money::new(dec!(0), Currency::eur()),
        );
    }
}

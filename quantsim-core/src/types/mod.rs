//! Exact-decimal value types used in every monetary path.

mod currency;
mod money;
mod price;

pub use currency::Currency;
pub use money::{AccountBalance, Money};
pub use price::{Price, Quantity};

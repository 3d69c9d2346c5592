//! Example strategies used by the integration tests and the demo runner.

mod buy_and_hold;
mod ema_cross;

pub use buy_and_hold::BuyAndHold;
pub use ema_cross::{EmaCross, EmaCrossConfig};

//! Kernel enumerations, including the order-status transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side that closes a position opened on this side.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    StopMarket,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancel.
    Gtc,
    /// Immediate or cancel.
    Ioc,
    /// Fill or kill.
    Fok,
    /// Good till date.
    Gtd,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Initialized,
    Denied,
    Submitted,
    Accepted,
    Rejected,
    Canceled,
    Expired,
    Triggered,
    PendingUpdate,
    PendingCancel,
    PartiallyFilled,
    Filled,
}

impl OrderStatus {
    /// Whether `target` is a legal successor of `self`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Initialized => matches!(target, Denied | Submitted),
            Submitted => matches!(target, Accepted | Rejected | Canceled),
            Accepted => matches!(
                target,
                Canceled
                    | Expired
                    | Triggered
                    | PendingUpdate
                    | PendingCancel
                    | PartiallyFilled
                    | Filled
            ),
            Triggered => matches!(target, Canceled | Expired | PartiallyFilled | Filled),
            PartiallyFilled => matches!(target, Canceled | PartiallyFilled | Filled),
            PendingUpdate | PendingCancel => matches!(target, Accepted | Canceled),
            Denied | Rejected | Canceled | Expired | Filled => false,
        }
    }

    /// Terminal statuses have no legal successors.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Denied
                | OrderStatus::Rejected
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Filled
        )
    }

    /// Open statuses are eligible for matching at a venue.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted
                | OrderStatus::Triggered
                | OrderStatus::PendingUpdate
                | OrderStatus::PendingCancel
                | OrderStatus::PartiallyFilled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Cash,
    Margin,
}

/// Order-management discipline governing position aggregation per venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OmsType {
    /// One position per instrument per strategy.
    Netting,
    /// Multiple simultaneous positions per instrument.
    Hedging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Fx,
    Equity,
    Commodity,
    Crypto,
    Bond,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyType {
    Fiat,
    Crypto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquiditySide {
    Maker,
    Taker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarAggregation {
    Tick,
    Second,
    Minute,
    Hour,
    Day,
}

impl fmt::Display for BarAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BarAggregation::Tick => "TICK",
            BarAggregation::Second => "SECOND",
            BarAggregation::Minute => "MINUTE",
            BarAggregation::Hour => "HOUR",
            BarAggregation::Day => "DAY",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceType {
    Bid,
    Ask,
    Mid,
    Last,
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceType::Bid => "BID",
            PriceType::Ask => "ASK",
            PriceType::Mid => "MID",
            PriceType::Last => "LAST",
        };
        write!(f, "{s}")
    }
}

/// Global trading state enforced by the risk engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingState {
    Active,
    /// Only orders that reduce net exposure are allowed.
    Reducing,
    /// All order flow is denied.
    Halted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        use OrderStatus::*;
        let all = [
            Initialized,
            Denied,
            Submitted,
            Accepted,
            Rejected,
            Canceled,
            Expired,
            Triggered,
            PendingUpdate,
            PendingCancel,
            PartiallyFilled,
            Filled,
        ];
        for terminal in [Denied, Rejected, Canceled, Expired, Filled] {
            assert!(terminal.is_terminal());
            for target in all {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_accepted_successors() {
        use OrderStatus::*;
        assert!(Accepted.can_transition_to(Filled));
        assert!(Accepted.can_transition_to(PartiallyFilled));
        assert!(Accepted.can_transition_to(Triggered));
        assert!(!Accepted.can_transition_to(Submitted));
        assert!(!Accepted.can_transition_to(Denied));
    }

    #[test]
    fn test_partially_filled_can_fill_again() {
        use OrderStatus::*;
        assert!(PartiallyFilled.can_transition_to(PartiallyFilled));
        assert!(PartiallyFilled.can_transition_to(Filled));
        assert!(!PartiallyFilled.can_transition_to(Expired));
    }

    #[test]
    fn test_pending_states_resolve_to_accepted_or_canceled() {
        use OrderStatus::*;
        for pending in [PendingUpdate, PendingCancel] {
            assert!(pending.can_transition_to(Accepted));
            assert!(pending.can_transition_to(Canceled));
            assert!(!pending.can_transition_to(Filled));
        }
    }

    #[test]
    fn test_initialized_only_denied_or_submitted() {
        use OrderStatus::*;
        assert!(Initialized.can_transition_to(Denied));
        assert!(Initialized.can_transition_to(Submitted));
        assert!(!Initialized.can_transition_to(Filled));
        assert!(!Initialized.can_transition_to(Accepted));
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }
}

//! Property tests for kernel invariants.
//!
//! Uses proptest to verify:
//! 1. Order FSM — filled/leaves accounting holds over any fill partition
//! 2. Position accounting — side/quantity derive from signed quantity and
//!    realized PnL is permutation-invariant within non-flipping intervals
//! 3. Account balances — `free = total - locked` after any update sequence

use proptest::prelude::*;
use rust_decimal::Decimal;

use quantsim_core::account::Account;
use quantsim_core::enums::{
    LiquiditySide, OrderKind, OrderSide, OrderStatus, PositionSide, TimeInForce,
};
use quantsim_core::events::{
    OrderAccepted, OrderEvent, OrderFilled, OrderInitialized, OrderSubmitted,
};
use quantsim_core::identifiers::{
    AccountId, ClientOrderId, PositionId, StrategyId, TradeId, TraderId, VenueOrderId,
};
use quantsim_core::orders::Order;
use quantsim_core::position::Position;
use quantsim_core::types::{Currency, Money, Price, Quantity};

// ── Helpers ──────────────────────────────────────────────────────────

fn new_order(quantity: u32) -> Order {
    let mut order = Order::new(OrderInitialized {
        trader_id: TraderId::new("T-1"),
        strategy_id: StrategyId::new("S-1"),
        instrument_id: "AAPL.SIM".parse().unwrap(),
        client_order_id: ClientOrderId::new("O-S-1-1"),
        order_side: OrderSide::Buy,
        order_kind: OrderKind::Market,
        quantity: Quantity::new(Decimal::from(quantity), 0),
        time_in_force: TimeInForce::Gtc,
        price: None,
        trigger_price: None,
        ts_event: 0,
        ts_init: 0,
    });
    order.apply(OrderEvent::Submitted(OrderSubmitted {
        strategy_id: order.strategy_id().clone(),
        instrument_id: order.instrument_id().clone(),
        client_order_id: order.client_order_id().clone(),
        ts_event: 1,
        ts_init: 1,
    }));
    order.apply(OrderEvent::Accepted(OrderAccepted {
        strategy_id: order.strategy_id().clone(),
        instrument_id: order.instrument_id().clone(),
        client_order_id: order.client_order_id().clone(),
        venue_order_id: VenueOrderId::new("V-SIM-1"),
        account_id: AccountId::new("SIM-001"),
        ts_event: 2,
        ts_init: 2,
    }));
    order
}

fn fill_event(order: &Order, qty: u32, px_cents: u32, ts: i64) -> OrderEvent {
    OrderEvent::Filled(fill(order.side(), qty, px_cents, ts))
}

fn fill(side: OrderSide, qty: u32, px_cents: u32, ts: i64) -> OrderFilled {
    OrderFilled {
        strategy_id: StrategyId::new("S-1"),
        instrument_id: "AAPL.SIM".parse().unwrap(),
        client_order_id: ClientOrderId::new("O-S-1-1"),
        venue_order_id: VenueOrderId::new("V-SIM-1"),
        account_id: AccountId::new("SIM-001"),
        trade_id: TradeId::new("T-SIM-1"),
        position_id: None,
        order_side: side,
        order_kind: OrderKind::Market,
        last_qty: Quantity::new(Decimal::from(qty), 0),
        last_px: Price::new(Decimal::new(px_cents as i64, 2), 2),
        currency: Currency::usd(),
        commission: Money::zero(Currency::usd()),
        liquidity_side: LiquiditySide::Taker,
        ts_event: ts,
        ts_init: ts,
    }
}

// ── 1. Order FSM ─────────────────────────────────────────────────────

proptest! {
    /// Any partition of the order quantity into fills keeps
    /// `filled + leaves == quantity`, ends in Filled exactly when the
    /// partition is exhausted, and never leaves a negative remainder.
    #[test]
    fn fill_partition_accounting(
        chunks in prop::collection::vec(1u32..50, 1..8),
        px in 100u32..50_000,
    ) {
        let total: u32 = chunks.iter().sum();
        let mut order = new_order(total);

        let mut applied = 0u32;
        for (i, chunk) in chunks.iter().enumerate() {
            order.apply(fill_event(&order, *chunk, px, 3 + i as i64));
            applied += chunk;

            let filled = order.filled_qty().value();
            let leaves = order.leaves_qty().value();
            prop_assert_eq!(filled, Decimal::from(applied));
            prop_assert_eq!(filled + leaves, Decimal::from(total));
            prop_assert!(leaves >= Decimal::ZERO);

            if applied == total {
                prop_assert_eq!(order.status(), OrderStatus::Filled);
            } else {
                prop_assert_eq!(order.status(), OrderStatus::PartiallyFilled);
            }
        }

        prop_assert!(order.is_filled());
        prop_assert_eq!(
            order.avg_px().unwrap(),
            Decimal::new(px as i64, 2)
        );
    }

    /// A filled order is terminal: further fills violate the FSM.
    #[test]
    fn no_fill_after_terminal(qty in 1u32..100, px in 100u32..50_000) {
        let mut order = new_order(qty);
        order.apply(fill_event(&order, qty, px, 3));
        prop_assert!(order.is_filled());

        let extra = fill_event(&order, 1, px, 4);
        let result = std::panic::catch_unwind(move || {
            order.apply(extra);
        });
        prop_assert!(result.is_err(), "fill after terminal must abort");
    }
}

// ── 2. Position accounting ───────────────────────────────────────────

proptest! {
    /// Side and quantity always derive from the signed quantity.
    #[test]
    fn side_derives_from_signed_qty(
        steps in prop::collection::vec((prop::bool::ANY, 1u32..50, 100u32..50_000), 1..12),
    ) {
        let (buy, qty, px) = steps[0];
        let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
        let mut position = Position::new(PositionId::new("P-1"), fill(side, qty, px, 0));

        for (i, (buy, qty, px)) in steps.iter().enumerate().skip(1) {
            if position.is_closed() {
                break;
            }
            let side = if *buy { OrderSide::Buy } else { OrderSide::Sell };
            position.apply(fill(side, *qty, *px, 1 + i as i64));
        }

        let signed = position.signed_qty();
        let expected_side = if signed > Decimal::ZERO {
            PositionSide::Long
        } else if signed < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        };
        prop_assert_eq!(position.side(), expected_side);
        prop_assert_eq!(position.quantity().value(), signed.abs());
    }

    /// Realized PnL is invariant under permutations of the opening fills:
    /// build up with buys in any order, close in one sell, and the result
    /// only depends on the multiset of opening fills.
    #[test]
    fn realized_pnl_permutation_invariant_without_flip(
        mut opens in prop::collection::vec((1u32..50, 100u32..50_000), 2..6),
        close_px in 100u32..50_000,
        rotation in 0usize..6,
    ) {
        let total: u32 = opens.iter().map(|(q, _)| q).sum();

        let build = |opens: &[(u32, u32)]| -> Decimal {
            let (q0, p0) = opens[0];
            let mut position =
                Position::new(PositionId::new("P-1"), fill(OrderSide::Buy, q0, p0, 0));
            for (i, (q, p)) in opens.iter().enumerate().skip(1) {
                position.apply(fill(OrderSide::Buy, *q, *p, 1 + i as i64));
            }
            position.apply(fill(OrderSide::Sell, total, close_px, 100));
            assert!(position.is_closed());
            position.realized_pnl()
        };

        let original = build(&opens);
        let k = rotation % opens.len();
        opens.rotate_left(k);
        let rotated = build(&opens);

        prop_assert_eq!(original, rotated);
    }

    /// Closing the whole position realizes exactly
    /// `qty * (close - avg_entry)` for longs.
    #[test]
    fn close_realizes_entry_to_exit(
        qty in 1u32..500,
        entry in 100u32..50_000,
        exit in 100u32..50_000,
    ) {
        let mut position =
            Position::new(PositionId::new("P-1"), fill(OrderSide::Buy, qty, entry, 0));
        position.apply(fill(OrderSide::Sell, qty, exit, 1));

        let expected = Decimal::from(qty)
            * (Decimal::new(exit as i64, 2) - Decimal::new(entry as i64, 2));
        prop_assert_eq!(position.realized_pnl(), expected);
        prop_assert!(position.is_closed());
    }
}

// ── 3. Account balances ──────────────────────────────────────────────

proptest! {
    /// `free = total - locked` holds after any sequence of updates.
    #[test]
    fn free_is_total_minus_locked(
        updates in prop::collection::vec((0i64..1_000_000, 0i64..100_000), 1..20),
    ) {
        let mut account = Account::cash(
            AccountId::new("SIM-001"),
            Currency::usd(),
            vec![Money::new(Decimal::from(100_000), Currency::usd())],
        );

        for (total, locked) in updates {
            let locked = locked.min(total);
            account.update_balance(
                &Currency::usd(),
                Decimal::from(total),
                Decimal::from(locked),
            );
            let balance = account.balance(&Currency::usd()).unwrap();
            prop_assert_eq!(
                balance.free().amount(),
                balance.total().amount() - balance.locked().amount()
            );
        }
    }
}

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::operations::{compute_total_amount, Operation, OperationSide};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()
}

fn trade(side: OperationSide, quantity: Decimal, price: Decimal, fees: Decimal, day: i64) -> Trade {
    Trade {
        symbol: "AAPL".to_string(),
        side,
        quantity,
        price,
        fees,
        executed_at: t0() + Duration::days(day),
    }
}

fn op(id: &str, t: &Trade) -> Operation {
    Operation {
        id: id.to_string(),
        portfolio_id: "p1".to_string(),
        symbol: t.symbol.clone(),
        side: t.side,
        quantity: t.quantity,
        price: t.price,
        fees: t.fees,
        total_amount: compute_total_amount(t.side, t.quantity, t.price, t.fees),
        realized_gain: None,
        executed_at: t.executed_at,
        notes: None,
        created_at: t.executed_at,
    }
}

fn empty() -> Position {
    Position::empty("p1", "AAPL", "USD")
}

#[test]
fn test_first_buy_sets_average_to_price() {
    let applied = PositionLedger::apply(
        &empty(),
        &trade(OperationSide::Buy, dec!(10), dec!(150.50), dec!(1.50), 0),
    )
    .unwrap();

    assert_eq!(applied.position.quantity, dec!(10));
    assert_eq!(applied.position.average_cost, dec!(150.50));
    assert_eq!(applied.position.cost_basis, dec!(1505.00));
    assert_eq!(applied.position.opened_at, Some(t0()));
    assert_eq!(applied.realized_gain, None);
}

#[test]
fn test_weighted_average_excludes_fees() {
    let first = PositionLedger::apply(
        &empty(),
        &trade(OperationSide::Buy, dec!(10), dec!(150.50), dec!(1.50), 0),
    )
    .unwrap();
    let second = PositionLedger::apply(
        &first.position,
        &trade(OperationSide::Buy, dec!(5), dec!(155.00), dec!(1.00), 1),
    )
    .unwrap();

    assert_eq!(second.position.quantity, dec!(15));
    assert_eq!(second.position.average_cost, dec!(152.00));
    assert_eq!(second.position.book_cost(), dec!(2280.00));
}

#[test]
fn test_sell_keeps_average_and_realizes_gain_net_of_fees() {
    let mut position = empty();
    position.quantity = dec!(15);
    position.average_cost = dec!(152.00);
    position.cost_basis = dec!(2280.00);

    let applied = PositionLedger::apply(
        &position,
        &trade(OperationSide::Sell, dec!(3), dec!(160), dec!(2.00), 2),
    )
    .unwrap();

    assert_eq!(applied.position.quantity, dec!(12));
    assert_eq!(applied.position.average_cost, dec!(152.00));
    assert_eq!(applied.position.cost_basis, dec!(1824.00));
    assert_eq!(applied.realized_gain, Some(dec!(22.00)));
}

#[test]
fn test_oversell_is_rejected_without_change() {
    let mut position = empty();
    position.quantity = dec!(15);
    position.average_cost = dec!(152.00);
    position.cost_basis = dec!(2280.00);
    let before = position.clone();

    let err = PositionLedger::apply(
        &position,
        &trade(OperationSide::Sell, dec!(20), dec!(160), Decimal::ZERO, 2),
    )
    .unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientQuantity {
            symbol: "AAPL".to_string(),
            requested: dec!(20),
            available: dec!(15),
        }
    );
    assert_eq!(position, before);
}

#[test]
fn test_rejects_invalid_inputs() {
    let cases = [
        trade(OperationSide::Buy, Decimal::ZERO, dec!(10), Decimal::ZERO, 0),
        trade(OperationSide::Buy, dec!(1), dec!(-1), Decimal::ZERO, 0),
        trade(OperationSide::Buy, dec!(1), dec!(10), dec!(-0.01), 0),
        Trade {
            symbol: "  ".to_string(),
            ..trade(OperationSide::Buy, dec!(1), dec!(10), Decimal::ZERO, 0)
        },
    ];
    for case in cases {
        assert!(matches!(
            PositionLedger::apply(&empty(), &case),
            Err(LedgerError::Validation(_))
        ));
    }
}

#[test]
fn test_selling_everything_closes_but_retains_position() {
    let bought = PositionLedger::apply(
        &empty(),
        &trade(OperationSide::Buy, dec!(4), dec!(25), Decimal::ZERO, 0),
    )
    .unwrap();
    let sold = PositionLedger::apply(
        &bought.position,
        &trade(OperationSide::Sell, dec!(4), dec!(30), Decimal::ZERO, 1),
    )
    .unwrap();

    assert_eq!(sold.position.quantity, Decimal::ZERO);
    assert_eq!(sold.position.cost_basis, Decimal::ZERO);
    assert!(!sold.position.is_open());
    assert_eq!(sold.realized_gain, Some(dec!(20)));

    let reopened = PositionLedger::apply(
        &sold.position,
        &trade(OperationSide::Buy, dec!(2), dec!(40), Decimal::ZERO, 2),
    )
    .unwrap();
    assert_eq!(reopened.position.average_cost, dec!(40));
    assert_eq!(reopened.position.opened_at, Some(t0() + Duration::days(2)));
}

#[test]
fn test_average_rounds_half_to_even() {
    // 20.01 / 2 = 10.005 sits exactly on the midpoint.
    let first = PositionLedger::apply(
        &empty(),
        &trade(OperationSide::Buy, dec!(1), dec!(10.00), Decimal::ZERO, 0),
    )
    .unwrap();
    let second = PositionLedger::apply(
        &first.position,
        &trade(OperationSide::Buy, dec!(1), dec!(10.01), Decimal::ZERO, 1),
    )
    .unwrap();
    assert_eq!(second.position.average_cost, dec!(10.00));
    assert_eq!(second.position.cost_basis, dec!(20.01));
}

#[test]
fn test_replay_orders_by_timestamp_and_matches_incremental() {
    let buy1 = trade(OperationSide::Buy, dec!(10), dec!(150.50), dec!(1.50), 0);
    let buy2 = trade(OperationSide::Buy, dec!(5), dec!(155.00), dec!(1.00), 1);
    let sell = trade(OperationSide::Sell, dec!(3), dec!(160), Decimal::ZERO, 2);

    let mut incremental = empty();
    for t in [&buy1, &buy2, &sell] {
        incremental = PositionLedger::apply(&incremental, t).unwrap().position;
    }

    let shuffled = vec![op("c", &sell), op("a", &buy1), op("b", &buy2)];
    let outcome = PositionLedger::replay(&empty(), &shuffled).unwrap();

    assert_eq!(outcome.position, incremental);
    assert_eq!(
        outcome.realized_gains,
        vec![
            ("a".to_string(), None),
            ("b".to_string(), None),
            ("c".to_string(), Some(dec!(24.00))),
        ]
    );
}

#[test]
fn test_replay_rejects_history_that_oversells() {
    let sell_first = op(
        "s",
        &trade(OperationSide::Sell, dec!(1), dec!(10), Decimal::ZERO, 0),
    );
    let buy_later = op(
        "b",
        &trade(OperationSide::Buy, dec!(1), dec!(10), Decimal::ZERO, 1),
    );
    let err = PositionLedger::replay(&empty(), &[buy_later, sell_first]).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientQuantity { .. }));
}

#[test]
fn test_replay_keeps_seed_version_and_identity() {
    let mut seed = empty();
    seed.version = 7;
    seed.quantity = dec!(99);
    let outcome = PositionLedger::replay(&seed, &[]).unwrap();
    assert_eq!(outcome.position.version, 7);
    assert_eq!(outcome.position.quantity, Decimal::ZERO);
    assert_eq!(outcome.position.symbol, "AAPL");
}

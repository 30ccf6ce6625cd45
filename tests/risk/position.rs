use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use leverage_sim::core::{PositionSide, RiskLevel};
use leverage_sim::ledger::LedgerEngine;
use leverage_sim::risk::{
    assess_position, distance_to_liquidation, liquidation_price, position_risk_level,
    worst_risk_level,
};

#[test]
fn ten_x_long_liquidates_near_ninety() {
    let long = liquidation_price(PositionSide::Long, dec!(100), dec!(10), dec!(0.005));
    assert_eq!(long, Some(dec!(90.5)));

    let short = liquidation_price(PositionSide::Short, dec!(100), dec!(10), dec!(0.005));
    assert_eq!(short, Some(dec!(109.5)));
}

#[test]
fn unleveraged_positions_have_no_liquidation_price() {
    assert_eq!(
        liquidation_price(PositionSide::Long, dec!(100), dec!(1), dec!(0.005)),
        None
    );
    assert_eq!(distance_to_liquidation(PositionSide::Long, dec!(100), None), None);
    assert_eq!(position_risk_level(None, dec!(1)), RiskLevel::Low);
}

#[test]
fn distance_is_signed_by_side() {
    let long = distance_to_liquidation(PositionSide::Long, dec!(100), Some(dec!(90.5)));
    assert_eq!(long, Some(dec!(9.5)));

    let short = distance_to_liquidation(PositionSide::Short, dec!(100), Some(dec!(109.5)));
    assert_eq!(short, Some(dec!(9.5)));

    let crossed = distance_to_liquidation(PositionSide::Long, dec!(80), Some(dec!(90)));
    assert!(crossed.unwrap() < Decimal::ZERO);
}

#[test]
fn risk_level_thresholds() {
    assert_eq!(position_risk_level(Some(dec!(4)), dec!(2)), RiskLevel::Extreme);
    assert_eq!(position_risk_level(Some(dec!(50)), dec!(11)), RiskLevel::Extreme);
    assert_eq!(position_risk_level(Some(dec!(9.5)), dec!(10)), RiskLevel::High);
    assert_eq!(position_risk_level(Some(dec!(15)), dec!(2)), RiskLevel::Medium);
    assert_eq!(position_risk_level(Some(dec!(50)), dec!(4)), RiskLevel::Medium);
    assert_eq!(position_risk_level(Some(dec!(25)), dec!(2)), RiskLevel::Low);
}

#[test]
fn assess_position_reports_margin_usage() {
    let mut ledger = LedgerEngine::new(dec!(1000));
    let position = ledger
        .open(PositionSide::Long, dec!(100), dec!(1), dec!(10), dec!(0.005))
        .unwrap()
        .clone();

    let snapshot = assess_position(&position, dec!(100));
    assert_eq!(snapshot.notional, dec!(100));
    assert_eq!(snapshot.unrealized_pnl, Decimal::ZERO);
    assert_eq!(snapshot.margin_usage_percent, dec!(100));
    assert_eq!(snapshot.distance_to_liq_percent, Some(dec!(9.5)));
    assert_eq!(snapshot.risk_level, RiskLevel::High);

    let rallied = assess_position(&position, dec!(110));
    assert_eq!(rallied.unrealized_pnl, dec!(10));
    assert_eq!(rallied.margin_usage_percent, dec!(110));
}

#[test]
fn worst_risk_level_skips_liquidated_positions() {
    let mut ledger = LedgerEngine::new(dec!(1000));
    assert_eq!(worst_risk_level(ledger.positions(), dec!(100)), RiskLevel::Low);

    ledger
        .open(PositionSide::Long, dec!(100), dec!(1), dec!(10), dec!(0.005))
        .unwrap();
    assert_eq!(worst_risk_level(ledger.positions(), dec!(100)), RiskLevel::High);

    ledger.on_price_update(dec!(90));
    assert_eq!(worst_risk_level(ledger.positions(), dec!(90)), RiskLevel::Low);
}

proptest! {
    #[test]
    fn liquidation_sits_on_the_adverse_side(
        entry in 1i64..100_000,
        leverage in 2i64..=50,
        mmr_bps in 1i64..10,
    ) {
        let entry = Decimal::from(entry);
        let leverage = Decimal::from(leverage);
        let mmr = Decimal::new(mmr_bps, 3);

        let long = liquidation_price(PositionSide::Long, entry, leverage, mmr).unwrap();
        let short = liquidation_price(PositionSide::Short, entry, leverage, mmr).unwrap();
        prop_assert!(long < entry);
        prop_assert!(short > entry);
    }
}

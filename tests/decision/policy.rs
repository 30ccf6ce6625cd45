use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use leverage_sim::config::RunConfig;
use leverage_sim::core::{PositionSide, RiskLevel, SignalAction};
use leverage_sim::decision::{DecisionPolicy, TradeAction};
use leverage_sim::strategies::CombinedSignal;

fn scores(buy: Decimal, sell: Decimal) -> CombinedSignal {
    CombinedSignal {
        action: SignalAction::Hold,
        score_buy: buy,
        score_sell: sell,
        score_hold: Decimal::ZERO,
        reasons: Vec::new(),
    }
}

#[test]
fn baseline_policy_parameters() {
    let policy = DecisionPolicy::from_run_config(&RunConfig::default());
    assert_eq!(policy.aggressiveness(), dec!(1));
    assert_eq!(policy.open_threshold(), dec!(0.65));
    assert_eq!(policy.close_threshold(), dec!(0.455));
    assert_eq!(policy.size_fraction(), dec!(0.08));
    assert_eq!(policy.leverage(), dec!(1));
}

#[test]
fn aggressiveness_scales_thresholds_size_and_leverage() {
    let bold = DecisionPolicy::new(dec!(2), dec!(5));
    assert_eq!(bold.open_threshold(), dec!(0.45));
    assert_eq!(bold.size_fraction(), dec!(0.13));
    assert_eq!(bold.leverage(), dec!(2.5));

    let capped = DecisionPolicy::new(dec!(2), dec!(2));
    assert_eq!(capped.leverage(), dec!(2));

    let timid = DecisionPolicy::new(dec!(0.4), dec!(5));
    assert_eq!(timid.open_threshold(), dec!(0.77));
    assert_eq!(timid.size_fraction(), dec!(0.05));
    assert_eq!(timid.leverage(), dec!(1));
}

#[test]
fn opens_on_bias_above_threshold() {
    let policy = DecisionPolicy::new(dec!(1), dec!(5));

    let decision = policy.decide(&scores(dec!(0.9), dec!(0.1)), RiskLevel::Low, None);
    assert_eq!(
        decision.action,
        TradeAction::OpenLong {
            size_fraction: dec!(0.08),
            leverage: dec!(1),
        }
    );
    assert_eq!(decision.reason, "Buy bias 0.80 (threshold 0.65)");

    let decision = policy.decide(&scores(dec!(0), dec!(0.7)), RiskLevel::Low, None);
    assert!(matches!(decision.action, TradeAction::OpenShort { .. }));
    assert_eq!(decision.reason, "Sell bias 0.70 (threshold 0.65)");

    let decision = policy.decide(&scores(dec!(0.6), dec!(0)), RiskLevel::Low, None);
    assert_eq!(decision.action, TradeAction::Hold);
    assert_eq!(decision.reason, "No strong signal detected");
}

#[test]
fn extreme_risk_forces_close_of_held_position() {
    let policy = DecisionPolicy::new(dec!(1), dec!(5));
    let decision = policy.decide(
        &scores(dec!(1), dec!(0)),
        RiskLevel::Extreme,
        Some(PositionSide::Long),
    );
    assert_eq!(decision.action, TradeAction::Close);
    assert_eq!(
        decision.reason,
        "Emergency close due to extreme liquidation risk"
    );
}

#[test]
fn opposite_signal_closes_held_position() {
    let policy = DecisionPolicy::new(dec!(1), dec!(5));

    let decision = policy.decide(
        &scores(dec!(0.2), dec!(0.8)),
        RiskLevel::Low,
        Some(PositionSide::Long),
    );
    assert_eq!(decision.action, TradeAction::Close);
    assert_eq!(
        decision.reason,
        "Closing long position due to strengthening opposite signal"
    );

    let decision = policy.decide(
        &scores(dec!(0.8), dec!(0.2)),
        RiskLevel::Medium,
        Some(PositionSide::Short),
    );
    assert_eq!(decision.action, TradeAction::Close);

    let decision = policy.decide(
        &scores(dec!(0.9), dec!(0.1)),
        RiskLevel::High,
        Some(PositionSide::Long),
    );
    assert_eq!(decision.action, TradeAction::Hold);
    assert_eq!(decision.reason, "Holding existing position");
}

#[test]
fn never_opens_while_a_position_is_held() {
    let policy = DecisionPolicy::new(dec!(2), dec!(5));
    let decision = policy.decide(
        &scores(dec!(0), dec!(0.3)),
        RiskLevel::Low,
        Some(PositionSide::Short),
    );
    assert_eq!(decision.action, TradeAction::Hold);
}

#[test]
fn actions_display_in_kebab_case() {
    let open = TradeAction::OpenLong {
        size_fraction: dec!(0.1),
        leverage: dec!(2),
    };
    assert_eq!(open.to_string(), "open-long");
    assert_eq!(TradeAction::Close.to_string(), "close");
    assert_eq!(TradeAction::Hold.to_string(), "hold");
}

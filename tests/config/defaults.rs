use std::str::FromStr;

use leverage_sim::config::{
    Config, ConfigError, LogFormat, MAX_AGGRESSIVENESS, MIN_AGGRESSIVENESS, StrategyKind,
    get_default_config,
};
use leverage_sim::core::Timeframe;
use rust_decimal_macros::dec;

#[test]
fn defaults_are_valid() {
    let config = get_default_config();
    config.validate().unwrap();

    assert_eq!(config.generator.initial_price, dec!(100));
    assert_eq!(config.generator.candles, 500);
    assert_eq!(config.generator.volatility, dec!(0.02));
    assert_eq!(config.generator.trend_strength, dec!(0.3));
    assert_eq!(config.generator.shock_probability, dec!(0.05));
    assert_eq!(config.run.symbol, "BTCUSDT");
    assert_eq!(config.run.timeframe, Timeframe::M15);
    assert_eq!(config.run.max_leverage, dec!(5));
    assert_eq!(config.run.mmr, dec!(0.005));
    assert_eq!(config.run.history_window, 100);
    assert_eq!(config.strategy.enabled.len(), 7);
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[test]
fn aggressiveness_bounds_are_inclusive() {
    let mut config = Config::default();
    config.run.aggressiveness = MIN_AGGRESSIVENESS;
    config.validate().unwrap();
    config.run.aggressiveness = MAX_AGGRESSIVENESS;
    config.validate().unwrap();
    config.run.aggressiveness = dec!(0.39);
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_bad_generator_params() {
    let mut config = Config::default();
    config.generator.initial_price = dec!(0);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue {
            field: "generator.initial_price",
            ..
        })
    ));

    let mut config = Config::default();
    config.generator.shock_probability = dec!(1.5);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.generator.candles = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_bounds_series_length_and_volatility() {
    let mut config = Config::default();
    config.generator.volatility = dec!(1000);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue {
            field: "generator.volatility",
            ..
        })
    ));

    let mut config = Config::default();
    config.generator.volatility = dec!(1);
    assert!(config.validate().is_ok());

    let mut config = Config::default();
    config.generator.candles = 4_000_000;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue {
            field: "generator.candles",
            ..
        })
    ));
}

#[test]
fn validate_requires_enabled_strategies() {
    let mut config = Config::default();
    config.strategy.enabled.clear();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingValue {
            field: "strategy.enabled"
        })
    ));
}

#[test]
fn validate_rejects_sub_unit_leverage() {
    let mut config = Config::default();
    config.run.max_leverage = dec!(0.5);
    assert!(config.validate().is_err());
}

#[test]
fn timeframe_labels_round_trip() {
    for timeframe in Timeframe::all() {
        assert_eq!(Timeframe::from_str(timeframe.label()).unwrap(), *timeframe);
    }
    assert_eq!(Timeframe::H4.duration_ms(), 4 * 60 * 60 * 1000);
    assert_eq!(Timeframe::M15.to_string(), "15m");
    assert!(Timeframe::from_str("2d").is_err());
}

#[test]
fn strategy_kind_parses_loose_names() {
    assert_eq!(
        StrategyKind::from_str("multi-timeframe").unwrap(),
        StrategyKind::MultiTimeframe
    );
    assert_eq!(StrategyKind::from_str(" Swing ").unwrap(), StrategyKind::Swing);
    assert!(StrategyKind::from_str("arbitrage").is_err());
    assert_eq!(StrategyKind::MultiTimeframe.to_string(), "Multi-Timeframe");
}

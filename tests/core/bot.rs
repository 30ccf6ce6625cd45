use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;

use leverage_sim::config::{Config, ConfigError, StrategyKind};
use leverage_sim::core::bot::{BotError, TradeBot};
use leverage_sim::core::{Candle, PositionSide, Timeframe};
use leverage_sim::logging::{TickEvent, TickLog, TickLogWriter};
use leverage_sim::simulation::{CandleGenerator, GeneratorParams, StepperError};

fn candles(closes: &[Decimal]) -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(index, close)| Candle {
            timestamp: start + Duration::minutes(15 * index as i64),
            open: *close,
            high: *close,
            low: *close,
            close: *close,
            volume: dec!(10),
            timeframe: Timeframe::M15,
            symbol: None,
        })
        .collect()
}

fn generated(count: usize, seed: u64) -> Vec<Candle> {
    let config = Config::default();
    let params = GeneratorParams {
        candles: count,
        ..GeneratorParams::from_config(&config)
    };
    CandleGenerator::new(params)
        .unwrap()
        .generate_seeded(seed, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        .unwrap()
}

/// Funding-only setup that keeps a steady buy bias above the open threshold.
fn always_long_config() -> Config {
    let mut config = Config::default();
    config.strategy.enabled = vec![StrategyKind::Funding];
    config.run.funding_rate = Some(dec!(-0.003));
    config.run.aggressiveness = dec!(2);
    config
}

#[derive(Default)]
struct CollectingWriter {
    ticks: Mutex<Vec<TickLog>>,
}

impl TickLogWriter for CollectingWriter {
    fn write(&self, tick: &TickLog) -> Result<(), std::io::Error> {
        self.ticks.lock().unwrap().push(tick.clone());
        Ok(())
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let first = TradeBot::new(Config::default(), generated(300, 7))
        .unwrap()
        .run()
        .unwrap();
    let second = TradeBot::new(Config::default(), generated(300, 7))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.initial_balance, dec!(10000));
    assert_eq!(first.pnl, first.final_equity - first.initial_balance);
    assert!(first.trades >= first.closed_trades);
    assert!(!first.cancelled);
}

#[test]
fn run_log_has_header_progress_and_footer() {
    let report = TradeBot::new(Config::default(), generated(250, 3))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.log[0], "Starting simulation for BTCUSDT on 15m");
    assert_eq!(report.log[1], "Initial balance: $10000.00");
    assert_eq!(report.log[2], "");
    assert!(report.log.iter().any(|line| line.starts_with("[Step 100] Price: $")));
    assert!(report.log.iter().any(|line| line.starts_with("[Step 200] Price: $")));
    assert!(!report.log.iter().any(|line| line.starts_with("[Step 250] Price: $")));
    assert_eq!(report.log.last().unwrap(), "Simulation completed.");
}

#[test]
fn opens_a_position_with_policy_sizing() {
    let writer = Arc::new(CollectingWriter::default());
    let report = TradeBot::new(always_long_config(), candles(&[dec!(100), dec!(100), dec!(100)]))
        .unwrap()
        .with_tick_writer(writer.clone())
        .run()
        .unwrap();

    assert_eq!(report.trades, 1);
    assert!(report.log.contains(
        &"[Step 1] OPEN LONG | Price: $100.00 | Size: 32.5000 | Leverage: 2.5x | Reason: Buy bias 0.55 (threshold 0.45)"
            .to_string()
    ));
    assert_eq!(report.final_balance, dec!(8700));
    assert_eq!(report.final_equity, dec!(10000));
    assert_eq!(report.pnl, Decimal::ZERO);

    let ticks = writer.ticks.lock().unwrap();
    assert_eq!(ticks.len(), 3);
    assert_eq!(ticks[0].events, vec![TickEvent::Open(PositionSide::Long)]);
    assert_eq!(ticks[0].open_positions, 1);
    assert_eq!(ticks[1].decision, "hold");
    assert!(ticks[2].events.is_empty());
}

#[test]
fn liquidation_forfeits_margin_and_is_logged() {
    let report = TradeBot::new(always_long_config(), candles(&[dec!(100), dec!(50)]))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.liquidations, 1);
    assert_eq!(report.trades, 2);
    assert!(report.log.contains(
        &"[Step 2] LIQUIDATED LONG | Price: $50.00 | Margin lost: $1300.00".to_string()
    ));
    assert_eq!(report.final_equity, dec!(8700));
    assert_eq!(report.pnl, dec!(-1300));
    assert_eq!(report.max_drawdown_percent, dec!(13));
}

#[test]
fn extreme_risk_triggers_emergency_close() {
    let report = TradeBot::new(always_long_config(), candles(&[dec!(100), dec!(63)]))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.liquidations, 0);
    assert_eq!(report.closed_trades, 1);
    assert!(report.log.contains(
        &"[Step 2] CLOSE | Price: $63.00 | PnL: $-1202.50 | Reason: Emergency close due to extreme liquidation risk"
            .to_string()
    ));
    assert_eq!(report.final_balance, dec!(8797.5));
}

#[test]
fn execution_errors_are_logged_and_the_run_continues() {
    let report = TradeBot::new(always_long_config(), candles(&[dec!(0), dec!(100)]))
        .unwrap()
        .run()
        .unwrap();

    let error = report
        .log
        .iter()
        .find(|line| line.starts_with("[Step 1] ERROR: invalid order"))
        .unwrap();
    assert!(error.ends_with("(action=open-long, price=0.00)"));
    assert_eq!(report.trades, 1);
    assert_eq!(report.log.last().unwrap(), "Simulation completed.");
}

#[test]
fn shutdown_stops_between_ticks() {
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = TradeBot::new(Config::default(), generated(50, 1))
        .unwrap()
        .with_shutdown(rx)
        .run()
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.trades, 0);
    assert_eq!(report.final_equity, dec!(10000));
    assert_eq!(report.log.last().unwrap(), "Simulation cancelled after 0 steps.");
}

#[test]
fn adaptive_aggressiveness_is_applied_at_construction() {
    let mut config = always_long_config();
    config.risk.adapt_aggressiveness = true;
    config.run.funding_rate = Some(dec!(0.003));
    let bot = TradeBot::new(config, candles(&[dec!(100), dec!(101)])).unwrap();
    assert_eq!(bot.policy().aggressiveness(), dec!(1.8));
    assert_eq!(bot.ledger().balance(), dec!(10000));
}

#[test]
fn rejects_empty_series_and_invalid_config() {
    assert!(matches!(
        TradeBot::new(Config::default(), Vec::new()),
        Err(BotError::EmptySeries)
    ));

    let mut config = Config::default();
    config.run.mmr = dec!(0.5);
    assert!(matches!(
        TradeBot::new(config, candles(&[dec!(100)])),
        Err(BotError::Config(ConfigError::InvalidValue { field: "run.mmr", .. }))
    ));
}

#[test]
fn fatal_errors_keep_their_source_variant() {
    let err = BotError::from(StepperError::DataExhausted { consumed: 3 });
    assert!(matches!(
        err,
        BotError::Data(StepperError::DataExhausted { consumed: 3 })
    ));
    assert_eq!(
        err.to_string(),
        "data error: market data exhausted after 3 candles"
    );
}

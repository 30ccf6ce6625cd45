use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use leverage_sim::core::{Candle, Timeframe};
use leverage_sim::data::{
    CandleCache, CandleSource, DataError, StaticCandleSource, SyntheticCandleSource, load_candles,
    save_candles, validate_series,
};
use leverage_sim::simulation::GeneratorParams;

fn anchor() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn series(count: i64, timeframe: Timeframe) -> Vec<Candle> {
    (0..count)
        .map(|index| {
            let price = Decimal::from(100 + index);
            Candle {
                timestamp: anchor() + Duration::milliseconds(timeframe.duration_ms() * index),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: Decimal::ONE,
                timeframe,
                symbol: Some("BTCUSDT".to_string()),
            }
        })
        .collect()
}

fn template() -> GeneratorParams {
    GeneratorParams {
        initial_price: dec!(100),
        candles: 10,
        timeframe: Timeframe::M15,
        volatility: dec!(0.02),
        trend_strength: dec!(0.3),
        shock_probability: dec!(0.05),
    }
}

struct CountingSource {
    inner: StaticCandleSource,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl CandleSource for CountingSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .fetch_candles(symbol, timeframe, limit, since, to)
            .await
    }
}

#[tokio::test]
async fn synthetic_source_is_reproducible() {
    let source = SyntheticCandleSource::new(template(), 11, anchor());
    let first = source
        .fetch_candles("ETHUSDT", Timeframe::H1, 24, None, None)
        .await
        .unwrap();
    let second = source
        .fetch_candles("ETHUSDT", Timeframe::H1, 24, None, None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 24);
    assert!(first.iter().all(|candle| candle.timeframe == Timeframe::H1));
    assert!(first.iter().all(|candle| candle.symbol.as_deref() == Some("ETHUSDT")));
    assert_eq!(first[23].timestamp, anchor() - Duration::hours(1));
}

#[tokio::test]
async fn static_source_filters_and_keeps_latest() {
    let mut candles = series(10, Timeframe::M15);
    candles.extend(series(3, Timeframe::H1));
    let source = StaticCandleSource::new(candles);

    let latest = source
        .fetch_candles("BTCUSDT", Timeframe::M15, 4, None, None)
        .await
        .unwrap();
    let closes: Vec<_> = latest.iter().map(|candle| candle.close).collect();
    assert_eq!(closes, vec![dec!(106), dec!(107), dec!(108), dec!(109)]);

    let since = anchor() + Duration::minutes(15 * 8);
    let tail = source
        .fetch_candles("BTCUSDT", Timeframe::M15, 100, Some(since), None)
        .await
        .unwrap();
    assert_eq!(tail.len(), 2);

    let missing = source
        .fetch_candles("ETHUSDT", Timeframe::M15, 4, None, None)
        .await;
    assert!(matches!(missing, Err(DataError::MissingData(_))));
}

#[tokio::test]
async fn cache_serves_repeated_requests() {
    let source = Arc::new(CountingSource {
        inner: StaticCandleSource::new(series(20, Timeframe::M15)),
        calls: AtomicUsize::new(0),
    });
    let mut cache = CandleCache::new(source.clone());

    let first = cache
        .fetch("BTCUSDT", Timeframe::M15, 5, None, None, false)
        .await
        .unwrap();
    let second = cache
        .fetch("BTCUSDT", Timeframe::M15, 5, None, None, false)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);

    cache
        .fetch("BTCUSDT", Timeframe::M15, 6, None, None, false)
        .await
        .unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn skip_cache_and_clear_force_refetch() {
    let source = Arc::new(CountingSource {
        inner: StaticCandleSource::new(series(20, Timeframe::M15)),
        calls: AtomicUsize::new(0),
    });
    let mut cache = CandleCache::new(source.clone());

    cache
        .fetch("BTCUSDT", Timeframe::M15, 5, None, None, true)
        .await
        .unwrap();
    assert!(cache.is_empty());
    cache
        .fetch("BTCUSDT", Timeframe::M15, 5, None, None, false)
        .await
        .unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    cache.clear_cache();
    assert!(cache.is_empty());
    cache
        .fetch("BTCUSDT", Timeframe::M15, 5, None, None, false)
        .await
        .unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cache_rejects_out_of_order_series() {
    let mut candles = series(3, Timeframe::M15);
    candles.swap(0, 2);
    let mut cache = CandleCache::new(Arc::new(StaticCandleSource::new(candles)));

    let result = cache
        .fetch("BTCUSDT", Timeframe::M15, 3, None, None, false)
        .await;
    assert!(matches!(result, Err(DataError::InconsistentData(_))));
    assert!(cache.is_empty());
}

#[test]
fn validate_series_tolerates_gaps() {
    let mut candles = series(3, Timeframe::M15);
    candles[2].timestamp += Duration::hours(5);
    validate_series(&candles).unwrap();

    candles[1].timestamp = candles[0].timestamp;
    assert!(validate_series(&candles).is_err());
}

#[test]
fn candles_round_trip_through_json_file() {
    let path = std::env::temp_dir().join(format!("sim-candles-{}.json", Uuid::new_v4()));
    let candles = series(5, Timeframe::H4);
    save_candles(&path, &candles).unwrap();

    assert_eq!(load_candles(&path).unwrap(), candles);

    fs::write(&path, "[]").unwrap();
    assert!(matches!(load_candles(&path), Err(DataError::MissingData(_))));

    fs::write(&path, "not json").unwrap();
    assert!(matches!(load_candles(&path), Err(DataError::Parse(_))));

    fs::remove_file(&path).unwrap();
}

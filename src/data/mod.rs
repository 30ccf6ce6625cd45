use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::core::{Candle, Timeframe};
use crate::simulation::{CandleGenerator, GeneratorParams};

pub mod summary;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("missing data: {0}")]
    MissingData(String),
    #[error("inconsistent data: {0}")]
    InconsistentData(String),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[async_trait::async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, DataError>;
}

/// Generator-backed source. Every fetch replays the same seed, so equal
/// requests return equal series.
#[derive(Debug, Clone)]
pub struct SyntheticCandleSource {
    template: GeneratorParams,
    seed: u64,
    anchor: DateTime<Utc>,
}

impl SyntheticCandleSource {
    pub fn new(template: GeneratorParams, seed: u64, anchor: DateTime<Utc>) -> Self {
        Self {
            template,
            seed,
            anchor,
        }
    }
}

#[async_trait::async_trait]
impl CandleSource for SyntheticCandleSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, DataError> {
        let params = GeneratorParams {
            candles: limit,
            timeframe,
            ..self.template.clone()
        };
        let generator =
            CandleGenerator::new(params).map_err(|err| DataError::InvalidParams(err.to_string()))?;
        let end = to.unwrap_or(self.anchor);
        let candles = generator
            .generate_seeded(self.seed, end)
            .map_err(|err| DataError::InvalidParams(err.to_string()))?
            .into_iter()
            .filter(|candle| since.is_none_or(|since| candle.timestamp >= since))
            .map(|candle| Candle {
                symbol: Some(symbol.to_string()),
                ..candle
            })
            .collect();
        Ok(candles)
    }
}

/// Fixed in-memory series, e.g. one loaded from disk.
#[derive(Debug, Clone, Default)]
pub struct StaticCandleSource {
    candles: Vec<Candle>,
}

impl StaticCandleSource {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }
}

#[async_trait::async_trait]
impl CandleSource for StaticCandleSource {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, DataError> {
        let matching: Vec<Candle> = self
            .candles
            .iter()
            .filter(|candle| candle.timeframe == timeframe)
            .filter(|candle| {
                candle
                    .symbol
                    .as_deref()
                    .is_none_or(|candle_symbol| candle_symbol == symbol)
            })
            .filter(|candle| since.is_none_or(|since| candle.timestamp >= since))
            .filter(|candle| to.is_none_or(|to| candle.timestamp <= to))
            .cloned()
            .collect();
        if matching.is_empty() {
            return Err(DataError::MissingData(format!(
                "no {timeframe} candles for {symbol}"
            )));
        }
        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub limit: usize,
    pub since: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Per-owner memo of fetched series in front of a [`CandleSource`].
pub struct CandleCache {
    source: Arc<dyn CandleSource>,
    entries: HashMap<CacheKey, Vec<Candle>>,
}

impl CandleCache {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// With `skip_cache` the source is always hit and the result is not stored.
    pub async fn fetch(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        since: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        skip_cache: bool,
    ) -> Result<Vec<Candle>, DataError> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            timeframe,
            limit,
            since,
            to,
        };
        if !skip_cache && let Some(cached) = self.entries.get(&key) {
            debug!(symbol, %timeframe, limit, "candle cache hit");
            return Ok(cached.clone());
        }
        let candles = self
            .source
            .fetch_candles(symbol, timeframe, limit, since, to)
            .await?;
        validate_series(&candles)?;
        if !skip_cache {
            self.entries.insert(key, candles.clone());
        }
        Ok(candles)
    }

    pub fn clear_cache(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Series must be strictly increasing in time; gaps are tolerated.
pub fn validate_series(candles: &[Candle]) -> Result<(), DataError> {
    for pair in candles.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(DataError::InconsistentData(format!(
                "candle at {} does not follow {}",
                pair[1].timestamp.to_rfc3339(),
                pair[0].timestamp.to_rfc3339()
            )));
        }
    }
    Ok(())
}

/// Reads a JSON array of candles.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>, DataError> {
    let content = std::fs::read_to_string(path).map_err(|err| DataError::Io(err.to_string()))?;
    let candles: Vec<Candle> =
        serde_json::from_str(&content).map_err(|err| DataError::Parse(err.to_string()))?;
    if candles.is_empty() {
        return Err(DataError::MissingData(format!(
            "no candles in {}",
            path.display()
        )));
    }
    validate_series(&candles)?;
    Ok(candles)
}

pub fn save_candles(path: &Path, candles: &[Candle]) -> Result<(), DataError> {
    let payload =
        serde_json::to_string_pretty(candles).map_err(|err| DataError::Parse(err.to_string()))?;
    std::fs::write(path, payload).map_err(|err| DataError::Io(err.to_string()))
}

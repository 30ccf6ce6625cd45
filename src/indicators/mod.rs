use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Candle;

#[derive(Debug, Error)]
pub enum IndicatorError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("math error: {0}")]
    Math(String),
}

pub const RSI_PERIOD: usize = 14;
pub const EMA_FAST_PERIOD: usize = 12;
pub const EMA_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;
pub const SMA_PERIOD: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub bollinger_period: usize,
    pub bollinger_multiplier: Decimal,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            bollinger_period: 20,
            bollinger_multiplier: Decimal::TWO,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.bollinger_period == 0 {
            return Err(IndicatorError::InvalidConfig(
                "bollinger_period must be > 0".to_string(),
            ));
        }
        if self.bollinger_multiplier <= Decimal::ZERO {
            return Err(IndicatorError::InvalidConfig(
                "bollinger_multiplier must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The signal line needs `26 + 9 - 1` closes, so it can lag the MACD line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: Decimal,
    pub signal: Option<Decimal>,
    pub histogram: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// Latest value of every indicator the window is long enough for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: Option<Decimal>,
    pub macd: Option<MacdValue>,
    pub ema_fast: Option<Decimal>,
    pub ema_slow: Option<Decimal>,
    pub sma: Option<Decimal>,
    pub bollinger: Option<BollingerBands>,
    pub obv: Option<Decimal>,
    pub vwap: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
}

pub fn compute_indicators(candles: &[Candle], config: &IndicatorConfig) -> IndicatorSet {
    let mut indicators = IndicatorSet::default();
    if candles.is_empty() {
        return indicators;
    }
    let closes: Vec<Decimal> = candles.iter().map(|candle| candle.close).collect();

    indicators.rsi = last(rsi(&closes, RSI_PERIOD));
    indicators.ema_fast = last(ema(&closes, EMA_FAST_PERIOD));
    indicators.ema_slow = last(ema(&closes, EMA_SLOW_PERIOD));
    indicators.sma = last(sma(&closes, SMA_PERIOD));

    let macd_series = macd(&closes, EMA_FAST_PERIOD, EMA_SLOW_PERIOD, MACD_SIGNAL_PERIOD);
    indicators.macd = macd_series.latest();

    let bands = bollinger(&closes, config.bollinger_period, config.bollinger_multiplier);
    indicators.bollinger = bands.latest();

    indicators.obv = obv(candles).last().copied();
    indicators.vwap = vwap(candles).last().copied();
    indicators
}

fn last(series: Vec<Option<Decimal>>) -> Option<Decimal> {
    series.last().copied().flatten()
}

pub fn sma(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }
    let divisor = Decimal::from(period as u64);
    let mut sum: Decimal = values[..period].iter().sum();
    result[period - 1] = Some(sum / divisor);
    for index in period..values.len() {
        sum += values[index] - values[index - period];
        result[index] = Some(sum / divisor);
    }
    result
}

/// Seeded with the SMA of the first `period` values.
pub fn ema(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }
    let multiplier = Decimal::TWO / Decimal::from(period as u64 + 1);
    let seed: Decimal = values[..period].iter().sum::<Decimal>() / Decimal::from(period as u64);
    result[period - 1] = Some(seed);
    let mut previous = seed;
    for index in period..values.len() {
        previous = (values[index] - previous) * multiplier + previous;
        result[index] = Some(previous);
    }
    result
}

/// Wilder-smoothed RSI; the first value lands at index `period`.
pub fn rsi(values: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period + 1 {
        return result;
    }
    let periods = Decimal::from(period as u64);
    let hundred = Decimal::ONE_HUNDRED;
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for index in 1..=period {
        let change = values[index] - values[index - 1];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses += change.abs();
        }
    }
    let mut avg_gain = gains / periods;
    let mut avg_loss = losses / periods;
    let score = |gain: Decimal, loss: Decimal| {
        if loss.is_zero() {
            hundred
        } else {
            hundred - hundred / (Decimal::ONE + gain / loss)
        }
    };
    result[period] = Some(score(avg_gain, avg_loss));

    for index in (period + 1)..values.len() {
        let change = values[index] - values[index - 1];
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);
        avg_gain = (avg_gain * (periods - Decimal::ONE) + gain) / periods;
        avg_loss = (avg_loss * (periods - Decimal::ONE) + loss) / periods;
        result[index] = Some(score(avg_gain, avg_loss));
    }
    result
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<Decimal>>,
    pub signal: Vec<Option<Decimal>>,
    pub histogram: Vec<Option<Decimal>>,
}

impl MacdSeries {
    pub fn latest(&self) -> Option<MacdValue> {
        let macd = self.macd.last().copied().flatten()?;
        Some(MacdValue {
            macd,
            signal: self.signal.last().copied().flatten(),
            histogram: self.histogram.last().copied().flatten(),
        })
    }
}

pub fn macd(
    values: &[Decimal],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdSeries {
    let fast = ema(values, fast_period);
    let slow = ema(values, slow_period);
    let line: Vec<Option<Decimal>> = fast
        .iter()
        .zip(slow.iter())
        .map(|(fast, slow)| match (fast, slow) {
            (Some(fast), Some(slow)) => Some(*fast - *slow),
            _ => None,
        })
        .collect();

    // EMA over the defined prefix, shifted back to the input index space.
    let mut signal = vec![None; values.len()];
    if let Some(first_valid) = line.iter().position(Option::is_some) {
        let valid: Vec<Decimal> = line[first_valid..].iter().flatten().copied().collect();
        for (offset, value) in ema(&valid, signal_period).into_iter().enumerate() {
            signal[first_valid + offset] = value;
        }
    }

    let histogram = line
        .iter()
        .zip(signal.iter())
        .map(|(macd, signal)| match (macd, signal) {
            (Some(macd), Some(signal)) => Some(*macd - *signal),
            _ => None,
        })
        .collect();

    MacdSeries {
        macd: line,
        signal,
        histogram,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Vec<Option<Decimal>>,
    pub middle: Vec<Option<Decimal>>,
    pub lower: Vec<Option<Decimal>>,
}

impl BollingerSeries {
    pub fn latest(&self) -> Option<BollingerBands> {
        Some(BollingerBands {
            upper: self.upper.last().copied().flatten()?,
            middle: self.middle.last().copied().flatten()?,
            lower: self.lower.last().copied().flatten()?,
        })
    }
}

/// SMA middle band widened by `multiplier` population standard deviations.
pub fn bollinger(values: &[Decimal], period: usize, multiplier: Decimal) -> BollingerSeries {
    let middle = sma(values, period);
    let mut upper = vec![None; values.len()];
    let mut lower = vec![None; values.len()];
    for (index, mean) in middle.iter().enumerate() {
        let Some(mean) = mean else {
            continue;
        };
        let window = &values[index + 1 - period..=index];
        let deviation = std_dev(window, *mean);
        upper[index] = Some(*mean + deviation * multiplier);
        lower[index] = Some(*mean - deviation * multiplier);
    }
    BollingerSeries {
        upper,
        middle,
        lower,
    }
}

fn std_dev(values: &[Decimal], mean: Decimal) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values
        .iter()
        .map(|value| {
            let diff = *value - mean;
            diff * diff
        })
        .sum();
    let variance = sum / Decimal::from(values.len() as u64);
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

/// Flat closes neither add nor subtract volume.
pub fn obv(candles: &[Candle]) -> Vec<Decimal> {
    let mut current = Decimal::ZERO;
    let mut previous_close = None;
    candles
        .iter()
        .map(|candle| {
            if let Some(previous) = previous_close {
                if candle.close > previous {
                    current += candle.volume;
                } else if candle.close < previous {
                    current -= candle.volume;
                }
            }
            previous_close = Some(candle.close);
            current
        })
        .collect()
}

/// Cumulative VWAP over the given window, using the typical price.
pub fn vwap(candles: &[Candle]) -> Vec<Decimal> {
    let three = Decimal::new(3, 0);
    let mut cumulative_pv = Decimal::ZERO;
    let mut cumulative_volume = Decimal::ZERO;
    candles
        .iter()
        .map(|candle| {
            let typical = (candle.high + candle.low + candle.close) / three;
            cumulative_pv += typical * candle.volume;
            cumulative_volume += candle.volume;
            if cumulative_volume.is_zero() {
                typical
            } else {
                cumulative_pv / cumulative_volume
            }
        })
        .collect()
}

pub fn funding_risk_score(rate: Decimal) -> Decimal {
    let abs = rate.abs();
    if abs < Decimal::new(1, 4) {
        Decimal::ZERO
    } else if abs < Decimal::new(1, 3) {
        Decimal::new(25, 2)
    } else if abs < Decimal::new(5, 3) {
        Decimal::new(5, 1)
    } else {
        Decimal::new(75, 2)
    }
}

pub fn log_return(current: Decimal, previous: Decimal) -> Result<Decimal, IndicatorError> {
    if current <= Decimal::ZERO || previous <= Decimal::ZERO {
        return Err(IndicatorError::InvalidPrice(
            "prices must be > 0".to_string(),
        ));
    }
    (current / previous)
        .checked_ln()
        .ok_or_else(|| IndicatorError::Math("ln unavailable for price ratio".to_string()))
}

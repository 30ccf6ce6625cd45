use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use thiserror::Error;

use crate::config::Config;
use crate::core::{Candle, Timeframe};

#[derive(Debug, Error, PartialEq)]
pub enum GeneratorError {
    #[error("invalid generator parameter {field}: {message}")]
    InvalidParams {
        field: &'static str,
        message: String,
    },
    #[error("series of {candles} candles ending at {end} starts outside the supported time range")]
    TimeRange { candles: usize, end: DateTime<Utc> },
    #[error("price overflowed at step {step}")]
    PriceOverflow { step: usize },
}

/// Upper bound on a single generated series.
pub const MAX_CANDLES: usize = 1_000_000;
/// Upper bound on per-step volatility.
pub const MAX_VOLATILITY: Decimal = Decimal::ONE;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParams {
    pub initial_price: Decimal,
    pub candles: usize,
    pub timeframe: Timeframe,
    pub volatility: Decimal,
    pub trend_strength: Decimal,
    pub shock_probability: Decimal,
}

impl GeneratorParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_price: config.generator.initial_price,
            candles: config.generator.candles,
            timeframe: config.run.timeframe,
            volatility: config.generator.volatility,
            trend_strength: config.generator.trend_strength,
            shock_probability: config.generator.shock_probability,
        }
    }

    pub fn validate(&self) -> Result<(), GeneratorError> {
        let unit = |value: Decimal| value >= Decimal::ZERO && value <= Decimal::ONE;
        if self.initial_price <= Decimal::ZERO {
            return Err(invalid("initial_price", "must be > 0"));
        }
        if self.candles == 0 || self.candles > MAX_CANDLES {
            return Err(invalid("candles", &format!("must be between 1 and {MAX_CANDLES}")));
        }
        if self.volatility < Decimal::ZERO || self.volatility > MAX_VOLATILITY {
            return Err(invalid("volatility", "must be between 0 and 1"));
        }
        if !unit(self.trend_strength) {
            return Err(invalid("trend_strength", "must be between 0 and 1"));
        }
        if !unit(self.shock_probability) {
            return Err(invalid("shock_probability", "must be between 0 and 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> GeneratorError {
    GeneratorError::InvalidParams {
        field,
        message: message.to_string(),
    }
}

/// Random-walk OHLCV synthesiser with trend, noise and occasional shocks.
///
/// Each step moves the price by a trend and a noise term, both scaled by
/// `volatility * price`. A shock of 2-5x that scale is added with
/// probability `shock_probability`. The stepped price never drops below
/// half of the previous one.
#[derive(Debug, Clone)]
pub struct CandleGenerator {
    params: GeneratorParams,
}

impl CandleGenerator {
    pub fn new(params: GeneratorParams) -> Result<Self, GeneratorError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &GeneratorParams {
        &self.params
    }

    pub fn generate_seeded(
        &self,
        seed: u64,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, GeneratorError> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.generate(&mut rng, end)
    }

    /// Produces `candles` bars spaced by the timeframe, the last one starting
    /// one interval before `end`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, GeneratorError> {
        let params = &self.params;
        let spacing = Duration::milliseconds(params.timeframe.duration_ms());
        let mut timestamp = series_start(end, spacing, params.candles)?;
        let mut price = params.initial_price;
        let mut candles = Vec::with_capacity(params.candles);

        for step in 0..params.candles {
            let candle = next_candle(params, rng, price, timestamp)
                .ok_or(GeneratorError::PriceOverflow { step })?;
            price = candle.close;
            candles.push(candle);
            timestamp += spacing;
        }

        Ok(candles)
    }
}

fn series_start(
    end: DateTime<Utc>,
    spacing: Duration,
    candles: usize,
) -> Result<DateTime<Utc>, GeneratorError> {
    i32::try_from(candles)
        .ok()
        .and_then(|count| spacing.checked_mul(count))
        .and_then(|span| end.checked_sub_signed(span))
        .ok_or(GeneratorError::TimeRange { candles, end })
}

/// One step of the walk. `None` when the price leaves the `Decimal` range.
fn next_candle<R: Rng + ?Sized>(
    params: &GeneratorParams,
    rng: &mut R,
    previous: Decimal,
    timestamp: DateTime<Utc>,
) -> Option<Candle> {
    let half = Decimal::new(5, 1);
    let two = Decimal::TWO;
    let scale = params.volatility.checked_mul(previous)?;
    let trend = ((draw(rng) - half) * two * params.trend_strength).checked_mul(scale)?;
    let noise = ((draw(rng) - half) * two).checked_mul(scale)?;
    let mut change = trend.checked_add(noise)?;

    if draw(rng) < params.shock_probability {
        let direction = if draw(rng) > half {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let magnitude = (draw(rng) * Decimal::new(3, 0) + two).checked_mul(scale)?;
        change = change.checked_add(direction * magnitude)?;
    }

    let price = previous.checked_add(change)?.max(previous * half);

    let candle_vol = params.volatility.checked_mul(price)? * half;
    let open = price;
    let close = price
        .checked_add((draw(rng) - half).checked_mul(candle_vol)?)?
        .max(price * half);
    let high = open.max(close).checked_add(draw(rng).checked_mul(candle_vol)?)?;
    let low = open.min(close).checked_sub(draw(rng).checked_mul(candle_vol)?)?;
    let volume = draw(rng) * Decimal::new(10000, 0) + Decimal::new(1000, 0);

    Some(Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
        timeframe: params.timeframe,
        symbol: None,
    })
}

fn draw<R: Rng + ?Sized>(rng: &mut R) -> Decimal {
    Decimal::from_f64(rng.gen_range(0.0..1.0)).unwrap_or(Decimal::ZERO)
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::{Candle, Timeframe};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepperError {
    #[error("market data exhausted after {consumed} candles")]
    DataExhausted { consumed: usize },
}

/// Snapshot handed to the pipeline for a single tick.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub current_price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Most recent last, bounded by the stepper window.
    pub recent_candles: Vec<Candle>,
    pub symbol: String,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone)]
pub struct MarketStepper {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
    window: usize,
    cursor: usize,
}

impl MarketStepper {
    pub const DEFAULT_WINDOW: usize = 100;

    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        Self::with_window(symbol, timeframe, candles, Self::DEFAULT_WINDOW)
    }

    pub fn with_window(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
        window: usize,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
            window: window.max(1),
            cursor: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.candles.len()
    }

    pub fn next(&mut self) -> Result<MarketState, StepperError> {
        if !self.has_next() {
            return Err(StepperError::DataExhausted {
                consumed: self.cursor,
            });
        }
        let current = &self.candles[self.cursor];
        let current_price = current.close;
        let timestamp = current.timestamp;
        self.cursor += 1;
        Ok(MarketState {
            current_price,
            timestamp,
            recent_candles: self.history(self.window).to_vec(),
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
        })
    }

    /// Trailing `window` candles up to and including the last visited one.
    pub fn history(&self, window: usize) -> &[Candle] {
        let start = self.cursor.saturating_sub(window);
        &self.candles[start..self.cursor]
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }
}

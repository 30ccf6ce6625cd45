use rust_decimal::Decimal;

use crate::core::{Candle, SignalAction, SignalStrength, Timeframe};
use crate::indicators::funding_risk_score;
use crate::strategies::{SignalStrategy, StrategyContext, StrategySignal};

const OBV_LOOKBACK: usize = 3;

fn dec(num: i64, scale: u32) -> Decimal {
    Decimal::new(num, scale)
}

/// Shared tempering from an attached spending report. The two notes are
/// appended when confidence is reduced and when a buy is paused.
fn apply_report_adjustment(
    mut signal: StrategySignal,
    ctx: &StrategyContext<'_>,
    notes: (&str, &str),
) -> StrategySignal {
    let Some(summary) = ctx.report_summary else {
        return signal;
    };
    if summary.total_profit < Decimal::ZERO {
        signal.confidence *= dec(8, 1);
        signal.reason.push_str(" | ");
        signal.reason.push_str(notes.0);
    }
    if summary.total_spent > summary.total_voucher_income && signal.action == SignalAction::Buy {
        signal.action = SignalAction::Hold;
        signal.reason.push_str(" | ");
        signal.reason.push_str(notes.1);
    }
    signal
}

fn signal(
    name: &str,
    action: SignalAction,
    strength: SignalStrength,
    confidence: Decimal,
    reason: impl Into<String>,
) -> StrategySignal {
    StrategySignal::new(name, action, strength, confidence, reason)
}

fn histogram_above(histogram: Option<Decimal>, level: Decimal) -> bool {
    histogram.is_some_and(|value| value > level)
}

fn histogram_below(histogram: Option<Decimal>, level: Decimal) -> bool {
    histogram.is_some_and(|value| value < level)
}

/// RSI and Bollinger mean reversion on the shortest timeframes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalpingStrategy;

impl SignalStrategy for ScalpingStrategy {
    fn name(&self) -> &'static str {
        "Scalping"
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        matches!(timeframe, Timeframe::M1 | Timeframe::M3 | Timeframe::M5)
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let indicators = ctx.indicators;
        let price = ctx.current_price;
        let (Some(rsi), Some(bands)) = (indicators.rsi, indicators.bollinger) else {
            return StrategySignal::neutral(name, "No clear scalping signal");
        };

        let raw = if rsi < dec(30, 0) && price <= bands.lower * dec(1005, 3) {
            let deep = rsi < dec(25, 0);
            signal(
                name,
                SignalAction::Buy,
                if deep { SignalStrength::Medium } else { SignalStrength::Weak },
                if deep { dec(6, 1) } else { dec(4, 1) },
                format!("Oversold RSI ({rsi:.1}) near lower Bollinger Band"),
            )
        } else if rsi > dec(70, 0) && price >= bands.upper * dec(995, 3) {
            let deep = rsi > dec(75, 0);
            signal(
                name,
                SignalAction::Sell,
                if deep { SignalStrength::Medium } else { SignalStrength::Weak },
                if deep { dec(6, 1) } else { dec(4, 1) },
                format!("Overbought RSI ({rsi:.1}) near upper Bollinger Band"),
            )
        } else {
            match (indicators.ema_fast, indicators.ema_slow) {
                (Some(fast), Some(slow)) if fast > slow && price < bands.middle => signal(
                    name,
                    SignalAction::Buy,
                    SignalStrength::Weak,
                    dec(35, 2),
                    "EMA fast > slow with price below middle BB",
                ),
                (Some(fast), Some(slow)) if fast < slow && price > bands.middle => signal(
                    name,
                    SignalAction::Sell,
                    SignalStrength::Weak,
                    dec(35, 2),
                    "EMA fast < slow with price above middle BB",
                ),
                _ => StrategySignal::neutral(name, "No clear scalping signal"),
            }
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Confidence reduced due to negative external PnL",
                "Spending outpaces voucher income; pausing new entries",
            ),
        )
    }
}

/// MACD and EMA crossover confluence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntradayStrategy;

impl SignalStrategy for IntradayStrategy {
    fn name(&self) -> &'static str {
        "Intraday"
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        matches!(timeframe, Timeframe::M15 | Timeframe::M30 | Timeframe::H1)
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let indicators = ctx.indicators;
        let (Some(macd), Some(fast), Some(slow)) =
            (indicators.macd, indicators.ema_fast, indicators.ema_slow)
        else {
            return StrategySignal::neutral(name, "No clear intraday signal");
        };

        let zero = Decimal::ZERO;
        let macd_bullish = macd.signal.is_some_and(|signal| macd.macd > signal)
            && histogram_above(macd.histogram, zero);
        let macd_bearish = macd.signal.is_some_and(|signal| macd.macd < signal)
            && histogram_below(macd.histogram, zero);
        let ema_bullish = fast > slow;
        let ema_bearish = fast < slow;

        let raw = if macd_bullish && ema_bullish {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Medium,
                dec(65, 2),
                "MACD bullish crossover with EMA fast > slow",
            )
        } else if macd_bearish && ema_bearish {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Medium,
                dec(65, 2),
                "MACD bearish crossover with EMA fast < slow",
            )
        } else if macd_bullish {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Weak,
                dec(4, 1),
                "MACD bullish but EMA shows weakness",
            )
        } else if macd_bearish {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Weak,
                dec(4, 1),
                "MACD bearish but EMA shows strength",
            )
        } else if ema_bullish && macd.macd > zero {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Weak,
                dec(35, 2),
                "Moderate bullish trend (EMA + MACD positive)",
            )
        } else if ema_bearish && macd.macd < zero {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Weak,
                dec(35, 2),
                "Moderate bearish trend (EMA + MACD negative)",
            )
        } else {
            StrategySignal::neutral(name, "No clear intraday signal")
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Negative profit in external report",
                "Elevated spend vs voucher income; skipping buys",
            ),
        )
    }
}

/// RSI, Bollinger and MACD confluence with graded strength.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwingStrategy;

impl SignalStrategy for SwingStrategy {
    fn name(&self) -> &'static str {
        "Swing"
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        matches!(timeframe, Timeframe::H4 | Timeframe::D1)
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let indicators = ctx.indicators;
        let price = ctx.current_price;
        let (Some(rsi), Some(bands), Some(macd)) =
            (indicators.rsi, indicators.bollinger, indicators.macd)
        else {
            return StrategySignal::neutral(name, "No clear swing signal");
        };

        let zero = Decimal::ZERO;
        let oversold = rsi < dec(35, 0);
        let overbought = rsi > dec(65, 0);
        let below_middle = price < bands.middle;
        let above_middle = price > bands.middle;
        let neutral_rsi = rsi > dec(45, 0) && rsi < dec(55, 0);

        let raw = if oversold && below_middle && macd.macd > zero {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Strong,
                dec(75, 2),
                format!(
                    "Strong mean reversion signal: RSI {rsi:.1}, price below middle BB, MACD positive"
                ),
            )
        } else if overbought && above_middle && macd.macd < zero {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Strong,
                dec(75, 2),
                format!(
                    "Strong reversal signal: RSI {rsi:.1}, price above middle BB, MACD negative"
                ),
            )
        } else if oversold && below_middle {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Medium,
                dec(6, 1),
                "Mean reversion: oversold RSI near lower BB",
            )
        } else if overbought && above_middle {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Medium,
                dec(6, 1),
                "Mean reversion: overbought RSI near upper BB",
            )
        } else if neutral_rsi && histogram_above(macd.histogram, zero) && below_middle {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Weak,
                dec(45, 2),
                "Neutral RSI with positive MACD momentum",
            )
        } else if neutral_rsi && histogram_below(macd.histogram, zero) && above_middle {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Weak,
                dec(45, 2),
                "Neutral RSI with negative MACD momentum",
            )
        } else {
            StrategySignal::neutral(name, "No clear swing signal")
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Swing bias trimmed due to negative report PnL",
                "Spending exceeds voucher income; holding back entries",
            ),
        )
    }
}

/// Long-horizon trend and overheat detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionStrategy;

impl SignalStrategy for PositionStrategy {
    fn name(&self) -> &'static str {
        "Position"
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        matches!(timeframe, Timeframe::D1 | Timeframe::W1 | Timeframe::Mo1)
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let indicators = ctx.indicators;
        let (Some(rsi), Some(macd), Some(_)) =
            (indicators.rsi, indicators.macd, indicators.ema_slow)
        else {
            return StrategySignal::neutral(name, "No clear long-term position signal");
        };

        let zero = Decimal::ZERO;
        let healthy_rsi = rsi >= dec(40, 0) && rsi <= dec(60, 0);
        let uptrend = macd.macd > zero && histogram_above(macd.histogram, zero) && healthy_rsi;
        let downtrend = macd.macd < zero && histogram_below(macd.histogram, zero) && healthy_rsi;
        let overheated = rsi > dec(70, 0);
        let oversold = rsi < dec(30, 0);

        let raw = if uptrend && !overheated {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Medium,
                dec(6, 1),
                "Sustained uptrend with healthy RSI (no overheating)",
            )
        } else if downtrend && !oversold {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Medium,
                dec(6, 1),
                "Sustained downtrend with RSI confirmation",
            )
        } else if overheated {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Weak,
                dec(4, 1),
                format!("Market overheated with RSI {rsi:.1} - risk of reversal"),
            )
        } else if oversold && macd.macd > zero {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Weak,
                dec(45, 2),
                "Oversold with positive MACD - potential accumulation zone",
            )
        } else if macd.macd > zero && rsi > dec(50, 0) {
            signal(
                name,
                SignalAction::Hold,
                SignalStrength::Weak,
                dec(35, 2),
                "Moderate positive momentum - hold existing positions",
            )
        } else {
            StrategySignal::neutral(name, "No clear long-term position signal")
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Long-horizon signal tempered by external losses",
                "Expense imbalance detected; pausing accumulation",
            ),
        )
    }
}

/// OBV direction against VWAP deviation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeStrategy;

impl VolumeStrategy {
    /// OBV change over the last few candles of the window.
    fn obv_trend(candles: &[Candle]) -> Decimal {
        let series = crate::indicators::obv(candles);
        match (series.last(), series.len().checked_sub(OBV_LOOKBACK + 1)) {
            (Some(latest), Some(index)) => *latest - series[index],
            (Some(latest), None) => *latest,
            _ => Decimal::ZERO,
        }
    }
}

impl SignalStrategy for VolumeStrategy {
    fn name(&self) -> &'static str {
        "Volume"
    }

    fn supports_timeframe(&self, _timeframe: Timeframe) -> bool {
        true
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let (Some(_), Some(vwap)) = (ctx.indicators.obv, ctx.indicators.vwap) else {
            return StrategySignal::neutral(name, "Volume indicators neutral");
        };
        if vwap <= Decimal::ZERO {
            return StrategySignal::neutral(name, "Volume indicators neutral");
        }

        let trend = Self::obv_trend(ctx.candles);
        let ratio = ctx.current_price / vwap;

        let raw = if trend > Decimal::ZERO && ratio > dec(1001, 3) {
            let strong = ratio > dec(101, 2);
            signal(
                name,
                SignalAction::Buy,
                if strong { SignalStrength::Strong } else { SignalStrength::Medium },
                if strong { dec(7, 1) } else { dec(5, 1) },
                "Positive OBV trend with price above VWAP",
            )
        } else if trend < Decimal::ZERO && ratio < dec(999, 3) {
            let strong = ratio < dec(99, 2);
            signal(
                name,
                SignalAction::Sell,
                if strong { SignalStrength::Strong } else { SignalStrength::Medium },
                if strong { dec(7, 1) } else { dec(5, 1) },
                "Negative OBV trend with price below VWAP",
            )
        } else {
            StrategySignal::neutral(name, "Volume indicators neutral")
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Adjusted for negative external profitability",
                "Expenses exceed voucher income; holding off buys",
            ),
        )
    }
}

/// Contrarian tilt when funding runs hot in either direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FundingStrategy;

impl FundingStrategy {
    pub const THRESHOLD: Decimal = Decimal::from_parts(15, 0, 0, false, 4);
}

impl SignalStrategy for FundingStrategy {
    fn name(&self) -> &'static str {
        "Funding"
    }

    fn supports_timeframe(&self, _timeframe: Timeframe) -> bool {
        true
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let raw = match ctx.indicators.funding_rate {
            None => StrategySignal::neutral(name, "No funding data available"),
            Some(rate) if rate.abs() > Self::THRESHOLD => {
                let action = if rate > Decimal::ZERO {
                    SignalAction::Sell
                } else {
                    SignalAction::Buy
                };
                signal(
                    name,
                    action,
                    SignalStrength::Medium,
                    dec(55, 2),
                    format!(
                        "Funding rate {rate} suggests contrarian tilt (risk {})",
                        funding_risk_score(rate)
                    ),
                )
            }
            Some(rate) => signal(
                name,
                SignalAction::Hold,
                SignalStrength::Weak,
                dec(35, 2),
                format!("Funding rate {rate} is moderate; stay neutral"),
            ),
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Reduced for negative financial report",
                "Expense pressure: avoiding positive carry longs",
            ),
        )
    }
}

/// Short, mid and long moving-average alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultiTimeframeStrategy;

impl MultiTimeframeStrategy {
    pub const SHORT_WINDOW: usize = 10;
    pub const MID_WINDOW: usize = 30;
    pub const LONG_WINDOW: usize = 90;

    fn trailing_average(candles: &[Candle], window: usize) -> Decimal {
        let start = candles.len().saturating_sub(window);
        let slice = &candles[start..];
        if slice.is_empty() {
            return Decimal::ZERO;
        }
        let sum: Decimal = slice.iter().map(|candle| candle.close).sum();
        sum / Decimal::from(slice.len() as u64)
    }
}

impl SignalStrategy for MultiTimeframeStrategy {
    fn name(&self) -> &'static str {
        "Multi-Timeframe"
    }

    fn supports_timeframe(&self, _timeframe: Timeframe) -> bool {
        true
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        let name = self.name();
        let short = Self::trailing_average(ctx.candles, Self::SHORT_WINDOW);
        let mid = Self::trailing_average(ctx.candles, Self::MID_WINDOW);
        let long = Self::trailing_average(ctx.candles, Self::LONG_WINDOW);
        let price = ctx.current_price;

        let raw = if short > mid && mid > long && price > short {
            signal(
                name,
                SignalAction::Buy,
                SignalStrength::Medium,
                dec(55, 2),
                "Short/medium/long trends aligned upward",
            )
        } else if short < mid && mid < long && price < short {
            signal(
                name,
                SignalAction::Sell,
                SignalStrength::Medium,
                dec(55, 2),
                "Short/medium/long trends aligned downward",
            )
        } else {
            StrategySignal::neutral(name, "Multi-timeframe consensus neutral")
        };

        apply_report_adjustment(
            raw,
            ctx,
            (
                "Confidence trimmed by external losses",
                "Expense imbalance discourages fresh longs",
            ),
        )
    }
}

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{MAX_AGGRESSIVENESS, MIN_AGGRESSIVENESS};
use crate::core::{Candle, PositionSide, RiskLevel};
use crate::indicators::log_return;
use crate::ledger::SimulatedPosition;

/// Estimated liquidation price; `None` without leverage.
pub fn liquidation_price(
    side: PositionSide,
    entry_price: Decimal,
    leverage: Decimal,
    mmr: Decimal,
) -> Option<Decimal> {
    if leverage <= Decimal::ONE {
        return None;
    }
    let inverse = Decimal::ONE / leverage;
    let price = match side {
        PositionSide::Long => entry_price * (Decimal::ONE - inverse + mmr),
        PositionSide::Short => entry_price * (Decimal::ONE + inverse - mmr),
    };
    Some(price)
}

/// Percent of the current price left before liquidation. Negative once crossed.
pub fn distance_to_liquidation(
    side: PositionSide,
    current_price: Decimal,
    liquidation_price: Option<Decimal>,
) -> Option<Decimal> {
    let liquidation_price = liquidation_price?;
    if current_price.is_zero() {
        return None;
    }
    let gap = match side {
        PositionSide::Long => current_price - liquidation_price,
        PositionSide::Short => liquidation_price - current_price,
    };
    Some(gap / current_price * Decimal::ONE_HUNDRED)
}

pub fn position_risk_level(distance_percent: Option<Decimal>, leverage: Decimal) -> RiskLevel {
    let Some(distance) = distance_percent else {
        return RiskLevel::Low;
    };
    if distance < Decimal::new(5, 0) || leverage > Decimal::new(10, 0) {
        RiskLevel::Extreme
    } else if distance < Decimal::new(10, 0) || leverage > Decimal::new(5, 0) {
        RiskLevel::High
    } else if distance < Decimal::new(20, 0) || leverage > Decimal::new(3, 0) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub notional: Decimal,
    pub unrealized_pnl: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub distance_to_liq_percent: Option<Decimal>,
    pub margin_usage_percent: Decimal,
    pub risk_level: RiskLevel,
}

pub fn assess_position(position: &SimulatedPosition, current_price: Decimal) -> RiskSnapshot {
    let notional = position.size * current_price;
    let required_margin = if position.leverage.is_zero() {
        notional
    } else {
        notional / position.leverage
    };
    let margin_usage_percent = if position.initial_margin.is_zero() {
        Decimal::ZERO
    } else {
        required_margin / position.initial_margin * Decimal::ONE_HUNDRED
    };
    let distance = distance_to_liquidation(
        position.side,
        current_price,
        position.liquidation_price,
    );
    RiskSnapshot {
        side: position.side,
        entry_price: position.entry_price,
        current_price,
        notional,
        unrealized_pnl: position.unrealized_pnl(current_price),
        liquidation_price: position.liquidation_price,
        distance_to_liq_percent: distance,
        margin_usage_percent,
        risk_level: position_risk_level(distance, position.leverage),
    }
}

/// Worst position-level risk across the still-active positions.
pub fn worst_risk_level(positions: &[SimulatedPosition], current_price: Decimal) -> RiskLevel {
    positions
        .iter()
        .filter(|position| !position.is_liquidated)
        .map(|position| assess_position(position, current_price).risk_level)
        .max()
        .unwrap_or(RiskLevel::Low)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub max_drawdown_percent: Decimal,
    pub volatility: Decimal,
}

impl RiskMetrics {
    pub fn from_candles(candles: &[Candle]) -> Self {
        Self {
            max_drawdown_percent: max_drawdown_from_candles(candles),
            volatility: estimate_volatility(candles),
        }
    }
}

/// Run-level classifier over drawdown and volatility. Unrelated to the
/// liquidation-distance thresholds of [`position_risk_level`].
pub fn classify_portfolio_risk(metrics: &RiskMetrics) -> RiskLevel {
    let drawdown = metrics.max_drawdown_percent;
    let volatility = metrics.volatility;
    if drawdown > Decimal::new(40, 0) || volatility > Decimal::new(25, 2) {
        RiskLevel::Extreme
    } else if drawdown > Decimal::new(25, 0) || volatility > Decimal::new(18, 2) {
        RiskLevel::High
    } else if drawdown > Decimal::new(10, 0) || volatility > Decimal::new(1, 1) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Peak-to-trough decline of closes, in percent.
pub fn max_drawdown_from_candles(candles: &[Candle]) -> Decimal {
    let Some(first) = candles.first() else {
        return Decimal::ZERO;
    };
    let mut peak = first.close;
    let mut max_drop = Decimal::ZERO;
    for candle in candles {
        peak = peak.max(candle.close);
        if peak <= Decimal::ZERO {
            continue;
        }
        let drop = (peak - candle.close) / peak * Decimal::ONE_HUNDRED;
        max_drop = max_drop.max(drop);
    }
    max_drop
}

/// Sample standard deviation of log returns scaled by sqrt(n).
pub fn estimate_volatility(candles: &[Candle]) -> Decimal {
    if candles.len() < 2 {
        return Decimal::ZERO;
    }
    let returns: Vec<Decimal> = candles
        .windows(2)
        .filter_map(|pair| match log_return(pair[1].close, pair[0].close) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(error = %err, "skipping return in volatility estimate");
                None
            }
        })
        .collect();
    if returns.is_empty() {
        return Decimal::ZERO;
    }
    let count = Decimal::from(returns.len() as u64);
    let mean = returns.iter().sum::<Decimal>() / count;
    let squared: Decimal = returns
        .iter()
        .map(|value| {
            let diff = *value - mean;
            diff * diff
        })
        .sum();
    let denominator = Decimal::from(returns.len().saturating_sub(1).max(1) as u64);
    let deviation = (squared / denominator).sqrt().unwrap_or(Decimal::ZERO);
    deviation * count.sqrt().unwrap_or(Decimal::ONE)
}

pub fn adjust_aggressiveness(
    base: Decimal,
    metrics: &RiskMetrics,
    funding_rate: Option<Decimal>,
) -> Decimal {
    let mut factor = base;
    if metrics.max_drawdown_percent > Decimal::new(20, 0) {
        factor *= Decimal::new(8, 1);
    }
    if let Some(rate) = funding_rate
        && rate.abs() > Decimal::new(2, 3)
    {
        factor *= if rate > Decimal::ZERO {
            Decimal::new(9, 1)
        } else {
            Decimal::new(105, 2)
        };
    }
    factor.clamp(MIN_AGGRESSIVENESS, MAX_AGGRESSIVENESS)
}

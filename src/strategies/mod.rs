use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{StrategyConfig, StrategyKind};
use crate::core::{Candle, PositionSide, SignalAction, SignalStrength, Timeframe};
use crate::data::summary::ReportSummary;
use crate::indicators::IndicatorSet;

pub mod rules;

pub use rules::{
    FundingStrategy, IntradayStrategy, MultiTimeframeStrategy, PositionStrategy,
    ScalpingStrategy, SwingStrategy, VolumeStrategy,
};

/// Everything a strategy may look at for one tick.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub symbol: &'a str,
    pub timeframe: Timeframe,
    pub candles: &'a [Candle],
    pub indicators: &'a IndicatorSet,
    pub current_price: Decimal,
    pub position: Option<PositionSide>,
    pub report_summary: Option<&'a ReportSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy_name: String,
    pub action: SignalAction,
    pub strength: SignalStrength,
    pub confidence: Decimal,
    pub reason: String,
}

impl StrategySignal {
    pub fn new(
        strategy_name: &str,
        action: SignalAction,
        strength: SignalStrength,
        confidence: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            action,
            strength,
            confidence,
            reason: reason.into(),
        }
    }

    /// Weak hold at 0.3, the fallback of every strategy.
    pub fn neutral(strategy_name: &str, reason: impl Into<String>) -> Self {
        Self::new(
            strategy_name,
            SignalAction::Hold,
            SignalStrength::Weak,
            Decimal::new(3, 1),
            reason,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSignal {
    pub action: SignalAction,
    pub score_buy: Decimal,
    pub score_sell: Decimal,
    pub score_hold: Decimal,
    pub reasons: Vec<String>,
}

impl CombinedSignal {
    pub fn score_for(&self, action: SignalAction) -> Decimal {
        match action {
            SignalAction::Buy => self.score_buy,
            SignalAction::Sell => self.score_sell,
            SignalAction::Hold => self.score_hold,
        }
    }
}

pub trait SignalStrategy {
    fn name(&self) -> &'static str;
    fn supports_timeframe(&self, timeframe: Timeframe) -> bool;
    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Scalping(ScalpingStrategy),
    Intraday(IntradayStrategy),
    Swing(SwingStrategy),
    Position(PositionStrategy),
    Volume(VolumeStrategy),
    Funding(FundingStrategy),
    MultiTimeframe(MultiTimeframeStrategy),
}

impl Strategy {
    pub fn from_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Scalping => Strategy::Scalping(ScalpingStrategy),
            StrategyKind::Intraday => Strategy::Intraday(IntradayStrategy),
            StrategyKind::Swing => Strategy::Swing(SwingStrategy),
            StrategyKind::Position => Strategy::Position(PositionStrategy),
            StrategyKind::Volume => Strategy::Volume(VolumeStrategy),
            StrategyKind::Funding => Strategy::Funding(FundingStrategy),
            StrategyKind::MultiTimeframe => Strategy::MultiTimeframe(MultiTimeframeStrategy),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Scalping(_) => StrategyKind::Scalping,
            Strategy::Intraday(_) => StrategyKind::Intraday,
            Strategy::Swing(_) => StrategyKind::Swing,
            Strategy::Position(_) => StrategyKind::Position,
            Strategy::Volume(_) => StrategyKind::Volume,
            Strategy::Funding(_) => StrategyKind::Funding,
            Strategy::MultiTimeframe(_) => StrategyKind::MultiTimeframe,
        }
    }

    fn as_dyn(&self) -> &dyn SignalStrategy {
        match self {
            Strategy::Scalping(inner) => inner,
            Strategy::Intraday(inner) => inner,
            Strategy::Swing(inner) => inner,
            Strategy::Position(inner) => inner,
            Strategy::Volume(inner) => inner,
            Strategy::Funding(inner) => inner,
            Strategy::MultiTimeframe(inner) => inner,
        }
    }
}

impl SignalStrategy for Strategy {
    fn name(&self) -> &'static str {
        self.as_dyn().name()
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        self.as_dyn().supports_timeframe(timeframe)
    }

    fn generate_signal(&self, ctx: &StrategyContext<'_>) -> StrategySignal {
        self.as_dyn().generate_signal(ctx)
    }
}

/// Runs the configured strategies in order and fuses their signals.
#[derive(Debug, Clone)]
pub struct StrategyEngine {
    entries: Vec<(Strategy, Decimal)>,
}

impl StrategyEngine {
    pub fn new(config: &StrategyConfig) -> Self {
        let entries = config
            .enabled
            .iter()
            .map(|kind| (Strategy::from_kind(*kind), config.weight_of(*kind)))
            .collect();
        Self { entries }
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.entries.iter().map(|(strategy, _)| strategy)
    }

    pub fn run(&self, ctx: &StrategyContext<'_>) -> Vec<(StrategySignal, Decimal)> {
        self.entries
            .iter()
            .filter(|(strategy, _)| strategy.supports_timeframe(ctx.timeframe))
            .map(|(strategy, weight)| (strategy.generate_signal(ctx), *weight))
            .collect()
    }

    pub fn evaluate(&self, ctx: &StrategyContext<'_>) -> CombinedSignal {
        combine_weighted(&self.run(ctx))
    }
}

/// Unit-weight fusion.
pub fn combine_signals(signals: &[StrategySignal]) -> CombinedSignal {
    let weighted: Vec<(StrategySignal, Decimal)> = signals
        .iter()
        .map(|signal| (signal.clone(), Decimal::ONE))
        .collect();
    combine_weighted(&weighted)
}

/// The winning bucket must be the strict maximum and exceed 0.5, otherwise hold.
pub fn combine_weighted(signals: &[(StrategySignal, Decimal)]) -> CombinedSignal {
    let mut score_buy = Decimal::ZERO;
    let mut score_sell = Decimal::ZERO;
    let mut score_hold = Decimal::ZERO;
    let mut reasons = Vec::with_capacity(signals.len());

    for (signal, weight) in signals {
        reasons.push(format!("[{}] {}", signal.strategy_name, signal.reason));
        let score = signal.confidence * *weight;
        match signal.action {
            SignalAction::Buy => score_buy += score,
            SignalAction::Sell => score_sell += score,
            SignalAction::Hold => score_hold += score,
        }
    }

    let threshold = Decimal::new(5, 1);
    let action = if score_buy > threshold && score_buy > score_sell && score_buy > score_hold {
        SignalAction::Buy
    } else if score_sell > threshold && score_sell > score_buy && score_sell > score_hold {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    };

    CombinedSignal {
        action,
        score_buy,
        score_sell,
        score_hold,
        reasons,
    }
}

use rust_decimal::Decimal;

use crate::config::Config;
use crate::core::PositionSide;
use crate::data::summary::ReportSummary;
use crate::indicators::{IndicatorConfig, IndicatorError, IndicatorSet, compute_indicators};
use crate::simulation::MarketState;
use crate::strategies::{
    CombinedSignal, StrategyContext, StrategyEngine, StrategySignal, combine_weighted,
};

#[derive(Debug, Clone)]
pub struct SignalOutput {
    pub indicators: IndicatorSet,
    pub signals: Vec<StrategySignal>,
    pub combined: CombinedSignal,
}

/// Indicators, then strategies, then fusion, for one market state.
#[derive(Debug, Clone)]
pub struct SignalPipeline {
    indicator_config: IndicatorConfig,
    engine: StrategyEngine,
    funding_rate: Option<Decimal>,
    report_summary: Option<ReportSummary>,
}

impl SignalPipeline {
    pub fn new(config: &Config) -> Result<Self, IndicatorError> {
        let indicator_config = IndicatorConfig {
            bollinger_multiplier: config.strategy.bollinger_multiplier,
            ..IndicatorConfig::default()
        };
        indicator_config.validate()?;
        Ok(Self {
            indicator_config,
            engine: StrategyEngine::new(&config.strategy),
            funding_rate: config.run.funding_rate,
            report_summary: None,
        })
    }

    pub fn with_report_summary(mut self, summary: ReportSummary) -> Self {
        self.report_summary = Some(summary);
        self
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn update(&self, state: &MarketState, position: Option<PositionSide>) -> SignalOutput {
        let mut indicators = compute_indicators(&state.recent_candles, &self.indicator_config);
        indicators.funding_rate = self.funding_rate;

        let ctx = StrategyContext {
            symbol: &state.symbol,
            timeframe: state.timeframe,
            candles: &state.recent_candles,
            indicators: &indicators,
            current_price: state.current_price,
            position,
            report_summary: self.report_summary.as_ref(),
        };
        let weighted = self.engine.run(&ctx);
        let combined = combine_weighted(&weighted);
        let signals = weighted.into_iter().map(|(signal, _)| signal).collect();

        SignalOutput {
            indicators,
            signals,
            combined,
        }
    }
}

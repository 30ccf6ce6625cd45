use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::{RiskLevel, Timeframe};
use crate::report::RunReport;

const DIGEST_LOG_TAIL: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    Pair,
    Position,
    Portfolio,
    News,
    Simulation,
}

impl fmt::Display for LlmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LlmMode::Pair => "pair",
            LlmMode::Position => "position",
            LlmMode::Portfolio => "portfolio",
            LlmMode::News => "news",
            LlmMode::Simulation => "simulation",
        };
        f.write_str(label)
    }
}

/// Digest of a finished run handed to an analysis backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub initial_balance: Decimal,
    pub final_equity: Decimal,
    pub pnl_percent: Decimal,
    pub trades: usize,
    pub liquidations: usize,
    pub max_drawdown_percent: Decimal,
    pub risk_level: RiskLevel,
    pub recent_log: Vec<String>,
}

impl AnalysisInput {
    pub fn from_report(report: &RunReport, symbol: &str, timeframe: Timeframe) -> Self {
        let start = report.log.len().saturating_sub(DIGEST_LOG_TAIL);
        Self {
            symbol: symbol.to_string(),
            timeframe,
            initial_balance: report.initial_balance,
            final_equity: report.final_equity,
            pnl_percent: report.pnl_percent,
            trades: report.trades,
            liquidations: report.liquidations,
            max_drawdown_percent: report.max_drawdown_percent,
            risk_level: report.risk_level,
            recent_log: report.log[start..].to_vec(),
        }
    }

    pub fn to_prompt(&self, mode: LlmMode) -> String {
        let mut prompt = format!(
            "Mode: {mode}\nSymbol: {} ({})\nInitial balance: ${:.2}\nFinal equity: ${:.2}\nPnL: {:.2}%\nTrades: {}\nLiquidations: {}\nMax drawdown: {:.2}%\nRisk level: {}\n",
            self.symbol,
            self.timeframe,
            self.initial_balance,
            self.final_equity,
            self.pnl_percent,
            self.trades,
            self.liquidations,
            self.max_drawdown_percent,
            self.risk_level
        );
        if !self.recent_log.is_empty() {
            prompt.push_str("Recent log:\n");
            for line in &self.recent_log {
                prompt.push_str(line);
                prompt.push('\n');
            }
        }
        prompt
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenarios {
    pub conservative: String,
    pub moderate: String,
    pub aggressive: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub summary: String,
    pub risks: Vec<String>,
    pub scenarios: Scenarios,
    pub disclaimer: String,
}

impl AnalysisOutput {
    pub fn fallback(mode: LlmMode) -> Self {
        Self {
            summary: format!("Unable to generate {mode} analysis. Analysis backend not available."),
            risks: vec![
                "Analysis unavailable".to_string(),
                "Use manual analysis".to_string(),
                "Verify data independently".to_string(),
            ],
            scenarios: Scenarios {
                conservative: "Proceed with caution without automated insights.".to_string(),
                moderate: "Use technical indicators for decision making.".to_string(),
                aggressive: "Manual analysis required for aggressive strategies.".to_string(),
            },
            disclaimer: "Analysis is not available. This is not financial advice.".to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn analyze(
        &self,
        input: &AnalysisInput,
        mode: LlmMode,
    ) -> Result<AnalysisOutput, AnalysisError>;
}

/// Local rule-based digest used when no remote backend is configured.
#[derive(Debug, Clone, Default)]
pub struct OfflineAnalysisClient;

#[async_trait::async_trait]
impl LlmClient for OfflineAnalysisClient {
    async fn analyze(
        &self,
        input: &AnalysisInput,
        mode: LlmMode,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let direction = if input.pnl_percent >= Decimal::ZERO {
            "gained"
        } else {
            "lost"
        };
        let summary = format!(
            "{mode} run on {} {}: equity {direction} {:.2}% over {} trades with {} liquidations; max drawdown {:.2}% ({} risk).",
            input.symbol,
            input.timeframe,
            input.pnl_percent.abs(),
            input.trades,
            input.liquidations,
            input.max_drawdown_percent,
            input.risk_level
        );
        let mut risks = vec!["Market volatility".to_string(), "Leverage risk".to_string()];
        if input.liquidations > 0 {
            risks.push(format!("{} positions were liquidated", input.liquidations));
        } else {
            risks.push("Liquidation risk".to_string());
        }
        if input.risk_level >= RiskLevel::High {
            risks.push(format!("Run-level risk classified as {}", input.risk_level));
        }
        Ok(AnalysisOutput {
            summary,
            risks,
            scenarios: Scenarios {
                conservative: "Lower aggressiveness and cap leverage at 2x.".to_string(),
                moderate: "Keep current settings and review drawdown after each run.".to_string(),
                aggressive: "Raise aggressiveness only if drawdown stays below 10%.".to_string(),
            },
            disclaimer:
                "This is analytical information, not financial advice. Trading carries significant risks."
                    .to_string(),
        })
    }
}

/// Post-run analysis that degrades to [`AnalysisOutput::fallback`] on failure.
pub async fn analyze_report(
    client: &dyn LlmClient,
    report: &RunReport,
    symbol: &str,
    timeframe: Timeframe,
) -> AnalysisOutput {
    let input = AnalysisInput::from_report(report, symbol, timeframe);
    match client.analyze(&input, LlmMode::Simulation).await {
        Ok(output) => output,
        Err(err) => {
            warn!(error = %err, "analysis failed, using fallback");
            AnalysisOutput::fallback(LlmMode::Simulation)
        }
    }
}

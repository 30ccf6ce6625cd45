use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::RiskLevel;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("csv error: {0}")]
    Csv(String),
}

/// Final, immutable summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub initial_balance: Decimal,
    /// Free cash, excluding margin still committed to open positions.
    pub final_balance: Decimal,
    pub final_equity: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub trades: usize,
    pub closed_trades: usize,
    pub liquidations: usize,
    pub max_drawdown_percent: Decimal,
    pub risk_level: RiskLevel,
    pub cancelled: bool,
    pub log: Vec<String>,
}

/// Running counters of a simulation, folded into a [`RunReport`] at the end.
#[derive(Debug, Clone)]
pub struct RunReporter {
    initial_balance: Decimal,
    log: Vec<String>,
    trades: usize,
    closed_trades: usize,
    liquidations: usize,
    peak_equity: Decimal,
    max_drawdown_percent: Decimal,
}

impl RunReporter {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            log: Vec::new(),
            trades: 0,
            closed_trades: 0,
            liquidations: 0,
            peak_equity: initial_balance,
            max_drawdown_percent: Decimal::ZERO,
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.log
    }

    pub fn record_open(&mut self) {
        self.trades += 1;
    }

    pub fn record_close(&mut self) {
        self.closed_trades += 1;
    }

    pub fn set_liquidations(&mut self, count: usize) {
        self.liquidations = count;
    }

    pub fn trades(&self) -> usize {
        self.trades
    }

    pub fn liquidations(&self) -> usize {
        self.liquidations
    }

    pub fn peak_equity(&self) -> Decimal {
        self.peak_equity
    }

    pub fn max_drawdown_percent(&self) -> Decimal {
        self.max_drawdown_percent
    }

    /// Folds a new equity mark into the peak and max drawdown.
    pub fn update_equity(&mut self, equity: Decimal) -> Decimal {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity <= Decimal::ZERO {
            return self.max_drawdown_percent;
        }
        let drawdown = (self.peak_equity - equity) / self.peak_equity * Decimal::ONE_HUNDRED;
        if drawdown > self.max_drawdown_percent {
            self.max_drawdown_percent = drawdown;
        }
        self.max_drawdown_percent
    }

    pub fn build(
        self,
        final_balance: Decimal,
        final_equity: Decimal,
        risk_level: RiskLevel,
        cancelled: bool,
    ) -> RunReport {
        let pnl = final_equity - self.initial_balance;
        let pnl_percent = if self.initial_balance.is_zero() {
            Decimal::ZERO
        } else {
            pnl / self.initial_balance * Decimal::ONE_HUNDRED
        };
        RunReport {
            initial_balance: self.initial_balance,
            final_balance,
            final_equity,
            pnl,
            pnl_percent,
            trades: self.trades,
            closed_trades: self.closed_trades,
            liquidations: self.liquidations,
            max_drawdown_percent: self.max_drawdown_percent,
            risk_level,
            cancelled,
            log: self.log,
        }
    }
}

pub fn format_report(report: &RunReport) -> String {
    let heavy = "═".repeat(60);
    let light = "─".repeat(60);
    let mut lines = vec![
        heavy.clone(),
        "SIMULATION REPORT".to_string(),
        heavy.clone(),
        String::new(),
        format!("Initial Balance:     ${:.2}", report.initial_balance),
        format!("Final Balance:       ${:.2}", report.final_balance),
        format!("Final Equity:        ${:.2}", report.final_equity),
        format!(
            "PnL:                 ${:.2} ({:.2}%)",
            report.pnl, report.pnl_percent
        ),
        format!("Total Trades:        {}", report.trades),
        format!("Closed Trades:       {}", report.closed_trades),
        format!("Liquidations:        {}", report.liquidations),
        format!("Max Drawdown:        {:.2}%", report.max_drawdown_percent),
        format!("Risk Level:          {}", report.risk_level),
    ];
    if report.cancelled {
        lines.push("Status:              cancelled".to_string());
    }
    lines.push(String::new());
    lines.push(light.clone());
    lines.push("Trade Log:".to_string());
    lines.push(light);
    lines.extend(report.log.iter().cloned());
    lines.push(heavy);
    lines.join("\n")
}

pub fn export_report_json(path: &Path, report: &RunReport) -> Result<(), ReportError> {
    let payload = serde_json::to_string_pretty(report)
        .map_err(|err| ReportError::Serialization(err.to_string()))?;
    fs::write(path, payload).map_err(|err| ReportError::Io(err.to_string()))
}

/// One `metric,value` row per summary field.
pub fn export_report_csv(path: &Path, report: &RunReport) -> Result<(), ReportError> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|err| ReportError::Csv(err.to_string()))?;
    let rows = [
        ("initial_balance", report.initial_balance.to_string()),
        ("final_balance", report.final_balance.to_string()),
        ("final_equity", report.final_equity.to_string()),
        ("pnl", report.pnl.to_string()),
        ("pnl_percent", report.pnl_percent.to_string()),
        ("trades", report.trades.to_string()),
        ("closed_trades", report.closed_trades.to_string()),
        ("liquidations", report.liquidations.to_string()),
        ("max_drawdown_percent", report.max_drawdown_percent.to_string()),
        ("risk_level", report.risk_level.to_string()),
        ("cancelled", report.cancelled.to_string()),
    ];
    writer
        .write_record(["metric", "value"])
        .map_err(|err| ReportError::Csv(err.to_string()))?;
    for (metric, value) in rows {
        writer
            .write_record([metric, value.as_str()])
            .map_err(|err| ReportError::Csv(err.to_string()))?;
    }
    writer.flush().map_err(|err| ReportError::Io(err.to_string()))
}

/// Picks the exporter from the file extension (`.json` or `.csv`).
pub fn export_report(path: &Path, report: &RunReport) -> Result<(), ReportError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => export_report_json(path, report),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => export_report_csv(path, report),
        other => Err(ReportError::Io(format!(
            "unsupported export format: {}",
            other.unwrap_or("<none>")
        ))),
    }
}

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::DataError;

const DAY_HEADERS: &[&str] = &["day", "date"];
const SPENT_HEADERS: &[&str] = &["spent", "expenses", "costs"];
const VOUCHER_HEADERS: &[&str] = &["voucher income", "voucherincome", "voucher", "income"];
const PROFIT_HEADERS: &[&str] = &["profit", "pnl"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub day: Decimal,
    pub spent: Decimal,
    pub voucher_income: Decimal,
    pub profit: Decimal,
}

/// Aggregate of an external spending report, used to temper strategy bias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_spent: Decimal,
    pub total_voucher_income: Decimal,
    pub total_profit: Decimal,
    pub avg_daily_profit: Decimal,
}

impl ReportSummary {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        let total_spent = rows.iter().map(|row| row.spent).sum();
        let total_voucher_income = rows.iter().map(|row| row.voucher_income).sum();
        let total_profit: Decimal = rows.iter().map(|row| row.profit).sum();
        let avg_daily_profit = if rows.is_empty() {
            Decimal::ZERO
        } else {
            total_profit / Decimal::from(rows.len() as u64)
        };
        Self {
            total_spent,
            total_voucher_income,
            total_profit,
            avg_daily_profit,
        }
    }
}

pub fn load_report_summary(path: &Path) -> Result<ReportSummary, DataError> {
    if !path.exists() {
        return Err(DataError::MissingData(format!(
            "report file not found at {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|err| DataError::Io(err.to_string()))?;
    let rows = parse_report_rows(&content)?;
    Ok(ReportSummary::from_rows(&rows))
}

/// Comma or tab separated, chosen from the header line.
pub fn parse_report_rows(content: &str) -> Result<Vec<ReportRow>, DataError> {
    let Some(header_line) = content.lines().find(|line| !line.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let delimiter = if header_line.contains('\t') { b'\t' } else { b',' };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start().as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| DataError::Parse(err.to_string()))?
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();
    let column = |variants: &[&str]| {
        headers
            .iter()
            .position(|header| variants.contains(&header.as_str()))
    };
    let day = column(DAY_HEADERS);
    let spent = column(SPENT_HEADERS);
    let voucher = column(VOUCHER_HEADERS);
    let profit = column(PROFIT_HEADERS);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| DataError::Parse(err.to_string()))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let cell = |index: Option<usize>| {
            index
                .and_then(|index| record.get(index))
                .map(numeric_cell)
                .unwrap_or(Decimal::ZERO)
        };
        rows.push(ReportRow {
            day: cell(day),
            spent: cell(spent),
            voucher_income: cell(voucher),
            profit: cell(profit),
        });
    }
    Ok(rows)
}

/// Strips currency symbols and separators; anything unparseable counts as zero.
fn numeric_cell(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
        .collect();
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

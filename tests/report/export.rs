use std::fs;

use rust_decimal_macros::dec;
use uuid::Uuid;

use leverage_sim::core::RiskLevel;
use leverage_sim::report::{
    RunReport, RunReporter, export_report, export_report_csv, export_report_json, format_report,
};

fn report(cancelled: bool) -> RunReport {
    let mut reporter = RunReporter::new(dec!(10000));
    reporter.log("[Step 3] OPEN LONG | Price: $100.00");
    reporter.record_open();
    reporter.update_equity(dec!(9800));
    reporter.build(dec!(9700), dec!(10250.4), RiskLevel::High, cancelled)
}

#[test]
fn text_report_lists_summary_then_log() {
    let text = format_report(&report(false));

    assert!(text.contains("SIMULATION REPORT"));
    assert!(text.contains("Initial Balance:     $10000.00"));
    assert!(text.contains("Final Equity:        $10250.40"));
    assert!(text.contains("PnL:                 $250.40 (2.50%)"));
    assert!(text.contains("Max Drawdown:        2.00%"));
    assert!(text.contains("Risk Level:          high"));
    assert!(!text.contains("cancelled"));

    let summary = text.find("Total Trades").unwrap();
    let log = text.find("[Step 3] OPEN LONG").unwrap();
    assert!(summary < log);
}

#[test]
fn text_report_flags_cancelled_runs() {
    let text = format_report(&report(true));
    assert!(text.contains("Status:              cancelled"));
}

#[test]
fn json_export_round_trips() {
    let path = std::env::temp_dir().join(format!("sim-report-{}.json", Uuid::new_v4()));
    let original = report(false);
    export_report_json(&path, &original).unwrap();

    let loaded: RunReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, original);

    fs::remove_file(&path).unwrap();
}

#[test]
fn csv_export_writes_metric_rows() {
    let path = std::env::temp_dir().join(format!("sim-report-{}.csv", Uuid::new_v4()));
    export_report_csv(&path, &report(false)).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<(String, String)> = reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            (record[0].to_string(), record[1].to_string())
        })
        .collect();

    assert_eq!(rows[0], ("initial_balance".to_string(), "10000".to_string()));
    assert!(rows.contains(&("trades".to_string(), "1".to_string())));
    assert!(rows.contains(&("risk_level".to_string(), "high".to_string())));
    assert_eq!(rows.len(), 11);

    fs::remove_file(&path).unwrap();
}

#[test]
fn export_dispatches_on_extension() {
    let dir = std::env::temp_dir();
    let json = dir.join(format!("sim-report-{}.JSON", Uuid::new_v4()));
    export_report(&json, &report(false)).unwrap();
    assert!(json.exists());
    fs::remove_file(&json).unwrap();

    let unknown = dir.join(format!("sim-report-{}.xml", Uuid::new_v4()));
    assert!(export_report(&unknown, &report(false)).is_err());
    assert!(!unknown.exists());
}

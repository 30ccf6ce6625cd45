use mockall::mock;
use rust_decimal_macros::dec;

use leverage_sim::analysis::{
    AnalysisError, AnalysisInput, AnalysisOutput, LlmClient, LlmMode, OfflineAnalysisClient,
    Scenarios, analyze_report,
};
use leverage_sim::core::{RiskLevel, Timeframe};
use leverage_sim::report::{RunReport, RunReporter};

mock! {
    pub Llm {}

    #[async_trait::async_trait]
    impl LlmClient for Llm {
        async fn analyze(
            &self,
            input: &AnalysisInput,
            mode: LlmMode,
        ) -> Result<AnalysisOutput, AnalysisError>;
    }
}

fn report(lines: usize, liquidations: usize) -> RunReport {
    let mut reporter = RunReporter::new(dec!(10000));
    for step in 1..=lines {
        reporter.log(format!("[Step {step}] Price: $100.00, Equity: $10000.00"));
    }
    reporter.set_liquidations(liquidations);
    reporter.update_equity(dec!(8000));
    reporter.build(dec!(8000), dec!(8000), RiskLevel::Medium, false)
}

#[test]
fn input_keeps_the_log_tail() {
    let input = AnalysisInput::from_report(&report(25, 0), "BTCUSDT", Timeframe::M15);
    assert_eq!(input.recent_log.len(), 10);
    assert!(input.recent_log[0].starts_with("[Step 16]"));
    assert_eq!(input.pnl_percent, dec!(-20));

    let prompt = input.to_prompt(LlmMode::Simulation);
    assert!(prompt.starts_with("Mode: simulation\nSymbol: BTCUSDT (15m)"));
    assert!(prompt.contains("Max drawdown: 20.00%"));
    assert!(prompt.contains("[Step 25]"));
}

#[tokio::test]
async fn analyze_report_returns_backend_output() {
    let expected = AnalysisOutput {
        summary: "ok".to_string(),
        risks: vec!["none".to_string()],
        scenarios: Scenarios {
            conservative: "c".to_string(),
            moderate: "m".to_string(),
            aggressive: "a".to_string(),
        },
        disclaimer: "d".to_string(),
    };
    let returned = expected.clone();

    let mut client = MockLlm::new();
    client
        .expect_analyze()
        .withf(|input, mode| {
            input.symbol == "ETHUSDT"
                && input.timeframe == Timeframe::H1
                && *mode == LlmMode::Simulation
        })
        .times(1)
        .returning(move |_, _| Ok(returned.clone()));

    let output = analyze_report(&client, &report(3, 0), "ETHUSDT", Timeframe::H1).await;
    assert_eq!(output, expected);
}

#[tokio::test]
async fn analyze_report_falls_back_on_backend_error() {
    let mut client = MockLlm::new();
    client
        .expect_analyze()
        .times(1)
        .returning(|_, _| Err(AnalysisError::Unavailable("timeout".to_string())));

    let output = analyze_report(&client, &report(3, 0), "BTCUSDT", Timeframe::M15).await;
    assert_eq!(output, AnalysisOutput::fallback(LlmMode::Simulation));
    assert_eq!(output.risks.len(), 3);
    assert!(output.summary.contains("simulation"));
}

#[tokio::test]
async fn offline_client_summarises_the_run() {
    let input = AnalysisInput::from_report(&report(5, 2), "BTCUSDT", Timeframe::M15);
    let output = OfflineAnalysisClient
        .analyze(&input, LlmMode::Portfolio)
        .await
        .unwrap();

    assert!(output.summary.starts_with("portfolio run on BTCUSDT 15m: equity lost 20.00%"));
    assert!(output.risks.contains(&"2 positions were liquidated".to_string()));
    assert!(output.disclaimer.contains("not financial advice"));
}

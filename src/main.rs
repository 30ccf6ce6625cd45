use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use leverage_sim::analysis::{OfflineAnalysisClient, analyze_report};
use leverage_sim::cli::{Cli, Command, SimulateArgs, TradeSimArgs};
use leverage_sim::config::{Config, load_config_with_cli};
use leverage_sim::core::Candle;
use leverage_sim::core::bot::TradeBot;
use leverage_sim::data::summary::load_report_summary;
use leverage_sim::data::{load_candles, save_candles};
use leverage_sim::logging::TickLogFileWriter;
use leverage_sim::report::{export_report, format_report};
use leverage_sim::risk::{RiskMetrics, classify_portfolio_risk};
use leverage_sim::simulation::{CandleGenerator, GeneratorParams};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Command::Simulate(args) => args.to_overrides(),
        Command::TradeSim(args) => args.to_overrides(),
    }
    .context("parse arguments")?;
    let config =
        load_config_with_cli(cli.config.as_deref(), Some(overrides)).context("load config")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Command::Simulate(args) => simulate(&config, args),
        Command::TradeSim(args) => trade_sim(config, args).await,
    }
}

fn generate(config: &Config) -> anyhow::Result<Vec<Candle>> {
    let generator =
        CandleGenerator::new(GeneratorParams::from_config(config)).context("create generator")?;
    let seed = config.generator.seed.unwrap_or_else(rand::random);
    info!(seed, candles = config.generator.candles, "generating candles");
    generator
        .generate_seeded(seed, Utc::now())
        .context("generate candles")
}

fn simulate(config: &Config, args: &SimulateArgs) -> anyhow::Result<()> {
    let candles = generate(config)?;
    let metrics = RiskMetrics::from_candles(&candles);
    let high = candles.iter().map(|candle| candle.high).max().unwrap_or_default();
    let low = candles.iter().map(|candle| candle.low).min().unwrap_or_default();
    let first = candles.first().map(|candle| candle.open).unwrap_or_default();
    let last = candles.last().map(|candle| candle.close).unwrap_or_default();

    println!("Candles:       {}", candles.len());
    println!("Timeframe:     {}", config.run.timeframe);
    println!("First open:    {first:.2}");
    println!("Last close:    {last:.2}");
    println!("High / Low:    {high:.2} / {low:.2}");
    println!("Max drawdown:  {:.2}%", metrics.max_drawdown_percent);
    println!("Volatility:    {:.4}", metrics.volatility);
    println!("Risk level:    {}", classify_portfolio_risk(&metrics));

    if let Some(path) = args.output.as_ref() {
        save_candles(path, &candles).context("write candles")?;
        info!(path = %path.display(), "candles written");
    }
    Ok(())
}

async fn trade_sim(config: Config, args: &TradeSimArgs) -> anyhow::Result<()> {
    let candles = match args.candles_file.as_ref() {
        Some(path) => load_candles(path).context("load candles")?,
        None => generate(&config)?,
    };
    let symbol = config.run.symbol.clone();
    let timeframe = config.run.timeframe;

    let mut bot = TradeBot::new(config.clone(), candles).context("create trade bot")?;
    if let Some(path) = config.strategy.report_path.as_ref() {
        let summary = load_report_summary(Path::new(path)).context("load report summary")?;
        info!(
            total_profit = %summary.total_profit,
            total_spent = %summary.total_spent,
            "attached report summary"
        );
        bot = bot.with_report_summary(summary);
    }
    if let Some(path) = config.logging.tick_path.as_ref() {
        let format = config.logging.tick_format.unwrap_or(config.logging.format);
        let writer =
            TickLogFileWriter::new(PathBuf::from(path), format).context("create tick logger")?;
        bot = bot.with_tick_writer(Arc::new(writer));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_handle = tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = ?err, "failed to listen for ctrl-c");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    let bot = bot.with_shutdown(shutdown_rx);
    let report = tokio::task::spawn_blocking(move || bot.run())
        .await
        .context("join simulation")?
        .context("run simulation")?;
    shutdown_handle.abort();

    println!("{}", format_report(&report));

    if let Some(path) = args.export.as_ref() {
        export_report(path, &report).context("export report")?;
        info!(path = %path.display(), "report exported");
    }

    if args.analyze {
        let analysis = analyze_report(&OfflineAnalysisClient, &report, &symbol, timeframe).await;
        println!();
        println!("{}", analysis.summary);
        for risk in &analysis.risks {
            println!("  - {risk}");
        }
        println!("Conservative: {}", analysis.scenarios.conservative);
        println!("Moderate:     {}", analysis.scenarios.moderate);
        println!("Aggressive:   {}", analysis.scenarios.aggressive);
        println!("{}", analysis.disclaimer);
    }
    Ok(())
}

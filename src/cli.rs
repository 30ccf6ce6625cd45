use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::config::{ConfigError, ConfigOverrides, StrategyKind};
use crate::core::Timeframe;

#[derive(Debug, Parser)]
#[command(
    name = "leverage-sim",
    about = "Leveraged trading simulator over synthetic or recorded candles"
)]
pub struct Cli {
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a synthetic series and print its statistics.
    Simulate(SimulateArgs),
    /// Run the full trading simulation.
    TradeSim(TradeSimArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct GeneratorArgs {
    #[arg(long)]
    pub timeframe: Option<String>,
    #[arg(long)]
    pub candles: Option<usize>,
    #[arg(long)]
    pub initial_price: Option<Decimal>,
    #[arg(long)]
    pub volatility: Option<Decimal>,
    #[arg(long)]
    pub trend: Option<Decimal>,
    #[arg(long)]
    pub shock: Option<Decimal>,
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub generator: GeneratorArgs,
    /// Write the generated candles as JSON.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TradeSimArgs {
    #[command(flatten)]
    pub generator: GeneratorArgs,
    #[arg(long)]
    pub symbol: Option<String>,
    #[arg(long)]
    pub balance: Option<Decimal>,
    #[arg(long)]
    pub max_leverage: Option<Decimal>,
    #[arg(long)]
    pub mmr: Option<Decimal>,
    #[arg(long)]
    pub window: Option<usize>,
    #[arg(long)]
    pub aggressiveness: Option<Decimal>,
    #[arg(long)]
    pub funding_rate: Option<Decimal>,
    /// Comma separated strategy names.
    #[arg(long)]
    pub strategies: Option<String>,
    #[arg(long)]
    pub adapt_aggressiveness: bool,
    /// Replay candles from a JSON file instead of generating them.
    #[arg(long, value_name = "PATH")]
    pub candles_file: Option<PathBuf>,
    /// Spending report (CSV or TSV) used to temper strategy bias.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
    /// Export the run report; format follows the extension (.json or .csv).
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    pub tick_log: Option<PathBuf>,
    /// Print an offline analysis digest after the run.
    #[arg(long)]
    pub analyze: bool,
}

impl GeneratorArgs {
    fn apply(&self, overrides: &mut ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(value) = &self.timeframe {
            overrides.run.timeframe = Some(Timeframe::from_str(value)?);
        }
        overrides.generator.candles = self.candles;
        overrides.generator.initial_price = self.initial_price;
        overrides.generator.volatility = self.volatility;
        overrides.generator.trend_strength = self.trend;
        overrides.generator.shock_probability = self.shock;
        overrides.generator.seed = self.seed;
        Ok(())
    }
}

impl SimulateArgs {
    pub fn to_overrides(&self) -> Result<ConfigOverrides, ConfigError> {
        let mut overrides = ConfigOverrides::default();
        self.generator.apply(&mut overrides)?;
        Ok(overrides)
    }
}

impl TradeSimArgs {
    pub fn to_overrides(&self) -> Result<ConfigOverrides, ConfigError> {
        let mut overrides = ConfigOverrides::default();
        self.generator.apply(&mut overrides)?;
        overrides.run.symbol = self.symbol.clone();
        overrides.run.initial_balance = self.balance;
        overrides.run.max_leverage = self.max_leverage;
        overrides.run.mmr = self.mmr;
        overrides.run.history_window = self.window;
        overrides.run.aggressiveness = self.aggressiveness;
        overrides.run.funding_rate = self.funding_rate;
        if let Some(list) = &self.strategies {
            let kinds = list
                .split(',')
                .filter(|item| !item.trim().is_empty())
                .map(StrategyKind::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            overrides.strategy.enabled = Some(kinds);
        }
        if self.adapt_aggressiveness {
            overrides.risk.adapt_aggressiveness = Some(true);
        }
        overrides.strategy.report_path = self
            .report
            .as_ref()
            .map(|path| path.display().to_string());
        overrides.logging.tick_path = self
            .tick_log
            .as_ref()
            .map(|path| path.display().to_string());
        Ok(overrides)
    }
}

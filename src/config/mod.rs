use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Timeframe;
use crate::simulation::generator::{MAX_CANDLES, MAX_VOLATILITY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("missing required value for {field}")]
    MissingValue { field: &'static str },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    Scalping,
    Intraday,
    Swing,
    Position,
    Volume,
    Funding,
    MultiTimeframe,
}

impl StrategyKind {
    pub fn all() -> &'static [StrategyKind] {
        &[
            StrategyKind::Scalping,
            StrategyKind::Intraday,
            StrategyKind::Swing,
            StrategyKind::Position,
            StrategyKind::Volume,
            StrategyKind::Funding,
            StrategyKind::MultiTimeframe,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Scalping => "Scalping",
            StrategyKind::Intraday => "Intraday",
            StrategyKind::Swing => "Swing",
            StrategyKind::Position => "Position",
            StrategyKind::Volume => "Volume",
            StrategyKind::Funding => "Funding",
            StrategyKind::MultiTimeframe => "Multi-Timeframe",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().replace('-', "_").as_str() {
            "SCALPING" => Ok(StrategyKind::Scalping),
            "INTRADAY" => Ok(StrategyKind::Intraday),
            "SWING" => Ok(StrategyKind::Swing),
            "POSITION" => Ok(StrategyKind::Position),
            "VOLUME" => Ok(StrategyKind::Volume),
            "FUNDING" => Ok(StrategyKind::Funding),
            "MULTI_TIMEFRAME" => Ok(StrategyKind::MultiTimeframe),
            _ => Err(ConfigError::InvalidValue {
                field: "strategy.enabled",
                message: format!("unsupported strategy: {value}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "JSON" => Ok(LogFormat::Json),
            "TEXT" => Ok(LogFormat::Text),
            _ => Err(ConfigError::InvalidValue {
                field: "logging.format",
                message: format!("unsupported log format: {value}"),
            }),
        }
    }
}

/// Parameters of the synthetic candle series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub initial_price: Decimal,
    pub candles: usize,
    pub volatility: Decimal,
    pub trend_strength: Decimal,
    pub shock_probability: Decimal,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            initial_price: Decimal::new(100, 0),
            candles: 500,
            volatility: Decimal::new(2, 2),
            trend_strength: Decimal::new(3, 1),
            shock_probability: Decimal::new(5, 2),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub initial_balance: Decimal,
    pub max_leverage: Decimal,
    pub mmr: Decimal,
    pub history_window: usize,
    pub aggressiveness: Decimal,
    pub funding_rate: Option<Decimal>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::M15,
            initial_balance: Decimal::new(10000, 0),
            max_leverage: Decimal::new(5, 0),
            mmr: Decimal::new(5, 3),
            history_window: 100,
            aggressiveness: Decimal::ONE,
            funding_rate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub enabled: Vec<StrategyKind>,
    /// Unlisted strategies weigh 1.
    pub weights: BTreeMap<StrategyKind, Decimal>,
    pub bollinger_multiplier: Decimal,
    pub report_path: Option<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: StrategyKind::all().to_vec(),
            weights: BTreeMap::new(),
            bollinger_multiplier: Decimal::new(2, 0),
            report_path: None,
        }
    }
}

impl StrategyConfig {
    pub fn weight_of(&self, kind: StrategyKind) -> Decimal {
        self.weights.get(&kind).copied().unwrap_or(Decimal::ONE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskConfig {
    pub adapt_aggressiveness: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub tick_path: Option<String>,
    pub tick_format: Option<LogFormat>,
    pub progress_interval: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            tick_path: None,
            tick_format: None,
            progress_interval: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub run: RunConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub logging: LoggingConfig,
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.to_string(),
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_generator()?;
        self.validate_run()?;

        if self.strategy.enabled.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "strategy.enabled",
            });
        }
        if self
            .strategy
            .weights
            .values()
            .any(|weight| *weight < Decimal::ZERO)
        {
            return Err(invalid("strategy.weights", "weights must be >= 0"));
        }
        if self.strategy.bollinger_multiplier <= Decimal::ZERO {
            return Err(invalid("strategy.bollinger_multiplier", "must be > 0"));
        }
        if self.logging.progress_interval == 0 {
            return Err(invalid("logging.progress_interval", "must be > 0"));
        }
        Ok(())
    }

    pub fn validate_generator(&self) -> Result<(), ConfigError> {
        let generator = &self.generator;
        if generator.initial_price <= Decimal::ZERO {
            return Err(invalid("generator.initial_price", "must be > 0"));
        }
        if generator.candles == 0 || generator.candles > MAX_CANDLES {
            return Err(invalid(
                "generator.candles",
                &format!("must be between 1 and {MAX_CANDLES}"),
            ));
        }
        if generator.volatility < Decimal::ZERO || generator.volatility > MAX_VOLATILITY {
            return Err(invalid("generator.volatility", "must be between 0 and 1"));
        }
        if generator.trend_strength < Decimal::ZERO || generator.trend_strength > Decimal::ONE {
            return Err(invalid("generator.trend_strength", "must be between 0 and 1"));
        }
        if generator.shock_probability < Decimal::ZERO
            || generator.shock_probability > Decimal::ONE
        {
            return Err(invalid(
                "generator.shock_probability",
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }

    pub fn validate_run(&self) -> Result<(), ConfigError> {
        let run = &self.run;
        if run.symbol.trim().is_empty() {
            return Err(ConfigError::MissingValue { field: "run.symbol" });
        }
        if run.initial_balance <= Decimal::ZERO {
            return Err(invalid("run.initial_balance", "must be > 0"));
        }
        if run.max_leverage < Decimal::ONE {
            return Err(invalid("run.max_leverage", "must be >= 1"));
        }
        if run.mmr <= Decimal::ZERO || run.mmr >= Decimal::new(1, 1) {
            return Err(invalid("run.mmr", "must be in (0, 0.1)"));
        }
        if run.history_window == 0 {
            return Err(invalid("run.history_window", "must be > 0"));
        }
        if run.aggressiveness < MIN_AGGRESSIVENESS || run.aggressiveness > MAX_AGGRESSIVENESS {
            return Err(invalid("run.aggressiveness", "must be between 0.4 and 2.0"));
        }
        Ok(())
    }

    pub fn from_toml_path(path: &Path) -> Result<Config, ConfigError> {
        let overrides = ConfigOverrides::from_toml_path(path)?;
        let mut config = Config::default();
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let generator = overrides.generator;
        if let Some(value) = generator.initial_price {
            self.generator.initial_price = value;
        }
        if let Some(value) = generator.candles {
            self.generator.candles = value;
        }
        if let Some(value) = generator.volatility {
            self.generator.volatility = value;
        }
        if let Some(value) = generator.trend_strength {
            self.generator.trend_strength = value;
        }
        if let Some(value) = generator.shock_probability {
            self.generator.shock_probability = value;
        }
        if let Some(value) = generator.seed {
            self.generator.seed = Some(value);
        }

        let run = overrides.run;
        if let Some(value) = run.symbol {
            self.run.symbol = value;
        }
        if let Some(value) = run.timeframe {
            self.run.timeframe = value;
        }
        if let Some(value) = run.initial_balance {
            self.run.initial_balance = value;
        }
        if let Some(value) = run.max_leverage {
            self.run.max_leverage = value;
        }
        if let Some(value) = run.mmr {
            self.run.mmr = value;
        }
        if let Some(value) = run.history_window {
            self.run.history_window = value;
        }
        if let Some(value) = run.aggressiveness {
            self.run.aggressiveness = value;
        }
        if let Some(value) = run.funding_rate {
            self.run.funding_rate = Some(value);
        }

        let strategy = overrides.strategy;
        if let Some(value) = strategy.enabled {
            self.strategy.enabled = value;
        }
        if let Some(weights) = strategy.weights {
            self.strategy.weights.extend(weights);
        }
        if let Some(value) = strategy.bollinger_multiplier {
            self.strategy.bollinger_multiplier = value;
        }
        if let Some(value) = strategy.report_path {
            self.strategy.report_path = Some(value);
        }

        if let Some(value) = overrides.risk.adapt_aggressiveness {
            self.risk.adapt_aggressiveness = value;
        }

        let logging = overrides.logging;
        if let Some(value) = logging.level {
            self.logging.level = value;
        }
        if let Some(value) = logging.format {
            self.logging.format = value;
        }
        if let Some(value) = logging.tick_path {
            self.logging.tick_path = Some(value);
        }
        if let Some(value) = logging.tick_format {
            self.logging.tick_format = Some(value);
        }
        if let Some(value) = logging.progress_interval {
            self.logging.progress_interval = value;
        }
    }
}

pub const MIN_AGGRESSIVENESS: Decimal = Decimal::from_parts(4, 0, 0, false, 1);
pub const MAX_AGGRESSIVENESS: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub generator: GeneratorOverrides,
    #[serde(default)]
    pub run: RunOverrides,
    #[serde(default)]
    pub strategy: StrategyOverrides,
    #[serde(default)]
    pub risk: RiskOverrides,
    #[serde(default)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeneratorOverrides {
    pub initial_price: Option<Decimal>,
    pub candles: Option<usize>,
    pub volatility: Option<Decimal>,
    pub trend_strength: Option<Decimal>,
    pub shock_probability: Option<Decimal>,
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunOverrides {
    pub symbol: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub initial_balance: Option<Decimal>,
    pub max_leverage: Option<Decimal>,
    pub mmr: Option<Decimal>,
    pub history_window: Option<usize>,
    pub aggressiveness: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StrategyOverrides {
    pub enabled: Option<Vec<StrategyKind>>,
    pub weights: Option<BTreeMap<StrategyKind, Decimal>>,
    pub bollinger_multiplier: Option<Decimal>,
    pub report_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RiskOverrides {
    pub adapt_aggressiveness: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingOverrides {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    pub tick_path: Option<String>,
    pub tick_format: Option<LogFormat>,
    pub progress_interval: Option<usize>,
}

impl ConfigOverrides {
    pub fn from_toml_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let overrides = toml::from_str(&content)?;
        Ok(overrides)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut overrides = ConfigOverrides::default();
        if let Ok(value) = std::env::var("SIM_INITIAL_PRICE") {
            overrides.generator.initial_price =
                Some(parse_decimal(&value, "generator.initial_price")?);
        }
        if let Ok(value) = std::env::var("SIM_CANDLES") {
            overrides.generator.candles = Some(parse_usize(&value, "generator.candles")?);
        }
        if let Ok(value) = std::env::var("SIM_VOLATILITY") {
            overrides.generator.volatility = Some(parse_decimal(&value, "generator.volatility")?);
        }
        if let Ok(value) = std::env::var("SIM_TREND_STRENGTH") {
            overrides.generator.trend_strength =
                Some(parse_decimal(&value, "generator.trend_strength")?);
        }
        if let Ok(value) = std::env::var("SIM_SHOCK_PROBABILITY") {
            overrides.generator.shock_probability =
                Some(parse_decimal(&value, "generator.shock_probability")?);
        }
        if let Ok(value) = std::env::var("SIM_SEED") {
            overrides.generator.seed = Some(parse_u64(&value, "generator.seed")?);
        }
        if let Ok(value) = std::env::var("SIM_SYMBOL") {
            overrides.run.symbol = Some(value);
        }
        if let Ok(value) = std::env::var("SIM_TIMEFRAME") {
            overrides.run.timeframe = Some(Timeframe::from_str(&value)?);
        }
        if let Ok(value) = std::env::var("SIM_INITIAL_BALANCE") {
            overrides.run.initial_balance = Some(parse_decimal(&value, "run.initial_balance")?);
        }
        if let Ok(value) = std::env::var("SIM_MAX_LEVERAGE") {
            overrides.run.max_leverage = Some(parse_decimal(&value, "run.max_leverage")?);
        }
        if let Ok(value) = std::env::var("SIM_MMR") {
            overrides.run.mmr = Some(parse_decimal(&value, "run.mmr")?);
        }
        if let Ok(value) = std::env::var("SIM_HISTORY_WINDOW") {
            overrides.run.history_window = Some(parse_usize(&value, "run.history_window")?);
        }
        if let Ok(value) = std::env::var("SIM_AGGRESSIVENESS") {
            overrides.run.aggressiveness = Some(parse_decimal(&value, "run.aggressiveness")?);
        }
        if let Ok(value) = std::env::var("SIM_FUNDING_RATE") {
            overrides.run.funding_rate = Some(parse_decimal(&value, "run.funding_rate")?);
        }
        if let Ok(value) = std::env::var("SIM_STRATEGIES") {
            overrides.strategy.enabled = Some(parse_strategy_kinds(&value)?);
        }
        if let Ok(value) = std::env::var("SIM_BOLLINGER_MULTIPLIER") {
            overrides.strategy.bollinger_multiplier =
                Some(parse_decimal(&value, "strategy.bollinger_multiplier")?);
        }
        if let Ok(value) = std::env::var("SIM_REPORT_PATH") {
            overrides.strategy.report_path = Some(value);
        }
        if let Ok(value) = std::env::var("SIM_ADAPT_AGGRESSIVENESS") {
            overrides.risk.adapt_aggressiveness =
                Some(parse_bool(&value, "risk.adapt_aggressiveness")?);
        }
        if let Ok(value) = std::env::var("SIM_LOG_LEVEL") {
            overrides.logging.level = Some(value);
        }
        if let Ok(value) = std::env::var("SIM_LOG_FORMAT") {
            overrides.logging.format = Some(LogFormat::from_str(&value)?);
        }
        if let Ok(value) = std::env::var("SIM_TICK_LOG_PATH") {
            overrides.logging.tick_path = Some(value);
        }
        if let Ok(value) = std::env::var("SIM_PROGRESS_INTERVAL") {
            overrides.logging.progress_interval =
                Some(parse_usize(&value, "logging.progress_interval")?);
        }
        Ok(overrides)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_cli(path, None)
}

pub fn load_config_with_cli(
    path: Option<&Path>,
    cli_overrides: Option<ConfigOverrides>,
) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    if let Some(path) = path {
        let file_overrides = ConfigOverrides::from_toml_path(path)?;
        config.apply_overrides(file_overrides);
    }
    let env_overrides = ConfigOverrides::from_env()?;
    config.apply_overrides(env_overrides);
    if let Some(cli_overrides) = cli_overrides {
        config.apply_overrides(cli_overrides);
    }
    config.validate()?;
    Ok(config)
}

fn parse_decimal(value: &str, field: &'static str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|err| ConfigError::InvalidValue {
        field,
        message: format!("invalid decimal: {err}"),
    })
}

fn parse_usize(value: &str, field: &'static str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|err| ConfigError::InvalidValue {
        field,
        message: format!("invalid usize: {err}"),
    })
}

fn parse_u64(value: &str, field: &'static str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|err| ConfigError::InvalidValue {
        field,
        message: format!("invalid u64: {err}"),
    })
}

fn parse_bool(value: &str, field: &'static str) -> Result<bool, ConfigError> {
    value.trim().parse().map_err(|err| ConfigError::InvalidValue {
        field,
        message: format!("invalid bool: {err}"),
    })
}

fn parse_strategy_kinds(value: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    value
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(StrategyKind::from_str)
        .collect()
}

pub static BASELINE_CONFIG: Lazy<Config> = Lazy::new(Config::default);

pub fn get_default_config() -> Config {
    BASELINE_CONFIG.clone()
}

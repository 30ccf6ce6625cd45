use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LogFormat;
use crate::core::{PositionSide, RiskLevel, SignalAction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickEvent {
    Open(PositionSide),
    Close,
    Liquidation,
    ExecutionError(String),
}

/// One structured record per simulated tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickLog {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub balance: Decimal,
    pub equity: Decimal,
    pub open_positions: usize,
    pub combined_action: SignalAction,
    pub score_buy: Decimal,
    pub score_sell: Decimal,
    pub score_hold: Decimal,
    pub risk_level: RiskLevel,
    pub decision: String,
    pub max_drawdown_percent: Decimal,
    pub events: Vec<TickEvent>,
}

impl TickLog {
    pub fn to_json_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogFormatter;

impl LogFormatter {
    pub fn format_json(&self, tick: &TickLog) -> Result<String, serde_json::Error> {
        serde_json::to_string(tick)
    }

    pub fn format_text(&self, tick: &TickLog) -> String {
        format!(
            "[{}] STEP={} PX={} BAL={} EQ={} POS={} SIGNAL={:?} RISK={} DECISION={} DD={}",
            tick.timestamp.to_rfc3339(),
            tick.step,
            tick.price,
            tick.balance,
            tick.equity,
            tick.open_positions,
            tick.combined_action,
            tick.risk_level,
            tick.decision,
            tick.max_drawdown_percent.round_dp(2)
        )
    }
}

pub trait TickLogWriter: Send + Sync {
    fn write(&self, tick: &TickLog) -> Result<(), std::io::Error>;
}

pub struct TickLogFileWriter {
    logger: Mutex<FileLogger>,
    formatter: LogFormatter,
    format: LogFormat,
}

impl TickLogFileWriter {
    pub fn new(path: PathBuf, format: LogFormat) -> Result<Self, std::io::Error> {
        Self::with_rotation(path, format, RotationConfig::default())
    }

    pub fn with_rotation(
        path: PathBuf,
        format: LogFormat,
        rotation: RotationConfig,
    ) -> Result<Self, std::io::Error> {
        let logger = FileLogger::new(path, rotation)?;
        Ok(Self {
            logger: Mutex::new(logger),
            formatter: LogFormatter,
            format,
        })
    }
}

impl TickLogWriter for TickLogFileWriter {
    fn write(&self, tick: &TickLog) -> Result<(), std::io::Error> {
        let line = match self.format {
            LogFormat::Json => self
                .formatter
                .format_json(tick)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?,
            LogFormat::Text => self.formatter.format_text(tick),
        };
        let mut logger = self
            .logger
            .lock()
            .map_err(|_| std::io::Error::other("tick log lock poisoned"))?;
        logger.write_line(&line)
    }
}

#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    rotation: RotationConfig,
}

impl FileLogger {
    pub fn new(path: PathBuf, rotation: RotationConfig) -> Result<Self, std::io::Error> {
        if rotation.max_files == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "max_files must be > 0",
            ));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path, rotation })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        let bytes = line.len() as u64 + 1;
        if self.path.exists() {
            let metadata = fs::metadata(&self.path)?;
            if metadata.len() + bytes > self.rotation.max_bytes {
                self.rotate()?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn rotate(&self) -> Result<(), std::io::Error> {
        for index in (1..=self.rotation.max_files).rev() {
            let target = rotated_path(&self.path, index);
            let source = if index == 1 {
                self.path.clone()
            } else {
                rotated_path(&self.path, index - 1)
            };
            if source.exists() {
                if target.exists() {
                    fs::remove_file(&target)?;
                }
                fs::rename(&source, &target)?;
            }
        }
        Ok(())
    }
}

pub fn rotated_path(path: &Path, index: usize) -> PathBuf {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("log");
    let mut rotated = path.to_path_buf();
    rotated.set_file_name(format!("{filename}.{index}"));
    rotated
}

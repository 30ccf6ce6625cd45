use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::core::{PositionSide, RiskLevel};
use crate::strategies::CombinedSignal;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TradeAction {
    OpenLong {
        size_fraction: Decimal,
        leverage: Decimal,
    },
    OpenShort {
        size_fraction: Decimal,
        leverage: Decimal,
    },
    Close,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::OpenLong { .. } => f.write_str("open-long"),
            TradeAction::OpenShort { .. } => f.write_str("open-short"),
            TradeAction::Close => f.write_str("close"),
            TradeAction::Hold => f.write_str("hold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: TradeAction,
    pub reason: String,
}

impl Decision {
    fn new(action: TradeAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
        }
    }
}

/// Aggressiveness-scaled entry and exit rules.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    aggressiveness: Decimal,
    max_leverage: Decimal,
}

impl DecisionPolicy {
    pub fn new(aggressiveness: Decimal, max_leverage: Decimal) -> Self {
        Self {
            aggressiveness,
            max_leverage,
        }
    }

    pub fn from_run_config(run: &RunConfig) -> Self {
        Self::new(run.aggressiveness, run.max_leverage)
    }

    pub fn aggressiveness(&self) -> Decimal {
        self.aggressiveness
    }

    fn excess(&self) -> Decimal {
        self.aggressiveness - Decimal::ONE
    }

    pub fn open_threshold(&self) -> Decimal {
        let threshold = Decimal::new(65, 2) - self.excess() * Decimal::new(2, 1);
        threshold.max(Decimal::new(35, 2))
    }

    pub fn close_threshold(&self) -> Decimal {
        self.open_threshold() * Decimal::new(7, 1)
    }

    pub fn size_fraction(&self) -> Decimal {
        let fraction = Decimal::new(8, 2) + self.excess() * Decimal::new(5, 2);
        fraction.clamp(Decimal::new(2, 2), Decimal::new(25, 2))
    }

    pub fn leverage(&self) -> Decimal {
        let leverage = Decimal::ONE + self.excess() * Decimal::new(15, 1);
        leverage.max(Decimal::ONE).min(self.max_leverage.max(Decimal::ONE))
    }

    /// `held` is the side of the open position, if any.
    pub fn decide(
        &self,
        signal: &CombinedSignal,
        risk_level: RiskLevel,
        held: Option<PositionSide>,
    ) -> Decision {
        if let Some(side) = held {
            if risk_level == RiskLevel::Extreme {
                return Decision::new(
                    TradeAction::Close,
                    "Emergency close due to extreme liquidation risk",
                );
            }
            let (held_score, opposing_score) = match side {
                PositionSide::Long => (signal.score_buy, signal.score_sell),
                PositionSide::Short => (signal.score_sell, signal.score_buy),
            };
            if opposing_score - held_score > self.close_threshold() {
                return Decision::new(
                    TradeAction::Close,
                    format!("Closing {side} position due to strengthening opposite signal"),
                );
            }
            return Decision::new(TradeAction::Hold, "Holding existing position");
        }

        let threshold = self.open_threshold();
        let buy_bias = signal.score_buy - signal.score_sell;
        let sell_bias = -buy_bias;
        let size_fraction = self.size_fraction();
        let leverage = self.leverage();

        if buy_bias > threshold {
            Decision::new(
                TradeAction::OpenLong {
                    size_fraction,
                    leverage,
                },
                format!("Buy bias {buy_bias:.2} (threshold {threshold:.2})"),
            )
        } else if sell_bias > threshold {
            Decision::new(
                TradeAction::OpenShort {
                    size_fraction,
                    leverage,
                },
                format!("Sell bias {sell_bias:.2} (threshold {threshold:.2})"),
            )
        } else {
            Decision::new(TradeAction::Hold, "No strong signal detected")
        }
    }
}

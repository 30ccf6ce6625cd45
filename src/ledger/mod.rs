use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::PositionSide;
use crate::risk::liquidation_price;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient funds: margin {required} exceeds available balance {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    #[error("invalid position reference {index}: {reason}")]
    InvalidPositionReference { index: usize, reason: String },
    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

/// A margin position. Entry terms are fixed at open and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPosition {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub leverage: Decimal,
    pub mmr: Decimal,
    pub initial_margin: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub is_liquidated: bool,
}

impl SimulatedPosition {
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Whether `price` has crossed the liquidation price in the adverse direction.
    pub fn breached(&self, price: Decimal) -> bool {
        match (self.side, self.liquidation_price) {
            (PositionSide::Long, Some(liquidation)) => price <= liquidation,
            (PositionSide::Short, Some(liquidation)) => price >= liquidation,
            (_, None) => false,
        }
    }
}

/// Cash balance plus open positions.
///
/// `balance` excludes committed margin. Liquidated positions stay in the
/// book with their margin forfeited until they are accounted for.
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    balance: Decimal,
    positions: Vec<SimulatedPosition>,
}

impl LedgerEngine {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            positions: Vec::new(),
        }
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn positions(&self) -> &[SimulatedPosition] {
        &self.positions
    }

    pub fn active_positions(&self) -> impl Iterator<Item = &SimulatedPosition> {
        self.positions
            .iter()
            .filter(|position| !position.is_liquidated)
    }

    pub fn first_active_index(&self) -> Option<usize> {
        self.positions
            .iter()
            .position(|position| !position.is_liquidated)
    }

    pub fn liquidated_count(&self) -> usize {
        self.positions
            .iter()
            .filter(|position| position.is_liquidated)
            .count()
    }

    /// Commits `size * price / leverage` of cash as margin and books the position.
    pub fn open(
        &mut self,
        side: PositionSide,
        price: Decimal,
        size: Decimal,
        leverage: Decimal,
        mmr: Decimal,
    ) -> Result<&SimulatedPosition, LedgerError> {
        if price <= Decimal::ZERO || size <= Decimal::ZERO {
            return Err(LedgerError::InvalidOrder(format!(
                "price {price} and size {size} must be > 0"
            )));
        }
        if leverage < Decimal::ONE {
            return Err(LedgerError::InvalidOrder(format!(
                "leverage {leverage} must be >= 1"
            )));
        }
        let notional = size * price;
        let initial_margin = notional / leverage;
        if initial_margin > self.balance {
            return Err(LedgerError::InsufficientFunds {
                required: initial_margin,
                available: self.balance,
            });
        }

        self.balance -= initial_margin;
        self.positions.push(SimulatedPosition {
            side,
            entry_price: price,
            size,
            leverage,
            mmr,
            initial_margin,
            liquidation_price: liquidation_price(side, price, leverage, mmr),
            is_liquidated: false,
        });
        let index = self.positions.len() - 1;
        Ok(&self.positions[index])
    }

    /// Realises PnL for position `index` and returns it.
    pub fn close(&mut self, index: usize, price: Decimal) -> Result<Decimal, LedgerError> {
        let Some(position) = self.positions.get(index) else {
            return Err(LedgerError::InvalidPositionReference {
                index,
                reason: format!("only {} positions open", self.positions.len()),
            });
        };
        if position.is_liquidated {
            return Err(LedgerError::InvalidPositionReference {
                index,
                reason: "position already liquidated".to_string(),
            });
        }
        let pnl = position.unrealized_pnl(price);
        self.balance += position.initial_margin + pnl;
        self.positions.remove(index);
        Ok(pnl)
    }

    /// Marks breached positions as liquidated and returns their indices.
    pub fn on_price_update(&mut self, price: Decimal) -> Vec<usize> {
        let mut liquidated = Vec::new();
        for (index, position) in self.positions.iter_mut().enumerate() {
            if !position.is_liquidated && position.breached(price) {
                position.is_liquidated = true;
                liquidated.push(index);
            }
        }
        liquidated
    }

    pub fn equity(&self, price: Decimal) -> Decimal {
        self.active_positions()
            .fold(self.balance, |equity, position| {
                equity + position.initial_margin + position.unrealized_pnl(price)
            })
    }
}

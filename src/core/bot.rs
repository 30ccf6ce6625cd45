use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::core::pipeline::SignalPipeline;
use crate::core::{Candle, PositionSide};
use crate::data::summary::ReportSummary;
use crate::decision::{Decision, DecisionPolicy, TradeAction};
use crate::indicators::IndicatorError;
use crate::ledger::{LedgerEngine, LedgerError};
use crate::logging::{TickEvent, TickLog, TickLogWriter};
use crate::report::{RunReport, RunReporter};
use crate::risk::{
    RiskMetrics, adjust_aggressiveness, classify_portfolio_risk, estimate_volatility,
    worst_risk_level,
};
use crate::simulation::{MarketState, MarketStepper, StepperError};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("indicator error: {0}")]
    Indicator(#[from] IndicatorError),
    #[error("data error: {0}")]
    Data(#[from] StepperError),
    #[error("candle series is empty")]
    EmptySeries,
}

/// Drives one simulation run tick by tick over a fixed candle series.
pub struct TradeBot {
    config: Config,
    stepper: MarketStepper,
    ledger: LedgerEngine,
    reporter: RunReporter,
    pipeline: SignalPipeline,
    policy: DecisionPolicy,
    shutdown: Option<watch::Receiver<bool>>,
    tick_writer: Option<Arc<dyn TickLogWriter>>,
}

impl std::fmt::Debug for TradeBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeBot")
            .field("config", &self.config)
            .field("stepper", &self.stepper.position())
            .field("ledger", &self.ledger)
            .field("policy", &self.policy)
            .finish()
    }
}

impl TradeBot {
    pub fn new(config: Config, candles: Vec<Candle>) -> Result<Self, BotError> {
        config.validate()?;
        if candles.is_empty() {
            return Err(BotError::EmptySeries);
        }

        let run = &config.run;
        let mut policy = DecisionPolicy::from_run_config(run);
        if config.risk.adapt_aggressiveness {
            let metrics = RiskMetrics::from_candles(&candles);
            let adjusted = adjust_aggressiveness(run.aggressiveness, &metrics, run.funding_rate);
            info!(
                base = %run.aggressiveness,
                adjusted = %adjusted,
                drawdown = %metrics.max_drawdown_percent.round_dp(2),
                volatility = %metrics.volatility.round_dp(4),
                "adapted aggressiveness to series risk"
            );
            policy = DecisionPolicy::new(adjusted, run.max_leverage);
        }

        let pipeline = SignalPipeline::new(&config)?;
        let stepper = MarketStepper::with_window(
            run.symbol.clone(),
            run.timeframe,
            candles,
            run.history_window,
        );

        Ok(Self {
            ledger: LedgerEngine::new(run.initial_balance),
            reporter: RunReporter::new(run.initial_balance),
            stepper,
            pipeline,
            policy,
            config,
            shutdown: None,
            tick_writer: None,
        })
    }

    pub fn with_report_summary(mut self, summary: ReportSummary) -> Self {
        self.pipeline = self.pipeline.with_report_summary(summary);
        self
    }

    /// The flag is read once at the start of every tick.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_tick_writer(mut self, writer: Arc<dyn TickLogWriter>) -> Self {
        self.tick_writer = Some(writer);
        self
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|shutdown| *shutdown.borrow())
    }

    pub fn run(mut self) -> Result<RunReport, BotError> {
        let symbol = self.config.run.symbol.clone();
        let timeframe = self.config.run.timeframe;
        let initial_balance = self.config.run.initial_balance;
        info!(
            %symbol,
            %timeframe,
            candles = self.stepper.len(),
            aggressiveness = %self.policy.aggressiveness(),
            "starting simulation"
        );
        self.reporter
            .log(format!("Starting simulation for {symbol} on {timeframe}"));
        self.reporter
            .log(format!("Initial balance: ${initial_balance:.2}"));
        self.reporter.log("");

        let mut step = 0usize;
        let mut last_price = None;
        let mut cancelled = false;

        while self.stepper.has_next() {
            if self.shutdown_requested() {
                cancelled = true;
                info!(step, "shutdown requested, stopping between ticks");
                break;
            }
            step += 1;
            let state = self.stepper.next()?;
            last_price = Some(state.current_price);
            self.tick(step, &state);
        }

        let final_balance = self.ledger.balance();
        let final_equity = last_price
            .map(|price| self.ledger.equity(price))
            .unwrap_or(final_balance);
        let metrics = RiskMetrics {
            max_drawdown_percent: self.reporter.max_drawdown_percent(),
            volatility: estimate_volatility(self.stepper.history(self.stepper.position())),
        };
        let risk_level = classify_portfolio_risk(&metrics);

        self.reporter.log("");
        if cancelled {
            self.reporter
                .log(format!("Simulation cancelled after {step} steps."));
        } else {
            self.reporter.log("Simulation completed.");
        }

        let report = self
            .reporter
            .build(final_balance, final_equity, risk_level, cancelled);
        info!(
            steps = step,
            trades = report.trades,
            liquidations = report.liquidations,
            pnl = %report.pnl.round_dp(2),
            max_drawdown = %report.max_drawdown_percent.round_dp(2),
            cancelled,
            "simulation finished"
        );
        Ok(report)
    }

    fn tick(&mut self, step: usize, state: &MarketState) {
        let price = state.current_price;
        let mut events = Vec::new();

        for index in self.ledger.on_price_update(price) {
            let position = &self.ledger.positions()[index];
            warn!(step, side = %position.side, %price, "position liquidated");
            self.reporter.log(format!(
                "[Step {step}] LIQUIDATED {} | Price: ${price:.2} | Margin lost: ${:.2}",
                position.side.to_string().to_uppercase(),
                position.initial_margin
            ));
            events.push(TickEvent::Liquidation);
        }
        self.reporter
            .set_liquidations(self.ledger.liquidated_count());

        let held = self.ledger.active_positions().next().map(|position| position.side);
        let output = self.pipeline.update(state, held);
        let risk_level = worst_risk_level(self.ledger.positions(), price);
        let decision = self.policy.decide(&output.combined, risk_level, held);
        debug!(
            step,
            %price,
            action = ?output.combined.action,
            buy = %output.combined.score_buy,
            sell = %output.combined.score_sell,
            %risk_level,
            decision = %decision.action,
            "tick evaluated"
        );

        if let Err(err) = self.execute(step, price, &decision, &mut events) {
            warn!(step, error = %err, action = %decision.action, %price, "execution failed");
            self.reporter.log(format!(
                "[Step {step}] ERROR: {err} (action={}, price={price:.2})",
                decision.action
            ));
            events.push(TickEvent::ExecutionError(err.to_string()));
        }

        let equity = self.ledger.equity(price);
        let max_drawdown_percent = self.reporter.update_equity(equity);

        if step % self.config.logging.progress_interval == 0 {
            self.reporter.log(format!(
                "[Step {step}] Price: ${price:.2}, Equity: ${equity:.2}"
            ));
        }

        if let Some(writer) = &self.tick_writer {
            let tick = TickLog {
                step,
                timestamp: state.timestamp,
                price,
                balance: self.ledger.balance(),
                equity,
                open_positions: self.ledger.active_positions().count(),
                combined_action: output.combined.action,
                score_buy: output.combined.score_buy,
                score_sell: output.combined.score_sell,
                score_hold: output.combined.score_hold,
                risk_level,
                decision: decision.action.to_string(),
                max_drawdown_percent,
                events,
            };
            if let Err(err) = writer.write(&tick) {
                warn!(step, error = ?err, "failed to write tick log");
            }
        }
    }

    fn execute(
        &mut self,
        step: usize,
        price: Decimal,
        decision: &Decision,
        events: &mut Vec<TickEvent>,
    ) -> Result<(), LedgerError> {
        match decision.action {
            TradeAction::OpenLong {
                size_fraction,
                leverage,
            } => self.open(step, price, PositionSide::Long, size_fraction, leverage, decision, events),
            TradeAction::OpenShort {
                size_fraction,
                leverage,
            } => self.open(step, price, PositionSide::Short, size_fraction, leverage, decision, events),
            TradeAction::Close => {
                let Some(index) = self.ledger.first_active_index() else {
                    return Ok(());
                };
                let pnl = self.ledger.close(index, price)?;
                self.reporter.record_close();
                info!(step, %price, pnl = %pnl.round_dp(2), "position closed");
                self.reporter.log(format!(
                    "[Step {step}] CLOSE | Price: ${price:.2} | PnL: ${pnl:.2} | Reason: {}",
                    decision.reason
                ));
                events.push(TickEvent::Close);
                Ok(())
            }
            TradeAction::Hold => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn open(
        &mut self,
        step: usize,
        price: Decimal,
        side: PositionSide,
        size_fraction: Decimal,
        leverage: Decimal,
        decision: &Decision,
        events: &mut Vec<TickEvent>,
    ) -> Result<(), LedgerError> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidOrder(format!("price {price} must be > 0")));
        }
        let margin = self.ledger.balance() * size_fraction;
        let size = margin * leverage / price;
        let mmr = self.config.run.mmr;
        self.ledger.open(side, price, size, leverage, mmr)?;
        self.reporter.record_open();
        info!(step, %side, %price, size = %size.round_dp(4), %leverage, "position opened");
        self.reporter.log(format!(
            "[Step {step}] OPEN {} | Price: ${price:.2} | Size: {size:.4} | Leverage: {}x | Reason: {}",
            side.to_string().to_uppercase(),
            leverage.normalize(),
            decision.reason
        ));
        events.push(TickEvent::Open(side));
        Ok(())
    }
}

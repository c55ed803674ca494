//! # Armada Backtester Crate
//!
//! Replays a bar history through a strategy with the exact gating a live
//! worker applies: protective levels first, then the signal, then the daily
//! limits and position sizing. Fills are simulated at the bar close (or at
//! the protective level when one is crossed), and any position still open
//! after the final bar is force-closed so the report never carries
//! unrealized exposure.

pub mod error;

use analytics::{AnalyticsEngine, PerformanceReport};
use configuration::{BacktestSettings, Cadence};
use core_types::{Bar, CloseReason, EquityPoint, PositionSide, SignalAction, TradeRecord};
use indicatif::{ProgressBar, ProgressStyle};
use ledger::PositionTracker;
use risk::{position_size, DailyLimits};
use rust_decimal::Decimal;
use strategies::Strategy;

pub use error::BacktestError;

/// Everything a backtest run produces.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub report: PerformanceReport,
}

/// The main backtesting engine. One instance simulates one strategy on one
/// symbol; construct a fresh one per run.
pub struct Backtester {
    symbol: String,
    cadence: Cadence,
    strategy: Box<dyn Strategy>,
    initial_capital: Decimal,
    commission_rate: Decimal,
    analytics_engine: AnalyticsEngine,
}

impl Backtester {
    pub fn new(
        symbol: impl Into<String>,
        cadence: Cadence,
        strategy: Box<dyn Strategy>,
        settings: &BacktestSettings,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            cadence,
            strategy,
            initial_capital: settings.initial_capital,
            commission_rate: settings.commission_rate,
            analytics_engine: AnalyticsEngine::new(),
        }
    }

    /// Runs the simulation over `bars`, oldest first.
    pub fn run(&mut self, bars: &[Bar]) -> Result<BacktestReport, BacktestError> {
        let warmup = self.strategy.warmup();
        if bars.len() < warmup {
            return Err(BacktestError::InsufficientHistory {
                required: warmup,
                got: bars.len(),
            });
        }

        let mut tracker = PositionTracker::new(self.symbol.clone(), self.commission_rate);
        let mut limits = DailyLimits::new(self.strategy.risk().clone(), bars[0].timestamp);
        let mut cash = self.initial_capital;
        let mut equity_curve = Vec::with_capacity(bars.len() - warmup + 1);

        let progress_bar = ProgressBar::new((bars.len() - warmup + 1) as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );

        for i in (warmup - 1)..bars.len() {
            let bar = &bars[i];
            let history = &bars[..=i];

            // 1. Protective levels fire before anything else on the bar.
            if let Some(record) = tracker.check_protective_levels(bar)? {
                cash += record.pnl_amount;
                limits.record_pnl(bar.timestamp, record.pnl_amount);
            }

            // 2. Strategy evaluation on the history up to this bar.
            if let Some(signal) = self.strategy.generate_signal(history)? {
                self.process_signal(&signal.action, bar, history, &mut tracker, &mut limits, &mut cash)?;
            }

            // 3. Mark to market at the close.
            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: cash + tracker.unrealized_pnl(bar.close),
                price: bar.close,
            });
            progress_bar.inc(1);
        }
        progress_bar.finish_and_clear();

        // The report must not carry unrealized exposure.
        if let Some(last) = bars.last() {
            if let Some(record) =
                tracker.force_close(last.close, last.timestamp, CloseReason::EndOfBacktest)
            {
                cash += record.pnl_amount;
                if let Some(point) = equity_curve.last_mut() {
                    point.equity = cash;
                }
            }
        }

        let report = self.analytics_engine.calculate(
            tracker.trades(),
            &equity_curve,
            self.initial_capital,
            self.cadence,
        )?;

        Ok(BacktestReport {
            trades: tracker.trades().to_vec(),
            equity_curve,
            report,
        })
    }

    fn process_signal(
        &self,
        action: &SignalAction,
        bar: &Bar,
        history: &[Bar],
        tracker: &mut PositionTracker,
        limits: &mut DailyLimits,
        cash: &mut Decimal,
    ) -> Result<(), BacktestError> {
        match action {
            SignalAction::Buy | SignalAction::Sell => {
                // Re-entry while a position is open is ignored, not reversed.
                if tracker.side() != PositionSide::Flat {
                    tracing::debug!(symbol = %self.symbol, "entry signal ignored, position open");
                    return Ok(());
                }

                let equity = *cash;
                let decision = limits.check(bar.timestamp, equity);
                if !decision.is_pass() {
                    tracing::debug!(symbol = %self.symbol, ?decision, "entry suppressed");
                    return Ok(());
                }

                let side = if *action == SignalAction::Buy {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };
                let levels = self.strategy.exit_levels(history, side, bar.close)?;
                let quantity =
                    position_size(equity, bar.close, levels.stop_loss, self.strategy.risk())?;
                if quantity <= Decimal::ZERO {
                    return Ok(());
                }

                tracker.open(
                    side,
                    bar.close,
                    quantity,
                    Some(levels.stop_loss),
                    Some(levels.take_profit),
                    bar.timestamp,
                )?;
                limits.record_entry(bar.timestamp);
            }
            SignalAction::ExitLong if tracker.side() == PositionSide::Long => {
                let record = tracker.close(bar.close, bar.timestamp, CloseReason::ExitSignal)?;
                *cash += record.pnl_amount;
                limits.record_pnl(bar.timestamp, record.pnl_amount);
            }
            SignalAction::ExitShort if tracker.side() == PositionSide::Short => {
                let record = tracker.close(bar.close, bar.timestamp, CloseReason::ExitSignal)?;
                *cash += record.pnl_amount;
                limits.record_pnl(bar.timestamp, record.pnl_amount);
            }
            // Exit signals for the wrong (or no) side, and holds, are no-ops.
            _ => {}
        }
        Ok(())
    }
}

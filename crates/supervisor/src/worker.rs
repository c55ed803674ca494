use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use classifier::{classify, RecoveryAction};
use configuration::Cadence;
use core_types::{Bar, BotStatus, CloseReason, PositionSide, Signal, SignalAction, TradeRecord};
use ledger::PositionTracker;
use risk::{position_size, DailyLimits, GateDecision};
use rust_decimal::Decimal;
use strategies::Strategy;
use tokio::sync::watch;
use venue::{ExecutionVenue, MarketData, OrderSide, PersistenceSink, VenueError};

use crate::state::SharedState;

/// Extra bars fetched beyond the strategy's warm-up so indicators have
/// context past the minimum.
const HISTORY_MARGIN: usize = 50;

/// One deployed bot's runtime: owns the strategy, the position tracker, and
/// the daily limits. Runs as a single tokio task; nothing here is shared
/// except the `SharedState` snapshot fields.
pub(crate) struct BotWorker {
    name: String,
    symbol: String,
    cadence: Cadence,
    strategy: Box<dyn Strategy>,
    tracker: PositionTracker,
    limits: DailyLimits,
    market_data: Arc<dyn MarketData>,
    execution: Arc<dyn ExecutionVenue>,
    sink: Arc<dyn PersistenceSink>,
    shared: Arc<SharedState>,
    fetch_timeout: Duration,
    initial_capital: Decimal,
    /// Divisor applied to every computed size; doubled on `ReduceSize`,
    /// capped at 8.
    sizing_divisor: u32,
    consecutive_failures: u32,
    last_price: Option<Decimal>,
    stop_rx: watch::Receiver<bool>,
}

impl BotWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        symbol: String,
        cadence: Cadence,
        strategy: Box<dyn Strategy>,
        commission_rate: Decimal,
        initial_capital: Decimal,
        fetch_timeout: Duration,
        market_data: Arc<dyn MarketData>,
        execution: Arc<dyn ExecutionVenue>,
        sink: Arc<dyn PersistenceSink>,
        shared: Arc<SharedState>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        let tracker = PositionTracker::new(symbol.clone(), commission_rate);
        let limits = DailyLimits::new(strategy.risk().clone(), Utc::now());
        Self {
            name,
            symbol,
            cadence,
            strategy,
            tracker,
            limits,
            market_data,
            execution,
            sink,
            shared,
            fetch_timeout,
            initial_capital,
            sizing_divisor: 1,
            consecutive_failures: 0,
            last_price: None,
            stop_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::info!(bot = %self.name, symbol = %self.symbol, "worker started");
        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            match self.cycle().await {
                Ok(()) => {
                    self.consecutive_failures = 0;
                }
                Err(error) => {
                    self.consecutive_failures += 1;
                    let decision = classify(&error, self.consecutive_failures);
                    self.sink.record_event(
                        &self.name,
                        "venue_error",
                        &format!("{error} ({})", decision.category),
                    );
                    match decision.action {
                        RecoveryAction::Abort => {
                            tracing::error!(
                                bot = %self.name,
                                %error,
                                category = %decision.category,
                                "unrecoverable venue error, stopping"
                            );
                            self.shared.set_error(error.to_string());
                            self.shared.set_status(BotStatus::StoppedWithError);
                            break;
                        }
                        RecoveryAction::Retry(delay) => {
                            tracing::warn!(
                                bot = %self.name,
                                %error,
                                attempt = self.consecutive_failures,
                                ?delay,
                                "transient venue error, retrying"
                            );
                            if self.sleep_or_stop(delay).await {
                                break;
                            }
                            continue;
                        }
                        RecoveryAction::ReduceSize => {
                            if self.sizing_divisor < 8 {
                                self.sizing_divisor *= 2;
                            }
                            tracing::warn!(
                                bot = %self.name,
                                %error,
                                divisor = self.sizing_divisor,
                                "reducing position sizing"
                            );
                        }
                    }
                }
            }
            if self.sleep_or_stop(self.cadence.period()).await {
                break;
            }
        }
        self.drain().await;
    }

    /// Sleeps for `duration` unless the stop signal fires first; returns
    /// whether the worker should exit.
    async fn sleep_or_stop(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.stop_rx.changed() => true,
        }
    }

    async fn cycle(&mut self) -> Result<(), VenueError> {
        let limit = self.strategy.warmup() + HISTORY_MARGIN;
        let bars = tokio::time::timeout(
            self.fetch_timeout,
            self.market_data.fetch_bars(&self.symbol, self.cadence, limit),
        )
        .await
        .map_err(|_| {
            VenueError::Network(format!(
                "market data fetch exceeded {:?}",
                self.fetch_timeout
            ))
        })??;

        let Some(last) = bars.last().cloned() else {
            return Err(VenueError::Unknown("venue returned an empty history".to_string()));
        };
        self.last_price = Some(last.close);
        self.shared.cycles.fetch_add(1, Ordering::Relaxed);

        if self.shared.is_paused() {
            // Fetching continued above, so indicators pick up seamlessly on
            // resume. Execution is skipped entirely.
            if let Err(error) = self.strategy.calculate_indicators(&bars) {
                tracing::warn!(bot = %self.name, %error, "indicator refresh failed while paused");
            }
            return Ok(());
        }

        if let Some((price, reason)) = self.tracker.protective_trigger(&last) {
            self.close_position(price, last.timestamp, reason).await?;
        }

        let signal = match self.strategy.generate_signal(&bars) {
            Ok(signal) => signal,
            Err(error) => {
                // A strategy failure is a hold, never a crash.
                tracing::error!(bot = %self.name, %error, "strategy error, holding");
                None
            }
        };
        if let Some(signal) = signal {
            self.process_signal(&signal, &bars, &last).await?;
        }
        Ok(())
    }

    async fn process_signal(
        &mut self,
        signal: &Signal,
        bars: &[Bar],
        last: &Bar,
    ) -> Result<(), VenueError> {
        match signal.action {
            SignalAction::Buy | SignalAction::Sell => {
                if self.tracker.side() != PositionSide::Flat {
                    self.shared.signals_ignored.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(bot = %self.name, "entry signal ignored, position open");
                    return Ok(());
                }

                let equity = self.initial_capital + self.tracker.realized_pnl();
                if let GateDecision::Suppressed(reason) = self.limits.check(last.timestamp, equity)
                {
                    self.shared.signals_suppressed.fetch_add(1, Ordering::Relaxed);
                    self.sink.record_event(&self.name, "suppressed", &reason);
                    tracing::info!(bot = %self.name, %reason, "entry suppressed by risk gate");
                    return Ok(());
                }

                let side = if signal.action == SignalAction::Buy {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };
                let levels = match self.strategy.exit_levels(bars, side, last.close) {
                    Ok(levels) => levels,
                    Err(error) => {
                        tracing::error!(bot = %self.name, %error, "exit levels unavailable, holding");
                        return Ok(());
                    }
                };
                let quantity = match position_size(
                    equity,
                    last.close,
                    levels.stop_loss,
                    self.strategy.risk(),
                ) {
                    Ok(size) => size / Decimal::from(self.sizing_divisor),
                    Err(error) => {
                        tracing::error!(bot = %self.name, %error, "position sizing failed, holding");
                        return Ok(());
                    }
                };
                if quantity <= Decimal::ZERO {
                    return Ok(());
                }

                let order_side = match side {
                    PositionSide::Long => OrderSide::Buy,
                    _ => OrderSide::Sell,
                };
                let receipt = self
                    .execution
                    .place_market_order(&self.symbol, order_side, quantity)
                    .await?;

                if let Err(error) = self.tracker.open(
                    side,
                    receipt.fill_price,
                    quantity,
                    Some(levels.stop_loss),
                    Some(levels.take_profit),
                    last.timestamp,
                ) {
                    tracing::error!(bot = %self.name, %error, "ledger rejected the entry");
                    return Ok(());
                }
                self.limits.record_entry(last.timestamp);
                self.shared.signals_executed.fetch_add(1, Ordering::Relaxed);
                self.shared.set_position_side(side);
                self.sink.record_event(
                    &self.name,
                    "entry",
                    &format!("{side} {quantity} @ {}", receipt.fill_price),
                );
            }
            SignalAction::ExitLong if self.tracker.side() == PositionSide::Long => {
                self.close_on_signal(last).await?;
            }
            SignalAction::ExitShort if self.tracker.side() == PositionSide::Short => {
                self.close_on_signal(last).await?;
            }
            // Holds, and exits that do not apply to the current side.
            _ => {}
        }
        Ok(())
    }

    async fn close_on_signal(&mut self, last: &Bar) -> Result<(), VenueError> {
        self.close_position(last.close, last.timestamp, CloseReason::ExitSignal)
            .await?;
        self.shared.signals_executed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Settles a close against the venue. The offsetting order goes out
    /// first and the ledger is only mutated once it fills: a rejected order
    /// leaves the position open, so the next cycle re-attempts the close
    /// instead of orphaning venue-side exposure.
    async fn close_position(
        &mut self,
        exit_price: Decimal,
        timestamp: DateTime<Utc>,
        reason: CloseReason,
    ) -> Result<(), VenueError> {
        let Some(position) = self.tracker.position() else {
            return Ok(());
        };
        let order_side = match position.side {
            PositionSide::Long => OrderSide::Sell,
            _ => OrderSide::Buy,
        };
        let quantity = position.quantity;
        self.execution
            .place_market_order(&self.symbol, order_side, quantity)
            .await?;

        match self.tracker.close(exit_price, timestamp, reason) {
            Ok(record) => self.book_close(&record),
            Err(error) => {
                tracing::error!(bot = %self.name, %error, "ledger rejected the close");
            }
        }
        Ok(())
    }

    /// Books a completed close into the snapshot fields, the daily limits,
    /// and the sink.
    fn book_close(&mut self, record: &TradeRecord) {
        self.shared.set_position_side(PositionSide::Flat);
        self.shared.trades_closed.fetch_add(1, Ordering::Relaxed);
        if record.is_winner() {
            self.shared.winning_trades.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.add_realized_pnl(record.pnl_amount);
        self.limits.record_pnl(record.closed_at, record.pnl_amount);
        self.sink.record_trade(&self.name, record);
    }

    /// Final cleanup when the loop exits: any open position is force-closed
    /// so no bot leaves exposure behind.
    async fn drain(&mut self) {
        if self.tracker.side() != PositionSide::Flat {
            let price = self
                .last_price
                .or_else(|| self.tracker.position().map(|p| p.entry_price))
                .unwrap_or(Decimal::ZERO);
            if let Some(record) =
                self.tracker
                    .force_close(price, Utc::now(), CloseReason::Shutdown)
            {
                self.book_close(&record);

                let order_side = match record.side {
                    PositionSide::Long => OrderSide::Sell,
                    _ => OrderSide::Buy,
                };
                if let Err(error) = self
                    .execution
                    .place_market_order(&self.symbol, order_side, record.quantity)
                    .await
                {
                    tracing::warn!(bot = %self.name, %error, "offsetting order failed during drain");
                }
            }
        }
        self.shared.finish();
        self.sink.record_event(&self.name, "stopped", "worker exited");
        tracing::info!(bot = %self.name, "worker exited");
    }
}

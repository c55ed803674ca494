use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use configuration::{Cadence, Settings};
use core_types::{BotStatus, PositionSide, StrategyKind};
use rust_decimal::Decimal;
use serde::Serialize;
use strategies::create_strategy;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use venue::{ExecutionVenue, MarketData, PersistenceSink};

use crate::error::SupervisorError;
use crate::state::SharedState;
use crate::worker::BotWorker;

/// What the operator submits to deploy a bot.
#[derive(Debug, Clone, Serialize)]
pub struct BotSpec {
    pub name: String,
    /// Trading pair in `BASE/QUOTE` form, e.g. `BTC/USDT`.
    pub symbol: String,
    pub cadence: Cadence,
    pub kind: StrategyKind,
}

/// Point-in-time snapshot of one bot, safe to serialize and display.
#[derive(Debug, Clone, Serialize)]
pub struct BotDescriptor {
    pub name: String,
    pub symbol: String,
    pub cadence: Cadence,
    pub kind: StrategyKind,
    pub status: BotStatus,
    pub position_side: PositionSide,
    pub cycles: u64,
    pub signals_executed: u64,
    pub signals_ignored: u64,
    pub signals_suppressed: u64,
    pub trades_closed: u64,
    pub winning_trades: u64,
    pub realized_pnl: Decimal,
    pub last_error: Option<String>,
    pub deployed_at: DateTime<Utc>,
}

/// Fleet-wide aggregates, recomputed on demand from the snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct FleetMetrics {
    pub total_bots: usize,
    pub running: usize,
    pub paused: usize,
    pub stopped: usize,
    pub stopped_with_error: usize,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub total_realized_pnl: Decimal,
    /// Winning trades over closed trades, `None` before the first close.
    pub win_rate_pct: Option<Decimal>,
}

struct BotEntry {
    spec: BotSpec,
    shared: Arc<SharedState>,
    deployed_at: DateTime<Utc>,
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
    restarts: u32,
}

impl BotEntry {
    fn descriptor(&self) -> BotDescriptor {
        BotDescriptor {
            name: self.spec.name.clone(),
            symbol: self.spec.symbol.clone(),
            cadence: self.spec.cadence,
            kind: self.spec.kind,
            status: self.shared.status(),
            position_side: self.shared.position_side(),
            cycles: self.shared.cycles.load(Ordering::Relaxed),
            signals_executed: self.shared.signals_executed.load(Ordering::Relaxed),
            signals_ignored: self.shared.signals_ignored.load(Ordering::Relaxed),
            signals_suppressed: self.shared.signals_suppressed.load(Ordering::Relaxed),
            trades_closed: self.shared.trades_closed.load(Ordering::Relaxed),
            winning_trades: self.shared.winning_trades.load(Ordering::Relaxed),
            realized_pnl: self.shared.realized_pnl(),
            last_error: self.shared.last_error(),
            deployed_at: self.deployed_at,
        }
    }

    fn task_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

/// The fleet orchestrator. Owns the bot table; every worker task it spawns
/// reports back through its `SharedState`, never through globals.
pub struct BotSupervisor {
    settings: Settings,
    market_data: Arc<dyn MarketData>,
    execution: Arc<dyn ExecutionVenue>,
    sink: Arc<dyn PersistenceSink>,
    fleet: Mutex<HashMap<String, BotEntry>>,
}

impl BotSupervisor {
    pub fn new(
        settings: Settings,
        market_data: Arc<dyn MarketData>,
        execution: Arc<dyn ExecutionVenue>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            settings,
            market_data,
            execution,
            sink,
            fleet: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a bot without starting it. Validation happens before any
    /// fleet mutation: a rejected deploy leaves the table untouched.
    pub async fn deploy(&self, spec: BotSpec) -> Result<(), SupervisorError> {
        validate_symbol(&spec.symbol)?;
        if spec.name.trim().is_empty() {
            return Err(SupervisorError::InvalidConfig(
                "bot name must not be empty".to_string(),
            ));
        }
        // Constructing the strategy up front surfaces bad parameters at
        // deploy time instead of first start.
        create_strategy(spec.kind, &self.settings)
            .map_err(|e| SupervisorError::InvalidConfig(e.to_string()))?;

        let mut fleet = self.fleet.lock().await;
        if fleet.contains_key(&spec.name) {
            return Err(SupervisorError::DuplicateName(spec.name));
        }
        let capacity = self.settings.fleet.max_concurrent_bots;
        if fleet.len() >= capacity {
            return Err(SupervisorError::FleetFull(capacity));
        }

        tracing::info!(bot = %spec.name, symbol = %spec.symbol, kind = %spec.kind, "bot deployed");
        self.sink.record_event(
            &spec.name,
            "deployed",
            &format!("{} {} on {:?}", spec.kind, spec.symbol, spec.cadence),
        );
        let name = spec.name.clone();
        fleet.insert(
            name,
            BotEntry {
                spec,
                shared: Arc::new(SharedState::new()),
                deployed_at: Utc::now(),
                handle: None,
                stop_tx: None,
                restarts: 0,
            },
        );
        Ok(())
    }

    /// Spawns the worker task for a deployed bot.
    pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
        let mut fleet = self.fleet.lock().await;
        let entry = fleet
            .get_mut(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        if !entry.task_finished() {
            return Err(SupervisorError::InvalidState {
                name: name.to_string(),
                status: entry.shared.status(),
                operation: "start",
            });
        }
        self.spawn_worker(entry)?;
        Ok(())
    }

    fn spawn_worker(&self, entry: &mut BotEntry) -> Result<(), SupervisorError> {
        let strategy = create_strategy(entry.spec.kind, &self.settings)?;
        let (stop_tx, stop_rx) = watch::channel(false);

        entry.shared.clear_error();
        entry.shared.set_paused(false);
        entry.shared.set_status(BotStatus::Running);

        let worker = BotWorker::new(
            entry.spec.name.clone(),
            entry.spec.symbol.clone(),
            entry.spec.cadence,
            strategy,
            self.settings.backtest.commission_rate,
            self.settings.backtest.initial_capital,
            self.settings.fleet.fetch_timeout,
            Arc::clone(&self.market_data),
            Arc::clone(&self.execution),
            Arc::clone(&self.sink),
            Arc::clone(&entry.shared),
            stop_rx,
        );
        entry.handle = Some(tokio::spawn(worker.run()));
        entry.stop_tx = Some(stop_tx);
        self.sink
            .record_event(&entry.spec.name, "started", "worker spawned");
        Ok(())
    }

    /// Cooperative stop: the worker finishes its current cycle, force-closes
    /// any open position, and exits. A worker that outlives the grace period
    /// is aborted.
    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let (handle, stop_tx, shared) = {
            let mut fleet = self.fleet.lock().await;
            let entry = fleet
                .get_mut(name)
                .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
            (
                entry.handle.take(),
                entry.stop_tx.take(),
                Arc::clone(&entry.shared),
            )
        };

        let Some(mut handle) = handle else {
            // Already stopped; stopping twice is not an error.
            return Ok(());
        };
        if let Some(stop_tx) = stop_tx {
            let _ = stop_tx.send(true);
        }

        let grace = self.settings.fleet.shutdown_grace;
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            tracing::warn!(bot = %name, ?grace, "worker exceeded the grace period, aborting");
            handle.abort();
            // Wait for the cancellation to land so no task survives `stop`.
            let _ = handle.await;
            shared.finish();
            self.sink
                .record_event(name, "aborted", "worker exceeded shutdown grace");
        }
        Ok(())
    }

    /// Suspends signal execution. The worker keeps fetching bars so its
    /// indicators stay warm for `resume`.
    pub async fn pause(&self, name: &str) -> Result<(), SupervisorError> {
        let fleet = self.fleet.lock().await;
        let entry = fleet
            .get(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        if entry.shared.status() != BotStatus::Running {
            return Err(SupervisorError::InvalidState {
                name: name.to_string(),
                status: entry.shared.status(),
                operation: "pause",
            });
        }
        entry.shared.set_paused(true);
        entry.shared.set_status(BotStatus::Paused);
        self.sink.record_event(name, "paused", "execution suspended");
        tracing::info!(bot = %name, "bot paused");
        Ok(())
    }

    pub async fn resume(&self, name: &str) -> Result<(), SupervisorError> {
        let fleet = self.fleet.lock().await;
        let entry = fleet
            .get(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        if entry.shared.status() != BotStatus::Paused {
            return Err(SupervisorError::InvalidState {
                name: name.to_string(),
                status: entry.shared.status(),
                operation: "resume",
            });
        }
        entry.shared.set_paused(false);
        entry.shared.set_status(BotStatus::Running);
        self.sink.record_event(name, "resumed", "execution resumed");
        tracing::info!(bot = %name, "bot resumed");
        Ok(())
    }

    /// Stops the bot if needed, then forgets it.
    pub async fn remove(&self, name: &str) -> Result<(), SupervisorError> {
        self.stop(name).await?;
        let mut fleet = self.fleet.lock().await;
        fleet
            .remove(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        self.sink.record_event(name, "removed", "bot removed from fleet");
        tracing::info!(bot = %name, "bot removed");
        Ok(())
    }

    pub async fn status(&self, name: &str) -> Result<BotDescriptor, SupervisorError> {
        let fleet = self.fleet.lock().await;
        fleet
            .get(name)
            .map(BotEntry::descriptor)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))
    }

    /// Snapshots of every deployed bot, sorted by name.
    pub async fn status_all(&self) -> Vec<BotDescriptor> {
        let fleet = self.fleet.lock().await;
        let mut all: Vec<BotDescriptor> = fleet.values().map(BotEntry::descriptor).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Fleet-wide aggregates, recomputed from scratch on every call.
    pub async fn fleet_metrics(&self) -> FleetMetrics {
        let snapshots = self.status_all().await;
        let mut metrics = FleetMetrics {
            total_bots: snapshots.len(),
            running: 0,
            paused: 0,
            stopped: 0,
            stopped_with_error: 0,
            total_trades: 0,
            winning_trades: 0,
            total_realized_pnl: Decimal::ZERO,
            win_rate_pct: None,
        };
        for snapshot in &snapshots {
            match snapshot.status {
                BotStatus::Running => metrics.running += 1,
                BotStatus::Paused => metrics.paused += 1,
                BotStatus::Stopped => metrics.stopped += 1,
                BotStatus::StoppedWithError => metrics.stopped_with_error += 1,
            }
            metrics.total_trades += snapshot.trades_closed;
            metrics.winning_trades += snapshot.winning_trades;
            metrics.total_realized_pnl += snapshot.realized_pnl;
        }
        if metrics.total_trades > 0 {
            metrics.win_rate_pct = Some(
                Decimal::from(metrics.winning_trades) * Decimal::ONE_HUNDRED
                    / Decimal::from(metrics.total_trades),
            );
        }
        metrics
    }

    /// One health-check pass: a worker task that finished while its
    /// descriptor still says `Running` gets restarted, at most once per pass.
    /// A failed restart marks the bot `StoppedWithError`.
    pub async fn run_health_check(&self) {
        let mut fleet = self.fleet.lock().await;
        for entry in fleet.values_mut() {
            let silently_dead =
                entry.handle.as_ref().is_some_and(|h| h.is_finished())
                    && matches!(
                        entry.shared.status(),
                        BotStatus::Running | BotStatus::Paused
                    );
            if !silently_dead {
                continue;
            }

            entry.restarts += 1;
            tracing::warn!(
                bot = %entry.spec.name,
                restarts = entry.restarts,
                "worker died silently, restarting"
            );
            self.sink
                .record_event(&entry.spec.name, "restarted", "health check restart");
            if let Err(error) = self.spawn_worker(entry) {
                tracing::error!(bot = %entry.spec.name, %error, "restart failed");
                entry.shared.set_error(error.to_string());
                entry.shared.set_status(BotStatus::StoppedWithError);
            }
        }
    }

    /// Runs health-check passes forever on the configured interval. The
    /// caller owns the returned handle and aborts it on shutdown.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let period = supervisor.settings.fleet.health_check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                supervisor.run_health_check().await;
            }
        })
    }

    /// Stops every worker and returns once the fleet is quiescent.
    pub async fn shutdown(&self) {
        let names: Vec<String> = {
            let fleet = self.fleet.lock().await;
            fleet.keys().cloned().collect()
        };
        for name in names {
            if let Err(error) = self.stop(&name).await {
                tracing::warn!(bot = %name, %error, "stop during shutdown failed");
            }
        }
        tracing::info!("fleet shut down");
    }
}

/// Symbols must be `BASE/QUOTE` with non-empty alphanumeric parts.
fn validate_symbol(symbol: &str) -> Result<(), SupervisorError> {
    let parts: Vec<&str> = symbol.split('/').collect();
    let well_formed = parts.len() == 2
        && parts.iter().all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric())
        });
    if well_formed {
        Ok(())
    } else {
        Err(SupervisorError::InvalidConfig(format!(
            "symbol '{symbol}' is not in BASE/QUOTE form"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_validation_requires_base_quote() {
        assert!(validate_symbol("BTC/USDT").is_ok());
        assert!(validate_symbol("eth/usdt").is_ok());
        assert!(validate_symbol("BTCUSDT").is_err());
        assert!(validate_symbol("BTC/").is_err());
        assert!(validate_symbol("/USDT").is_err());
        assert!(validate_symbol("BTC/USD/T").is_err());
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use core_types::{BotStatus, PositionSide};
use rust_decimal::Decimal;

/// Live state shared between a worker task and the supervisor's snapshots.
///
/// Counters are atomics; the few compound fields sit behind short-lived std
/// mutexes (never held across an await).
pub(crate) struct SharedState {
    status: Mutex<BotStatus>,
    last_error: Mutex<Option<String>>,
    position_side: Mutex<PositionSide>,
    realized_pnl: Mutex<Decimal>,
    paused: AtomicBool,
    pub(crate) cycles: AtomicU64,
    pub(crate) signals_executed: AtomicU64,
    pub(crate) signals_ignored: AtomicU64,
    pub(crate) signals_suppressed: AtomicU64,
    pub(crate) trades_closed: AtomicU64,
    pub(crate) winning_trades: AtomicU64,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            status: Mutex::new(BotStatus::Stopped),
            last_error: Mutex::new(None),
            position_side: Mutex::new(PositionSide::Flat),
            realized_pnl: Mutex::new(Decimal::ZERO),
            paused: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            signals_executed: AtomicU64::new(0),
            signals_ignored: AtomicU64::new(0),
            signals_suppressed: AtomicU64::new(0),
            trades_closed: AtomicU64::new(0),
            winning_trades: AtomicU64::new(0),
        }
    }

    pub(crate) fn status(&self) -> BotStatus {
        self.status
            .lock()
            .map(|g| *g)
            .unwrap_or(BotStatus::StoppedWithError)
    }

    pub(crate) fn set_status(&self, status: BotStatus) {
        if let Ok(mut g) = self.status.lock() {
            *g = status;
        }
    }

    /// Marks the worker stopped unless it already ended in an error state.
    pub(crate) fn finish(&self) {
        if let Ok(mut g) = self.status.lock() {
            if !matches!(*g, BotStatus::StoppedWithError) {
                *g = BotStatus::Stopped;
            }
        }
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error.lock().map(|g| g.clone()).unwrap_or(None)
    }

    pub(crate) fn set_error(&self, error: String) {
        if let Ok(mut g) = self.last_error.lock() {
            *g = Some(error);
        }
    }

    pub(crate) fn clear_error(&self) {
        if let Ok(mut g) = self.last_error.lock() {
            *g = None;
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub(crate) fn position_side(&self) -> PositionSide {
        self.position_side
            .lock()
            .map(|g| *g)
            .unwrap_or(PositionSide::Flat)
    }

    pub(crate) fn set_position_side(&self, side: PositionSide) {
        if let Ok(mut g) = self.position_side.lock() {
            *g = side;
        }
    }

    pub(crate) fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
            .lock()
            .map(|g| *g)
            .unwrap_or(Decimal::ZERO)
    }

    pub(crate) fn add_realized_pnl(&self, pnl: Decimal) {
        if let Ok(mut g) = self.realized_pnl.lock() {
            *g += pnl;
        }
    }
}

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use core_types::TradeRecord;
use serde::Serialize;

/// Where closed trades and lifecycle events end up.
///
/// Recording is synchronous and infallible by contract: a sink that can fail
/// (a database, a message queue) must buffer internally and surface problems
/// through its own channel rather than back into the trading path.
pub trait PersistenceSink: Send + Sync {
    fn record_trade(&self, bot_name: &str, trade: &TradeRecord);
    fn record_event(&self, bot_name: &str, kind: &str, detail: &str);
}

/// A lifecycle event captured by [`MemorySink`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub bot_name: String,
    pub kind: String,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory sink for tests and the demo fleet.
#[derive(Debug, Default)]
pub struct MemorySink {
    trades: Mutex<Vec<(String, TradeRecord)>>,
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> Vec<(String, TradeRecord)> {
        self.trades.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl PersistenceSink for MemorySink {
    fn record_trade(&self, bot_name: &str, trade: &TradeRecord) {
        if let Ok(mut trades) = self.trades.lock() {
            trades.push((bot_name.to_string(), trade.clone()));
        }
    }

    fn record_event(&self, bot_name: &str, kind: &str, detail: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                bot_name: bot_name.to_string(),
                kind: kind.to_string(),
                detail: detail.to_string(),
                recorded_at: Utc::now(),
            });
        }
    }
}

/// Discards everything. Useful when a caller only wants the report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn record_trade(&self, _bot_name: &str, _trade: &TradeRecord) {}
    fn record_event(&self, _bot_name: &str, _kind: &str, _detail: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{CloseReason, PositionSide};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_trade() -> TradeRecord {
        TradeRecord {
            trade_id: Uuid::new_v4(),
            symbol: "BTC/USDT".to_string(),
            side: PositionSide::Long,
            entry_price: dec!(100),
            exit_price: dec!(110),
            quantity: dec!(1),
            pnl_amount: dec!(10),
            pnl_percent: dec!(0.1),
            opened_at: Utc::now(),
            closed_at: Utc::now(),
            reason: CloseReason::ExitSignal,
        }
    }

    #[test]
    fn memory_sink_keeps_trades_and_events() {
        let sink = MemorySink::new();
        sink.record_trade("alpha", &sample_trade());
        sink.record_event("alpha", "started", "deployed by test");

        assert_eq!(sink.trades().len(), 1);
        assert_eq!(sink.trades()[0].0, "alpha");
        assert_eq!(sink.events()[0].kind, "started");
    }
}

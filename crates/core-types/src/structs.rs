use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::enums::{CloseReason, PositionSide, SignalAction};
use crate::error::CoreError;

/// A single OHLCV price bar from the market data feed.
///
/// Bars arrive ascending by timestamp; the consumer does not deduplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// A strategy's proposed action for the current bar, with a confidence score.
///
/// Immutable once constructed. `Signal::new` is the only way to build one, so
/// an out-of-range confidence or non-positive price can never circulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: SignalAction,
    /// How strongly the strategy believes in the action, in `[0, 1]`.
    pub confidence: Decimal,
    pub price: Decimal,
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-form diagnostic values (indicator readings, crossover type, ...).
    pub metadata: BTreeMap<String, String>,
}

impl Signal {
    pub fn new(
        action: SignalAction,
        confidence: Decimal,
        price: Decimal,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, CoreError> {
        if confidence < Decimal::ZERO || confidence > Decimal::ONE {
            return Err(CoreError::InvalidInput(
                "confidence".to_string(),
                format!("must be within [0, 1], got {confidence}"),
            ));
        }
        if price <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "price".to_string(),
                format!("must be positive, got {price}"),
            ));
        }
        Ok(Self {
            action,
            confidence,
            price,
            timestamp,
            metadata: BTreeMap::new(),
        })
    }

    /// A zero-confidence `Hold` at the given price.
    pub fn hold(price: Decimal) -> Result<Self, CoreError> {
        Self::new(SignalAction::Hold, Decimal::ZERO, price, None)
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// The current market exposure of one strategy instance and its economics.
///
/// Plain data: the lifecycle rules (when it may open, mutate, or close) are
/// enforced by the ledger's `PositionTracker`, which owns exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
}

/// An append-only log entry created at position close. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub pnl_amount: Decimal,
    /// Signed fractional return, net of commission on both legs.
    pub pnl_percent: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub reason: CloseReason,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.pnl_amount > Decimal::ZERO
    }
}

/// One snapshot of portfolio value during a backtest. Appended once per
/// processed bar; the ordered sequence forms the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signal_rejects_out_of_range_confidence() {
        let too_high = Signal::new(SignalAction::Buy, dec!(1.5), dec!(100), None);
        assert!(too_high.is_err());

        let negative = Signal::new(SignalAction::Sell, dec!(-0.1), dec!(100), None);
        assert!(negative.is_err());
    }

    #[test]
    fn signal_rejects_non_positive_price() {
        assert!(Signal::new(SignalAction::Buy, dec!(0.5), dec!(0), None).is_err());
        assert!(Signal::new(SignalAction::Buy, dec!(0.5), dec!(-10), None).is_err());
    }

    #[test]
    fn signal_accepts_boundary_confidences() {
        assert!(Signal::new(SignalAction::Hold, dec!(0), dec!(1), None).is_ok());
        assert!(Signal::new(SignalAction::Buy, dec!(1), dec!(1), None).is_ok());
    }

    #[test]
    fn close_reason_display_is_stable() {
        assert_eq!(CloseReason::EndOfBacktest.to_string(), "end_of_backtest");
        assert_eq!(CloseReason::StopLoss.to_string(), "stop_loss");
    }
}

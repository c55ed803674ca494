use chrono::{DateTime, Utc};
use core_types::{Bar, CloseReason, Position, PositionSide, TradeRecord};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::error::LedgerError;

/// Tracks the single open position of one strategy instance and the trade
/// records produced when it closes.
///
/// Exactly one position can be open at a time; every close appends exactly one
/// `TradeRecord` with commission-adjusted P&L.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    symbol: String,
    /// Flat per-side commission rate applied to both legs of a round trip.
    commission_rate: Decimal,
    /// Trade-id namespace, folded from the symbol bytes. Combined with the
    /// monotonic sequence below, identical sessions emit identical ids.
    id_namespace: u64,
    trade_seq: u64,
    position: Option<Position>,
    trades: Vec<TradeRecord>,
}

impl PositionTracker {
    pub fn new(symbol: impl Into<String>, commission_rate: Decimal) -> Self {
        let symbol = symbol.into();
        let id_namespace = symbol
            .bytes()
            .fold(0x6172_6d61_6461u64, |acc, b| {
                acc.wrapping_mul(31).wrapping_add(b as u64)
            });
        Self {
            symbol,
            commission_rate,
            id_namespace,
            trade_seq: 0,
            position: None,
            trades: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> PositionSide {
        self.position
            .as_ref()
            .map(|p| p.side)
            .unwrap_or(PositionSide::Flat)
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// The append-only trade log, oldest first.
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.trades.iter().map(|t| t.pnl_amount).sum()
    }

    /// Mark-to-market value of the open position at `price`; zero when flat.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        match &self.position {
            Some(p) => {
                let sign = Decimal::from(p.side.sign());
                sign * (price - p.entry_price) * p.quantity
            }
            None => Decimal::ZERO,
        }
    }

    /// Opens a position from flat. Rejected with `AlreadyOpen` otherwise —
    /// the caller treats that as an ignored signal, not a failure.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        side: PositionSide,
        entry_price: Decimal,
        quantity: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        opened_at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.position.is_some() {
            return Err(LedgerError::AlreadyOpen);
        }
        if side == PositionSide::Flat {
            return Err(LedgerError::InvalidPosition(
                "cannot open a flat position".to_string(),
            ));
        }
        if entry_price <= Decimal::ZERO || quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidPosition(format!(
                "entry price {entry_price} and quantity {quantity} must be positive"
            )));
        }

        tracing::info!(
            symbol = %self.symbol,
            side = %side,
            price = %entry_price,
            quantity = %quantity,
            "position opened"
        );
        self.position = Some(Position {
            side,
            entry_price,
            quantity,
            stop_loss,
            take_profit,
            opened_at,
        });
        Ok(())
    }

    /// Closes the open position at `exit_price`, emitting the trade record.
    pub fn close(
        &mut self,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
        reason: CloseReason,
    ) -> Result<TradeRecord, LedgerError> {
        let position = self.position.take().ok_or(LedgerError::NotOpen("close"))?;

        let sign = Decimal::from(position.side.sign());
        let gross_pct = sign * (exit_price - position.entry_price) / position.entry_price;
        // Taker fee on both legs of the round trip.
        let net_pct = gross_pct - self.commission_rate * dec!(2);
        let pnl_amount = net_pct * position.entry_price * position.quantity;

        // Sequenced rather than random: replaying the same session must
        // reproduce the trade log byte for byte.
        self.trade_seq += 1;
        let record = TradeRecord {
            trade_id: Uuid::from_u64_pair(self.id_namespace, self.trade_seq),
            symbol: self.symbol.clone(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            pnl_amount,
            pnl_percent: net_pct,
            opened_at: position.opened_at,
            closed_at,
            reason,
        };
        tracing::info!(
            symbol = %self.symbol,
            side = %record.side,
            pnl = %record.pnl_amount,
            reason = %reason,
            "position closed"
        );
        self.trades.push(record.clone());
        Ok(record)
    }

    /// Closes at `price` regardless of levels (shutdown, end of backtest,
    /// risk breach). Returns `None` when already flat.
    pub fn force_close(
        &mut self,
        price: Decimal,
        timestamp: DateTime<Utc>,
        reason: CloseReason,
    ) -> Option<TradeRecord> {
        if self.position.is_none() {
            return None;
        }
        // Close cannot fail here: a position is open.
        self.close(price, timestamp, reason).ok()
    }

    /// Reports the exit price and reason a protective level dictates for
    /// `bar`, without touching the position. The stop is checked first: on a
    /// bar that spans both levels the conservative outcome wins.
    ///
    /// Callers that settle against a venue use this to place the offsetting
    /// order before booking the close.
    pub fn protective_trigger(&self, bar: &Bar) -> Option<(Decimal, CloseReason)> {
        let position = self.position.as_ref()?;

        let (stop_hit, target_hit) = match position.side {
            PositionSide::Long => (
                position.stop_loss.is_some_and(|sl| bar.low <= sl),
                position.take_profit.is_some_and(|tp| bar.high >= tp),
            ),
            PositionSide::Short => (
                position.stop_loss.is_some_and(|sl| bar.high >= sl),
                position.take_profit.is_some_and(|tp| bar.low <= tp),
            ),
            PositionSide::Flat => (false, false),
        };

        if stop_hit {
            return Some((position.stop_loss.unwrap_or(bar.close), CloseReason::StopLoss));
        }
        if target_hit {
            return Some((
                position.take_profit.unwrap_or(bar.close),
                CloseReason::TakeProfit,
            ));
        }
        None
    }

    /// Checks the bar against the position's protective levels and closes at
    /// the level price when one is crossed.
    pub fn check_protective_levels(
        &mut self,
        bar: &Bar,
    ) -> Result<Option<TradeRecord>, LedgerError> {
        match self.protective_trigger(bar) {
            Some((price, reason)) => Ok(Some(self.close(price, bar.timestamp, reason)?)),
            None => Ok(None),
        }
    }

    /// Moves the stop-loss, but only in the protective direction: up for a
    /// long, down for a short. Returns whether the stop moved.
    pub fn update_trailing_stop(&mut self, new_stop: Decimal) -> Result<bool, LedgerError> {
        let position = self
            .position
            .as_mut()
            .ok_or(LedgerError::NotOpen("trail"))?;

        let tightens = match (position.side, position.stop_loss) {
            (PositionSide::Long, Some(current)) => new_stop > current,
            (PositionSide::Short, Some(current)) => new_stop < current,
            (_, None) => true,
            (PositionSide::Flat, _) => false,
        };
        if tightens {
            position.stop_loss = Some(new_stop);
        }
        Ok(tightens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(offset: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap()
    }

    fn bar(low: f64, high: f64, close: f64) -> Bar {
        Bar {
            timestamp: ts(60),
            open: Decimal::try_from(close).unwrap(),
            high: Decimal::try_from(high).unwrap(),
            low: Decimal::try_from(low).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: dec!(1),
        }
    }

    fn open_long(tracker: &mut PositionTracker) {
        tracker
            .open(
                PositionSide::Long,
                dec!(100),
                dec!(2),
                Some(dec!(95)),
                Some(dec!(110)),
                ts(0),
            )
            .unwrap();
    }

    #[test]
    fn reentry_while_open_is_rejected() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        open_long(&mut tracker);
        let second = tracker.open(
            PositionSide::Short,
            dec!(101),
            dec!(1),
            None,
            None,
            ts(60),
        );
        assert!(matches!(second, Err(LedgerError::AlreadyOpen)));
        // The original position is untouched.
        assert_eq!(tracker.side(), PositionSide::Long);
        assert_eq!(tracker.position().unwrap().entry_price, dec!(100));
    }

    #[test]
    fn close_emits_exactly_one_record_and_resets_to_flat() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        open_long(&mut tracker);
        let record = tracker.close(dec!(105), ts(120), CloseReason::ExitSignal).unwrap();

        assert_eq!(tracker.side(), PositionSide::Flat);
        assert_eq!(tracker.trades().len(), 1);
        assert_eq!(record.pnl_percent, dec!(0.05));
        assert_eq!(record.pnl_amount, dec!(10)); // 5% of 100 * qty 2
        assert!(tracker.close(dec!(105), ts(180), CloseReason::ExitSignal).is_err());
    }

    #[test]
    fn commission_is_charged_on_both_legs() {
        let mut tracker = PositionTracker::new("BTC/USDT", dec!(0.001));
        open_long(&mut tracker);
        let record = tracker.close(dec!(105), ts(120), CloseReason::ExitSignal).unwrap();
        assert_eq!(record.pnl_percent, dec!(0.048)); // 5% gross - 2 * 0.1%
    }

    #[test]
    fn short_pnl_is_signed_by_side() {
        let mut tracker = PositionTracker::new("ETH/USDT", Decimal::ZERO);
        tracker
            .open(PositionSide::Short, dec!(200), dec!(1), None, None, ts(0))
            .unwrap();
        let record = tracker.close(dec!(190), ts(60), CloseReason::ExitSignal).unwrap();
        assert_eq!(record.pnl_percent, dec!(0.05));
    }

    #[test]
    fn stop_hit_closes_at_the_stop_price() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        open_long(&mut tracker);
        let record = tracker
            .check_protective_levels(&bar(94.0, 101.0, 96.0))
            .unwrap()
            .expect("stop should trigger");
        assert_eq!(record.exit_price, dec!(95));
        assert_eq!(record.reason, CloseReason::StopLoss);
        assert_eq!(tracker.side(), PositionSide::Flat);
    }

    #[test]
    fn target_hit_closes_at_the_target_price() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        open_long(&mut tracker);
        let record = tracker
            .check_protective_levels(&bar(99.0, 112.0, 111.0))
            .unwrap()
            .expect("target should trigger");
        assert_eq!(record.exit_price, dec!(110));
        assert_eq!(record.reason, CloseReason::TakeProfit);
    }

    #[test]
    fn stop_wins_when_a_bar_spans_both_levels() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        open_long(&mut tracker);
        let record = tracker
            .check_protective_levels(&bar(94.0, 112.0, 100.0))
            .unwrap()
            .unwrap();
        assert_eq!(record.reason, CloseReason::StopLoss);
    }

    #[test]
    fn trailing_stop_only_tightens() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        open_long(&mut tracker);
        assert!(tracker.update_trailing_stop(dec!(97)).unwrap());
        assert!(!tracker.update_trailing_stop(dec!(93)).unwrap());
        assert_eq!(tracker.position().unwrap().stop_loss, Some(dec!(97)));
    }

    #[test]
    fn identical_sessions_emit_identical_trade_ids() {
        let run = || {
            let mut tracker = PositionTracker::new("BTC/USDT", dec!(0.001));
            open_long(&mut tracker);
            tracker.close(dec!(105), ts(60), CloseReason::ExitSignal).unwrap();
            tracker
                .open(PositionSide::Short, dec!(105), dec!(1), None, None, ts(120))
                .unwrap();
            tracker.close(dec!(101), ts(180), CloseReason::ExitSignal).unwrap();
            tracker.trades().to_vec()
        };

        let first = run();
        let second = run();
        assert_eq!(first, second);
        // Consecutive closes within one session still get distinct ids.
        assert_ne!(first[0].trade_id, first[1].trade_id);
    }

    #[test]
    fn force_close_on_flat_is_none() {
        let mut tracker = PositionTracker::new("BTC/USDT", Decimal::ZERO);
        assert!(tracker.force_close(dec!(100), ts(0), CloseReason::Shutdown).is_none());
    }
}

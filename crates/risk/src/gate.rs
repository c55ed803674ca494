use chrono::{DateTime, NaiveDate, Utc};
use configuration::RiskSettings;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::RiskError;

/// Stop-loss-driven, fixed-fractional position sizing.
///
/// `size = min(risk_amount / |entry - stop|, equity * max_position_size / entry)`
/// where `risk_amount = equity * risk_per_trade`.
///
/// A zero stop distance, non-positive equity, or non-positive entry yields a
/// size of zero; the caller must skip the trade.
pub fn position_size(
    equity: Decimal,
    entry_price: Decimal,
    stop_price: Decimal,
    params: &RiskSettings,
) -> Result<Decimal, RiskError> {
    if entry_price <= Decimal::ZERO {
        return Err(RiskError::InvalidEntryPrice(entry_price));
    }
    if equity <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let stop_distance = (entry_price - stop_price).abs();
    if stop_distance.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let risk_amount = equity * params.risk_per_trade;
    let size = risk_amount / stop_distance;
    let max_size = equity * params.max_position_size / entry_price;

    Ok(size.min(max_size).round_dp(8))
}

/// Whether a signal may be acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GateDecision {
    Pass,
    /// The signal is treated as a hold; the reason is logged and surfaced.
    Suppressed(String),
}

impl GateDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateDecision::Pass)
    }
}

/// Per-worker daily trade and loss limits.
///
/// Counters are keyed on the UTC calendar day and reset at UTC midnight: the
/// first check on a new day starts from zero. Owned by a single worker, so no
/// synchronization is needed.
#[derive(Debug, Clone)]
pub struct DailyLimits {
    params: RiskSettings,
    day: NaiveDate,
    trades_today: u32,
    daily_pnl: Decimal,
}

impl DailyLimits {
    pub fn new(params: RiskSettings, now: DateTime<Utc>) -> Self {
        Self {
            params,
            day: now.date_naive(),
            trades_today: 0,
            daily_pnl: Decimal::ZERO,
        }
    }

    pub fn trades_today(&self) -> u32 {
        self.trades_today
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day {
            tracing::debug!(%today, "daily limit counters reset");
            self.day = today;
            self.trades_today = 0;
            self.daily_pnl = Decimal::ZERO;
        }
    }

    /// Evaluates the limits for a prospective entry. Either limit failing
    /// suppresses the signal without raising an error.
    pub fn check(&mut self, now: DateTime<Utc>, equity: Decimal) -> GateDecision {
        self.roll_day(now);

        if self.trades_today >= self.params.max_daily_trades {
            return GateDecision::Suppressed(format!(
                "daily trade limit reached ({}/{})",
                self.trades_today, self.params.max_daily_trades
            ));
        }

        let loss_floor = -(self.params.max_daily_loss * equity);
        if self.daily_pnl <= loss_floor {
            return GateDecision::Suppressed(format!(
                "daily loss limit reached (pnl {}, floor {})",
                self.daily_pnl, loss_floor
            ));
        }

        GateDecision::Pass
    }

    /// Records an executed entry against today's trade count.
    pub fn record_entry(&mut self, now: DateTime<Utc>) {
        self.roll_day(now);
        self.trades_today += 1;
    }

    /// Records realized P&L against today's loss budget.
    pub fn record_pnl(&mut self, now: DateTime<Utc>, pnl: Decimal) {
        self.roll_day(now);
        self.daily_pnl += pnl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn params(max_trades: u32) -> RiskSettings {
        RiskSettings {
            max_daily_trades: max_trades,
            ..Default::default()
        }
    }

    #[test]
    fn sizing_matches_the_reference_example() {
        // entry=100, stop=95, equity=10000, risk_per_trade=0.02
        // -> risk_amount=200, size=200/5=40
        let size = position_size(dec!(10000), dec!(100), dec!(95), &RiskSettings::default()).unwrap();
        assert_eq!(size, dec!(40));
    }

    #[test]
    fn sizing_is_capped_by_max_position_size() {
        let p = RiskSettings {
            max_position_size: dec!(0.1),
            ..Default::default()
        };
        // Uncapped size would be 40; the cap allows 10000*0.1/100 = 10.
        let size = position_size(dec!(10000), dec!(100), dec!(95), &p).unwrap();
        assert_eq!(size, dec!(10));
    }

    #[test]
    fn zero_stop_distance_yields_zero_size() {
        let size = position_size(dec!(10000), dec!(100), dec!(100), &RiskSettings::default()).unwrap();
        assert_eq!(size, Decimal::ZERO);
    }

    #[test]
    fn non_positive_entry_is_an_error() {
        assert!(position_size(dec!(10000), dec!(0), dec!(95), &RiskSettings::default()).is_err());
    }

    #[test]
    fn fourth_trade_of_the_day_is_suppressed() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut limits = DailyLimits::new(params(3), now);

        for _ in 0..3 {
            assert!(limits.check(now, dec!(10000)).is_pass());
            limits.record_entry(now);
        }
        match limits.check(now, dec!(10000)) {
            GateDecision::Suppressed(reason) => assert!(reason.contains("trade limit")),
            GateDecision::Pass => panic!("fourth trade should be suppressed"),
        }
    }

    #[test]
    fn counters_reset_at_utc_midnight() {
        let day1 = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 6, 2, 0, 1, 0).unwrap();
        let mut limits = DailyLimits::new(params(1), day1);

        limits.record_entry(day1);
        assert!(!limits.check(day1, dec!(10000)).is_pass());
        assert!(limits.check(day2, dec!(10000)).is_pass());
        assert_eq!(limits.trades_today(), 0);
    }

    #[test]
    fn daily_loss_floor_suppresses_entries() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut limits = DailyLimits::new(RiskSettings::default(), now);

        // Default max_daily_loss is 5% of equity = 500.
        limits.record_pnl(now, dec!(-600));
        match limits.check(now, dec!(10000)) {
            GateDecision::Suppressed(reason) => assert!(reason.contains("loss limit")),
            GateDecision::Pass => panic!("entry past the loss floor should be suppressed"),
        }
    }
}

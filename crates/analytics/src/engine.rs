use std::time::Duration;

use configuration::Cadence;
use core_types::{EquityPoint, TradeRecord};
use rust_decimal::{Decimal, MathematicalOps};

use crate::error::AnalyticsError;
use crate::report::{PerformanceReport, ProfitFactor};

/// A stateless calculator for deriving performance metrics from trading
/// activity.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// `cadence` is the bar interval of the session and only drives the
    /// annualization factor of the Sharpe ratio. A session with no trades
    /// yields [`PerformanceReport::empty`].
    pub fn calculate(
        &self,
        trades: &[TradeRecord],
        equity_curve: &[EquityPoint],
        initial_capital: Decimal,
        cadence: Cadence,
    ) -> Result<PerformanceReport, AnalyticsError> {
        let mut report = PerformanceReport::empty();

        if trades.is_empty() {
            return Ok(report);
        }

        self.calculate_profitability(trades, initial_capital, &mut report);
        self.calculate_drawdown(equity_curve, &mut report);
        self.calculate_holding_period(trades, &mut report);
        self.calculate_ratios(equity_curve, cadence, &mut report)?;

        tracing::debug!(
            trades = report.total_trades,
            net_profit = %report.total_net_profit,
            "performance report computed"
        );
        Ok(report)
    }

    fn calculate_profitability(
        &self,
        trades: &[TradeRecord],
        initial_capital: Decimal,
        report: &mut PerformanceReport,
    ) {
        report.total_trades = trades.len();

        for trade in trades {
            report.total_net_profit += trade.pnl_amount;
            if trade.is_winner() {
                report.gross_profit += trade.pnl_amount;
                report.winning_trades += 1;
            } else {
                report.gross_loss += trade.pnl_amount.abs();
                report.losing_trades += 1;
            }
        }

        report.profit_factor = ProfitFactor::from_gross(report.gross_profit, report.gross_loss);
        report.win_rate_pct = Decimal::from(report.winning_trades) * Decimal::ONE_HUNDRED
            / Decimal::from(report.total_trades);

        if report.winning_trades > 0 {
            report.average_win = report.gross_profit / Decimal::from(report.winning_trades);
        }
        if report.losing_trades > 0 {
            report.average_loss = report.gross_loss / Decimal::from(report.losing_trades);
            if report.average_loss > Decimal::ZERO {
                report.payoff_ratio = Some(report.average_win / report.average_loss);
            }
        }

        if initial_capital > Decimal::ZERO {
            report.total_return_pct =
                report.total_net_profit * Decimal::ONE_HUNDRED / initial_capital;
        }
    }

    /// Maximum peak-to-trough decline, as a percentage of the peak.
    fn calculate_drawdown(&self, equity_curve: &[EquityPoint], report: &mut PerformanceReport) {
        let Some(first) = equity_curve.first() else {
            return;
        };

        let mut peak = first.equity;
        let mut max_drawdown_pct = Decimal::ZERO;

        for point in equity_curve {
            if point.equity > peak {
                peak = point.equity;
            }
            if peak > Decimal::ZERO {
                let drawdown_pct = (peak - point.equity) * Decimal::ONE_HUNDRED / peak;
                if drawdown_pct > max_drawdown_pct {
                    max_drawdown_pct = drawdown_pct;
                }
            }
        }

        report.max_drawdown_pct = max_drawdown_pct;
    }

    fn calculate_ratios(
        &self,
        equity_curve: &[EquityPoint],
        cadence: Cadence,
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        if report.max_drawdown_pct > Decimal::ZERO {
            report.calmar_ratio = Some(report.total_return_pct / report.max_drawdown_pct);
        }

        // Per-bar returns. Two points make one return; fewer mean no Sharpe.
        let returns: Vec<Decimal> = equity_curve
            .windows(2)
            .filter(|w| w[0].equity > Decimal::ZERO)
            .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
            .collect();

        if returns.len() < 2 {
            return Ok(());
        }

        let count = Decimal::from(returns.len());
        let mean: Decimal = returns.iter().sum::<Decimal>() / count;
        let variance: Decimal = returns
            .iter()
            .map(|r| (*r - mean) * (*r - mean))
            .sum::<Decimal>()
            / count;

        if variance <= Decimal::ZERO {
            return Ok(());
        }

        let std_dev = variance.sqrt().ok_or_else(|| {
            AnalyticsError::Calculation("square root of return variance".to_string())
        })?;
        let annualization = Decimal::from(cadence.bars_per_year()).sqrt().ok_or_else(|| {
            AnalyticsError::Calculation("square root of annualization factor".to_string())
        })?;

        if std_dev > Decimal::ZERO {
            report.sharpe_ratio = Some(mean / std_dev * annualization);
        }

        Ok(())
    }

    fn calculate_holding_period(&self, trades: &[TradeRecord], report: &mut PerformanceReport) {
        let total_secs: i64 = trades
            .iter()
            .map(|t| (t.closed_at - t.opened_at).num_seconds().max(0))
            .sum();
        let avg_secs = total_secs / trades.len() as i64;
        report.average_holding_period = Duration::from_secs(avg_secs as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{CloseReason, PositionSide};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade(pnl: Decimal, holding_secs: i64) -> TradeRecord {
        let opened_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        TradeRecord {
            trade_id: Uuid::new_v4(),
            symbol: "BTC/USDT".to_string(),
            side: PositionSide::Long,
            entry_price: dec!(100),
            exit_price: dec!(100) + pnl,
            quantity: dec!(1),
            pnl_amount: pnl,
            pnl_percent: pnl / dec!(100),
            opened_at,
            closed_at: opened_at + chrono::Duration::seconds(holding_secs),
            reason: CloseReason::ExitSignal,
        }
    }

    fn curve(values: &[Decimal]) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, equity)| EquityPoint {
                timestamp: start + chrono::Duration::hours(i as i64),
                equity: *equity,
                price: dec!(100),
            })
            .collect()
    }

    #[test]
    fn no_trades_yields_the_empty_report() {
        let report = AnalyticsEngine::new()
            .calculate(&[], &curve(&[dec!(10000)]), dec!(10000), Cadence::H1)
            .unwrap();
        assert_eq!(report, PerformanceReport::empty());
    }

    #[test]
    fn all_winners_yields_an_infinite_profit_factor() {
        let trades = vec![trade(dec!(50), 3600), trade(dec!(30), 3600)];
        let report = AnalyticsEngine::new()
            .calculate(&trades, &curve(&[dec!(10000), dec!(10080)]), dec!(10000), Cadence::H1)
            .unwrap();

        assert_eq!(report.profit_factor, ProfitFactor::Infinite);
        assert_eq!(report.win_rate_pct, dec!(100));
        assert_eq!(report.total_net_profit, dec!(80));
    }

    #[test]
    fn mixed_trades_yield_a_finite_profit_factor() {
        let trades = vec![trade(dec!(60), 3600), trade(dec!(-20), 7200)];
        let report = AnalyticsEngine::new()
            .calculate(&trades, &curve(&[dec!(10000), dec!(10040)]), dec!(10000), Cadence::H1)
            .unwrap();

        assert_eq!(report.profit_factor, ProfitFactor::Ratio(dec!(3)));
        assert_eq!(report.winning_trades, 1);
        assert_eq!(report.losing_trades, 1);
        assert_eq!(report.average_win, dec!(60));
        assert_eq!(report.average_loss, dec!(20));
        assert_eq!(report.payoff_ratio, Some(dec!(3)));
        assert_eq!(report.average_holding_period, Duration::from_secs(5400));
    }

    #[test]
    fn drawdown_tracks_the_running_peak() {
        let trades = vec![trade(dec!(-100), 3600)];
        // Peak 12000, trough 9000: drawdown 25%.
        let points = curve(&[dec!(10000), dec!(12000), dec!(9000), dec!(11000)]);
        let report = AnalyticsEngine::new()
            .calculate(&trades, &points, dec!(10000), Cadence::H1)
            .unwrap();

        assert_eq!(report.max_drawdown_pct, dec!(25));
        assert!(report.calmar_ratio.is_some());
    }

    #[test]
    fn flat_equity_curve_has_no_sharpe() {
        let trades = vec![trade(dec!(0), 3600)];
        let points = curve(&[dec!(10000), dec!(10000), dec!(10000)]);
        let report = AnalyticsEngine::new()
            .calculate(&trades, &points, dec!(10000), Cadence::H1)
            .unwrap();
        assert!(report.sharpe_ratio.is_none());
    }
}

use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Gross profit divided by gross loss, with an explicit sentinel for the
/// all-winners case instead of an unbounded number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitFactor {
    Ratio(Decimal),
    /// Winning trades exist and there are no losers.
    Infinite,
}

impl ProfitFactor {
    pub(crate) fn from_gross(gross_profit: Decimal, gross_loss: Decimal) -> Self {
        if gross_loss > Decimal::ZERO {
            ProfitFactor::Ratio(gross_profit / gross_loss)
        } else if gross_profit > Decimal::ZERO {
            ProfitFactor::Infinite
        } else {
            ProfitFactor::Ratio(Decimal::ZERO)
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Ratio(ratio) => write!(f, "{}", ratio.round_dp(2)),
            ProfitFactor::Infinite => write!(f, "inf"),
        }
    }
}

/// A comprehensive, standardized report of a strategy's performance.
///
/// The final output of the `AnalyticsEngine`; the same shape is rendered by
/// the backtest CLI and recorded for each bot in the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // I. Core Profitability Metrics
    pub total_net_profit: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: ProfitFactor,
    pub total_return_pct: Decimal,

    // II. Risk and Drawdown
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: Option<Decimal>, // None when the return series has no spread
    pub calmar_ratio: Option<Decimal>, // None when there was no drawdown

    // III. Trade-Level Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub payoff_ratio: Option<Decimal>, // None when average_loss is zero

    // IV. Time-Based Metrics
    #[serde(with = "humantime_serde")]
    pub average_holding_period: Duration,
}

impl PerformanceReport {
    /// A zeroed-out report, the result for a session with no trades.
    pub fn empty() -> Self {
        Self {
            total_net_profit: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: ProfitFactor::Ratio(Decimal::ZERO),
            total_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: None,
            calmar_ratio: None,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::ZERO,
            average_win: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            payoff_ratio: None,
            average_holding_period: Duration::ZERO,
        }
    }
}

impl Default for PerformanceReport {
    fn default() -> Self {
        Self::empty()
    }
}

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fleet: FleetSettings,
    pub backtest: BacktestSettings,
    pub risk: RiskSettings,
    pub strategies: StrategyParams,
}

/// Parameters governing the supervisor and its workers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FleetSettings {
    /// Hard capacity of the fleet; `deploy` past this is rejected.
    pub max_concurrent_bots: usize,
    /// How often the supervisor's health check sweeps the fleet.
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
    /// Upper bound on a single market-data fetch so a slow feed cannot stall
    /// liveness detection.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// How long `shutdown` waits for each worker before abandoning it.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            max_concurrent_bots: 5,
            health_check_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Parameters for the backtesting simulator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    /// The starting capital for the simulation.
    pub initial_capital: Decimal,
    /// Flat per-side commission rate. 0.001 corresponds to 0.1%.
    pub commission_rate: Decimal,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            commission_rate: dec!(0.001),
        }
    }
}

/// Trade-level risk limits shared by the live workers and the backtester.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskSettings {
    /// Fraction of equity risked on a single trade (0.02 = 2%).
    pub risk_per_trade: Decimal,
    /// Cap on position notional as a fraction of equity.
    pub max_position_size: Decimal,
    /// Maximum number of entries per UTC day.
    pub max_daily_trades: u32,
    /// Maximum realized loss per UTC day as a fraction of equity (0.05 = 5%).
    pub max_daily_loss: Decimal,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(0.02),
            max_position_size: dec!(1.0),
            max_daily_trades: 10,
            max_daily_loss: dec!(0.05),
        }
    }
}

/// The parameter sets for all available strategies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub ma_crossover: MaCrossoverParams,
    pub bollinger_rsi: BollingerRsiParams,
    pub momentum: MomentumParams,
    pub ml_momentum: MlMomentumParams,
}

/// Parameters for the Moving Average Crossover strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Use exponential instead of simple moving averages.
    pub exponential: bool,
    /// Stop-loss distance from entry as a fraction of price.
    pub stop_loss_pct: Decimal,
    /// Take-profit distance from entry as a fraction of price.
    pub take_profit_pct: Decimal,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            exponential: false,
            stop_loss_pct: dec!(0.03),
            take_profit_pct: dec!(0.06),
        }
    }
}

/// Parameters for the Bollinger Bands + RSI mean-reversion strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BollingerRsiParams {
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// RSI levels at which an open position is considered normalized.
    pub exit_rsi_low: f64,
    pub exit_rsi_high: f64,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

impl Default for BollingerRsiParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_std_dev: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            exit_rsi_low: 40.0,
            exit_rsi_high: 60.0,
            stop_loss_pct: dec!(0.02),
            take_profit_pct: dec!(0.04),
        }
    }
}

/// Parameters for the swing breakout Momentum strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    /// Breakout window; also the strategy's warm-up in bars.
    pub lookback: usize,
    pub atr_period: usize,
    /// Stop-loss distance as a multiple of ATR.
    pub atr_stop_multiplier: f64,
    /// Take-profit distance as a multiple of ATR.
    pub atr_profit_multiplier: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            lookback: 50,
            atr_period: 14,
            atr_stop_multiplier: 1.5,
            atr_profit_multiplier: 3.0,
        }
    }
}

/// Parameters for the ML momentum strategy. The model itself is a black box
/// behind the `Predictor` trait; only the feature window and the seed for the
/// default predictor live here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MlMomentumParams {
    pub feature_window: usize,
    pub rsi_period: usize,
    /// Minimum predictor confidence before a signal is emitted.
    pub confidence_floor: f64,
    /// Seed for the default predictor, so backtests replay identically.
    pub seed: u64,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
}

impl Default for MlMomentumParams {
    fn default() -> Self {
        Self {
            feature_window: 30,
            rsi_period: 14,
            confidence_floor: 0.55,
            seed: 42,
            stop_loss_pct: dec!(0.03),
            take_profit_pct: dec!(0.05),
        }
    }
}

/// The time between worker cycles, mirroring exchange kline intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Cadence {
    /// The sleep between two cycles of a worker on this cadence.
    pub fn period(&self) -> Duration {
        let secs = match self {
            Cadence::M1 => 60,
            Cadence::M5 => 300,
            Cadence::M15 => 900,
            Cadence::M30 => 1_800,
            Cadence::H1 => 3_600,
            Cadence::H4 => 14_400,
            Cadence::D1 => 86_400,
        };
        Duration::from_secs(secs)
    }

    /// Number of bars in a (365-day) year, used to annualize the Sharpe ratio.
    pub fn bars_per_year(&self) -> u32 {
        match self {
            Cadence::M1 => 525_600,
            Cadence::M5 => 105_120,
            Cadence::M15 => 35_040,
            Cadence::M30 => 17_520,
            Cadence::H1 => 8_760,
            Cadence::H4 => 2_190,
            Cadence::D1 => 365,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cadence::M1 => "1m",
            Cadence::M5 => "5m",
            Cadence::M15 => "15m",
            Cadence::M30 => "30m",
            Cadence::H1 => "1h",
            Cadence::H4 => "4h",
            Cadence::D1 => "1d",
        };
        f.write_str(s)
    }
}

impl FromStr for Cadence {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Cadence::M1),
            "5m" => Ok(Cadence::M5),
            "15m" => Ok(Cadence::M15),
            "30m" => Ok(Cadence::M30),
            "1h" => Ok(Cadence::H1),
            "4h" => Ok(Cadence::H4),
            "1d" => Ok(Cadence::D1),
            other => Err(ConfigError::Invalid(format!(
                "unknown cadence '{other}', expected one of 1m/5m/15m/30m/1h/4h/1d"
            ))),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The action a strategy proposes for the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
    ExitLong,
    ExitShort,
}

impl SignalAction {
    /// Whether this action would open a new position from flat.
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalAction::Buy | SignalAction::Sell)
    }

    /// Whether this action requests closing an open position.
    pub fn is_exit(&self) -> bool {
        matches!(self, SignalAction::ExitLong | SignalAction::ExitShort)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Hold => "hold",
            SignalAction::ExitLong => "exit_long",
            SignalAction::ExitShort => "exit_short",
        };
        f.write_str(s)
    }
}

/// The market exposure of a strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionSide {
    /// The sign applied to price moves when computing P&L: +1 long, -1 short, 0 flat.
    pub fn sign(&self) -> i8 {
        match self {
            PositionSide::Flat => 0,
            PositionSide::Long => 1,
            PositionSide::Short => -1,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionSide::Flat => "flat",
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        };
        f.write_str(s)
    }
}

/// Why a position was closed. Propagated verbatim into the `TradeRecord` so
/// that no close happens without a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ExitSignal,
    StopLoss,
    TakeProfit,
    EndOfBacktest,
    Shutdown,
    RiskBreach,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::ExitSignal => "exit_signal",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::EndOfBacktest => "end_of_backtest",
            CloseReason::Shutdown => "shutdown",
            CloseReason::RiskBreach => "risk_breach",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a deployed bot, as tracked by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Running,
    Paused,
    Stopped,
    StoppedWithError,
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BotStatus::Running => "running",
            BotStatus::Paused => "paused",
            BotStatus::Stopped => "stopped",
            BotStatus::StoppedWithError => "stopped_with_error",
        };
        f.write_str(s)
    }
}

/// Identifies which strategy implementation to construct. A closed set: the
/// factory match is exhaustive, so adding a variant without wiring it is a
/// compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MaCrossover,
    BollingerRsi,
    Momentum,
    MlMomentum,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::MaCrossover => "ma_crossover",
            StrategyKind::BollingerRsi => "bollinger_rsi",
            StrategyKind::Momentum => "momentum",
            StrategyKind::MlMomentum => "ml_momentum",
        };
        f.write_str(s)
    }
}

impl FromStr for StrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ma_crossover" => Ok(StrategyKind::MaCrossover),
            "bollinger_rsi" => Ok(StrategyKind::BollingerRsi),
            "momentum" => Ok(StrategyKind::Momentum),
            "ml_momentum" => Ok(StrategyKind::MlMomentum),
            other => Err(CoreError::InvalidInput(
                "strategy kind".to_string(),
                other.to_string(),
            )),
        }
    }
}

//! # Armada Strategy Library
//!
//! This crate contains the signal-generation logic for the Armada system. It
//! defines a universal `Strategy` trait and provides several concrete
//! implementations.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of
//!   venues, supervisors, or persistence. It depends only on `core-types` and
//!   `configuration`.
//! - **Strategy Agnostic Runners:** Through the `Strategy` trait, the
//!   backtester and the live workers operate on any strategy without knowing
//!   its internals.
//! - **Determinism:** `calculate_indicators` is a pure function of the given
//!   history, and any randomness (the default ML predictor) is seeded per run,
//!   so a backtest replays byte-identically.
//!
//! Adding a strategy means: a new module, a `StrategyKind` variant, and a
//! factory arm — the exhaustive match keeps the set closed.

pub mod bollinger_rsi;
pub mod error;
pub mod factory;
pub mod indicators;
pub mod ma_crossover;
pub mod ml_momentum;
pub mod momentum;

// Re-export the key components to create a clean, public-facing API.
pub use bollinger_rsi::BollingerRsi;
pub use error::StrategyError;
pub use factory::create_strategy;
pub use indicators::IndicatorFrame;
pub use ma_crossover::MaCrossover;
pub use ml_momentum::{Label, MlMomentum, Prediction, Predictor, SeededPredictor};
pub use momentum::Momentum;

// Re-export StrategyKind from core_types.
pub use core_types::enums::StrategyKind;

use configuration::RiskSettings;
use core_types::{Bar, PositionSide, Signal};
use rust_decimal::Decimal;

/// Protective levels a strategy attaches to a freshly opened position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
}

/// The core trait every trading strategy implements.
///
/// `generate_signal` takes `&mut self` because strategies may keep internal
/// state between evaluations (previous indicator readings, a predictor's RNG).
/// The `Send` bound lets a strategy move into its worker task.
pub trait Strategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Minimum number of bars before the strategy can produce a signal.
    /// Shorter histories are a rejected input for the backtester.
    fn warmup(&self) -> usize;

    /// Derives the strategy's indicator columns from the given history.
    ///
    /// Pure: same history in, same frame out, no side effects on `self`.
    fn calculate_indicators(&self, history: &[Bar]) -> Result<IndicatorFrame, StrategyError>;

    /// Evaluates the history up to and including the latest bar.
    ///
    /// Returns `Ok(None)` when there is nothing actionable (hold), which is
    /// the common case.
    fn generate_signal(&mut self, history: &[Bar]) -> Result<Option<Signal>, StrategyError>;

    /// Stop-loss / take-profit levels for a new position entered at `entry`.
    fn exit_levels(
        &self,
        history: &[Bar],
        side: PositionSide,
        entry: Decimal,
    ) -> Result<ExitLevels, StrategyError>;

    /// The risk configuration this strategy trades under.
    fn risk(&self) -> &RiskSettings;
}

/// Fixed-percentage protective levels, the default for non-volatility-aware
/// strategies.
pub(crate) fn fixed_exit_levels(
    side: PositionSide,
    entry: Decimal,
    stop_pct: Decimal,
    profit_pct: Decimal,
) -> Result<ExitLevels, StrategyError> {
    let levels = match side {
        PositionSide::Long => ExitLevels {
            stop_loss: entry * (Decimal::ONE - stop_pct),
            take_profit: entry * (Decimal::ONE + profit_pct),
        },
        PositionSide::Short => ExitLevels {
            stop_loss: entry * (Decimal::ONE + stop_pct),
            take_profit: entry * (Decimal::ONE - profit_pct),
        },
        PositionSide::Flat => {
            return Err(StrategyError::InvalidParameters(
                "exit levels requested for a flat position".to_string(),
            ));
        }
    };
    Ok(levels)
}

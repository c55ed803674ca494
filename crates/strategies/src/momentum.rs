use configuration::{MomentumParams, RiskSettings};
use core_types::{Bar, PositionSide, Signal, SignalAction};
use rust_decimal::prelude::*;
use ta::indicators::AverageTrueRange as Atr;
use ta::{DataItem, Next};

use crate::error::StrategyError;
use crate::indicators::IndicatorFrame;
use crate::{ExitLevels, Strategy, StrategyKind};

/// Swing breakout momentum strategy.
///
/// Goes long when the close breaks above the highest high of the lookback
/// window, short when it breaks below the lowest low. Protective levels are
/// volatility-derived: an ATR multiple on each side of the entry.
pub struct Momentum {
    params: MomentumParams,
    risk: RiskSettings,
}

impl Momentum {
    pub fn new(params: MomentumParams, risk: RiskSettings) -> Result<Self, StrategyError> {
        if params.lookback < 2 {
            return Err(StrategyError::InvalidParameters(
                "lookback must be at least 2".to_string(),
            ));
        }
        if params.atr_period == 0 {
            return Err(StrategyError::InvalidParameters(
                "atr_period must be non-zero".to_string(),
            ));
        }
        if params.atr_stop_multiplier <= 0.0 || params.atr_profit_multiplier <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "ATR multipliers must be positive".to_string(),
            ));
        }
        Ok(Self { params, risk })
    }

    fn atr_series(&self, history: &[Bar]) -> Result<Vec<f64>, StrategyError> {
        let mut atr = Atr::new(self.params.atr_period)
            .map_err(|e| StrategyError::InvalidParameters(format!("atr period: {e}")))?;
        let mut out = Vec::with_capacity(history.len());
        for bar in history {
            let item = DataItem::builder()
                .open(bar.open.to_f64().unwrap_or(f64::NAN))
                .high(bar.high.to_f64().unwrap_or(f64::NAN))
                .low(bar.low.to_f64().unwrap_or(f64::NAN))
                .close(bar.close.to_f64().unwrap_or(f64::NAN))
                .volume(bar.volume.to_f64().unwrap_or(0.0))
                .build()
                .map_err(|e| StrategyError::Indicator(format!("bad bar for ATR: {e}")))?;
            out.push(atr.next(&item));
        }
        Ok(out)
    }
}

impl Strategy for Momentum {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn warmup(&self) -> usize {
        // A full breakout window before the bar under evaluation.
        self.params.lookback.max(self.params.atr_period) + 1
    }

    fn calculate_indicators(&self, history: &[Bar]) -> Result<IndicatorFrame, StrategyError> {
        let lookback = self.params.lookback;
        let mut highest = Vec::with_capacity(history.len());
        let mut lowest = Vec::with_capacity(history.len());

        // Rolling extremes over the window *preceding* each bar, so a breakout
        // compares the current close against levels it did not itself set.
        for i in 0..history.len() {
            if i < lookback {
                highest.push(f64::NAN);
                lowest.push(f64::NAN);
                continue;
            }
            let window = &history[i - lookback..i];
            let hi = window
                .iter()
                .map(|b| b.high.to_f64().unwrap_or(f64::NAN))
                .fold(f64::MIN, f64::max);
            let lo = window
                .iter()
                .map(|b| b.low.to_f64().unwrap_or(f64::NAN))
                .fold(f64::MAX, f64::min);
            highest.push(hi);
            lowest.push(lo);
        }

        let mut frame = IndicatorFrame::new(history.len());
        frame.insert("highest_high", highest)?;
        frame.insert("lowest_low", lowest)?;
        frame.insert("atr", self.atr_series(history)?)?;
        Ok(frame)
    }

    fn generate_signal(&mut self, history: &[Bar]) -> Result<Option<Signal>, StrategyError> {
        if history.len() < self.warmup() {
            return Ok(None);
        }
        let frame = self.calculate_indicators(history)?;

        let (Some(highest), Some(lowest), Some(atr)) = (
            frame.latest("highest_high"),
            frame.latest("lowest_low"),
            frame.latest("atr"),
        ) else {
            return Ok(None);
        };

        let latest = &history[history.len() - 1];
        let close = latest.close.to_f64().unwrap_or(f64::NAN);

        let (action, margin) = if close > highest {
            (SignalAction::Buy, close - highest)
        } else if close < lowest {
            (SignalAction::Sell, lowest - close)
        } else {
            return Ok(None);
        };

        // Breakout strength relative to current volatility, capped at 1.
        let strength = if atr > f64::EPSILON {
            (margin / atr).min(1.0)
        } else {
            0.0
        };

        tracing::debug!(action = %action, close, highest, lowest, "momentum: breakout");
        let signal = Signal::new(
            action,
            Decimal::from_f64(strength).unwrap_or(Decimal::ZERO),
            latest.close,
            Some(latest.timestamp),
        )?
        .with_metadata("breakout_margin", margin)
        .with_metadata("atr", atr);
        Ok(Some(signal))
    }

    fn exit_levels(
        &self,
        history: &[Bar],
        side: PositionSide,
        entry: Decimal,
    ) -> Result<ExitLevels, StrategyError> {
        let atr = self
            .atr_series(history)?
            .last()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| StrategyError::Indicator("ATR unavailable for exit levels".to_string()))?;
        let atr = Decimal::from_f64(atr)
            .ok_or_else(|| StrategyError::Indicator("ATR not representable".to_string()))?;

        let stop_offset = atr
            * Decimal::from_f64(self.params.atr_stop_multiplier)
                .ok_or_else(|| StrategyError::Indicator("bad stop multiplier".to_string()))?;
        let profit_offset = atr
            * Decimal::from_f64(self.params.atr_profit_multiplier)
                .ok_or_else(|| StrategyError::Indicator("bad profit multiplier".to_string()))?;

        let levels = match side {
            PositionSide::Long => ExitLevels {
                stop_loss: entry - stop_offset,
                take_profit: entry + profit_offset,
            },
            PositionSide::Short => ExitLevels {
                stop_loss: entry + stop_offset,
                take_profit: entry - profit_offset,
            },
            PositionSide::Flat => {
                return Err(StrategyError::InvalidParameters(
                    "exit levels requested for a flat position".to_string(),
                ));
            }
        };
        Ok(levels)
    }

    fn risk(&self) -> &RiskSettings {
        &self.risk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(i: usize, close: f64) -> Bar {
        let c = Decimal::from_f64(close).unwrap();
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
            open: c,
            high: c * dec!(1.002),
            low: c * dec!(0.998),
            close: c,
            volume: dec!(50),
        }
    }

    fn strategy() -> Momentum {
        Momentum::new(
            MomentumParams {
                lookback: 10,
                atr_period: 5,
                ..Default::default()
            },
            RiskSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn breakout_above_window_high_emits_buy() {
        let mut bars: Vec<Bar> = (0..15).map(|i| bar(i, 100.0)).collect();
        bars.push(bar(15, 104.0));

        let mut s = strategy();
        let signal = s.generate_signal(&bars).unwrap().expect("breakout signal");
        assert_eq!(signal.action, SignalAction::Buy);
    }

    #[test]
    fn breakdown_below_window_low_emits_sell() {
        let mut bars: Vec<Bar> = (0..15).map(|i| bar(i, 100.0)).collect();
        bars.push(bar(15, 96.0));

        let mut s = strategy();
        let signal = s.generate_signal(&bars).unwrap().expect("breakdown signal");
        assert_eq!(signal.action, SignalAction::Sell);
    }

    #[test]
    fn long_exit_levels_straddle_the_entry() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(i, 100.0)).collect();
        let s = strategy();
        let levels = s
            .exit_levels(&bars, PositionSide::Long, dec!(100))
            .unwrap();
        assert!(levels.stop_loss < dec!(100));
        assert!(levels.take_profit > dec!(100));
    }
}

use configuration::{MaCrossoverParams, RiskSettings};
use core_types::{Bar, PositionSide, Signal, SignalAction};
use rust_decimal::prelude::*;
use ta::indicators::{ExponentialMovingAverage as Ema, SimpleMovingAverage as Sma};
use ta::Next;

use crate::error::StrategyError;
use crate::indicators::IndicatorFrame;
use crate::{fixed_exit_levels, ExitLevels, Strategy, StrategyKind};

/// Moving Average Crossover strategy.
///
/// Buy when the fast MA crosses above the slow MA (golden cross), sell when it
/// crosses below (death cross). Confidence is the relative gap between the
/// averages, capped at 1.
pub struct MaCrossover {
    params: MaCrossoverParams,
    risk: RiskSettings,
}

impl MaCrossover {
    pub fn new(params: MaCrossoverParams, risk: RiskSettings) -> Result<Self, StrategyError> {
        if params.fast_period == 0 || params.slow_period == 0 {
            return Err(StrategyError::InvalidParameters(
                "MA periods must be non-zero".to_string(),
            ));
        }
        if params.fast_period >= params.slow_period {
            return Err(StrategyError::InvalidParameters(
                "fast period must be less than slow period".to_string(),
            ));
        }
        Ok(Self { params, risk })
    }

    fn ma_series(&self, closes: &[f64], period: usize) -> Result<Vec<f64>, StrategyError> {
        let mut series = if self.params.exponential {
            let ema = Ema::new(period)
                .map_err(|e| StrategyError::InvalidParameters(format!("ema period: {e}")))?;
            run_ma(ema, closes)
        } else {
            let sma = Sma::new(period)
                .map_err(|e| StrategyError::InvalidParameters(format!("sma period: {e}")))?;
            run_ma(sma, closes)
        };
        // The indicator emits partial averages during warm-up; blank them so
        // cross detection cannot fire on incomplete windows.
        for v in series.iter_mut().take(period.saturating_sub(1)) {
            *v = f64::NAN;
        }
        Ok(series)
    }
}

fn run_ma<I>(mut indicator: I, closes: &[f64]) -> Vec<f64>
where
    I: Next<f64, Output = f64>,
{
    closes.iter().map(|&c| indicator.next(c)).collect()
}

impl Strategy for MaCrossover {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MaCrossover
    }

    fn warmup(&self) -> usize {
        // One full slow window plus the previous bar needed for cross detection.
        self.params.slow_period + 2
    }

    fn calculate_indicators(&self, history: &[Bar]) -> Result<IndicatorFrame, StrategyError> {
        let closes: Vec<f64> = history
            .iter()
            .map(|b| b.close.to_f64().unwrap_or(f64::NAN))
            .collect();

        let fast = self.ma_series(&closes, self.params.fast_period)?;
        let slow = self.ma_series(&closes, self.params.slow_period)?;
        let diff: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

        let mut frame = IndicatorFrame::new(history.len());
        frame.insert("ma_fast", fast)?;
        frame.insert("ma_slow", slow)?;
        frame.insert("ma_diff", diff)?;
        Ok(frame)
    }

    fn generate_signal(&mut self, history: &[Bar]) -> Result<Option<Signal>, StrategyError> {
        if history.len() < self.warmup() {
            return Ok(None);
        }
        let frame = self.calculate_indicators(history)?;

        let (Some(diff_now), Some(diff_prev)) = (frame.latest("ma_diff"), frame.previous("ma_diff"))
        else {
            return Ok(None);
        };
        let Some(slow_now) = frame.latest("ma_slow") else {
            return Ok(None);
        };

        let is_golden_cross = diff_prev <= 0.0 && diff_now > 0.0;
        let is_death_cross = diff_prev >= 0.0 && diff_now < 0.0;
        if !is_golden_cross && !is_death_cross {
            return Ok(None);
        }

        let latest = &history[history.len() - 1];
        let strength = if slow_now.abs() > f64::EPSILON {
            (diff_now.abs() / slow_now.abs()).min(1.0)
        } else {
            0.0
        };
        let confidence = Decimal::from_f64(strength).unwrap_or(Decimal::ZERO);

        let action = if is_golden_cross {
            SignalAction::Buy
        } else {
            SignalAction::Sell
        };
        tracing::debug!(
            action = %action,
            diff_prev,
            diff_now,
            "ma_crossover: crossover detected"
        );

        let signal = Signal::new(action, confidence, latest.close, Some(latest.timestamp))?
            .with_metadata("ma_fast", frame.latest("ma_fast").unwrap_or(f64::NAN))
            .with_metadata("ma_slow", slow_now)
            .with_metadata(
                "crossover",
                if is_golden_cross { "golden_cross" } else { "death_cross" },
            );
        Ok(Some(signal))
    }

    fn exit_levels(
        &self,
        _history: &[Bar],
        side: PositionSide,
        entry: Decimal,
    ) -> Result<ExitLevels, StrategyError> {
        fixed_exit_levels(side, entry, self.params.stop_loss_pct, self.params.take_profit_pct)
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

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let c = Decimal::from_f64(c).unwrap();
                Bar {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open: c,
                    high: c * dec!(1.001),
                    low: c * dec!(0.999),
                    close: c,
                    volume: dec!(100),
                }
            })
            .collect()
    }

    fn strategy(fast: usize, slow: usize) -> MaCrossover {
        MaCrossover::new(
            MaCrossoverParams {
                fast_period: fast,
                slow_period: slow,
                ..Default::default()
            },
            RiskSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        let params = MaCrossoverParams {
            fast_period: 30,
            slow_period: 10,
            ..Default::default()
        };
        assert!(MaCrossover::new(params, RiskSettings::default()).is_err());
    }

    #[test]
    fn golden_cross_emits_buy() {
        // Flat then a sharp rally: the 3-bar MA overtakes the 6-bar MA.
        let mut closes = vec![100.0; 10];
        closes.extend([101.0, 103.0, 106.0, 110.0]);
        let bars = bars_from_closes(&closes);

        let mut s = strategy(3, 6);
        let mut actions = Vec::new();
        for i in s.warmup()..=bars.len() {
            if let Some(signal) = s.generate_signal(&bars[..i]).unwrap() {
                actions.push(signal.action);
            }
        }
        assert!(actions.contains(&SignalAction::Buy));
        assert!(!actions.contains(&SignalAction::Sell));
    }

    #[test]
    fn death_cross_emits_sell() {
        let mut closes = vec![100.0; 10];
        closes.extend([99.0, 97.0, 94.0, 90.0]);
        let bars = bars_from_closes(&closes);

        let mut s = strategy(3, 6);
        let mut actions = Vec::new();
        for i in s.warmup()..=bars.len() {
            if let Some(signal) = s.generate_signal(&bars[..i]).unwrap() {
                actions.push(signal.action);
            }
        }
        assert!(actions.contains(&SignalAction::Sell));
    }

    #[test]
    fn no_signal_during_warmup() {
        let bars = bars_from_closes(&[100.0, 101.0, 102.0]);
        let mut s = strategy(3, 6);
        assert!(s.generate_signal(&bars).unwrap().is_none());
    }
}

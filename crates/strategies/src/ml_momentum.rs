use configuration::{MlMomentumParams, RiskSettings};
use core_types::{Bar, PositionSide, Signal, SignalAction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;
use ta::indicators::RelativeStrengthIndex as Rsi;
use ta::Next;

use crate::error::StrategyError;
use crate::indicators::IndicatorFrame;
use crate::{fixed_exit_levels, ExitLevels, Strategy, StrategyKind};

/// The classification a predictor assigns to the current feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
}

/// The black-box model contract behind the ML strategy.
///
/// The strategy only ever calls `predict`; how the model was trained or
/// loaded is not this crate's concern. `&mut self` allows stateful models
/// (including seeded stochastic ones).
pub trait Predictor: Send {
    fn predict(&mut self, features: &[f64]) -> Prediction;
}

/// The built-in predictor: a momentum heuristic with seeded jitter.
///
/// It stands in for a real model in demos and tests. Seeding makes a backtest
/// replay identically for the same seed; it is NOT a trained model.
pub struct SeededPredictor {
    rng: StdRng,
}

impl SeededPredictor {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Predictor for SeededPredictor {
    fn predict(&mut self, features: &[f64]) -> Prediction {
        let window_return = features.get(1).copied().unwrap_or(0.0);
        let jitter: f64 = self.rng.gen_range(-0.05..0.05);
        let score = (window_return * 25.0).clamp(-1.0, 1.0) + jitter;

        let label = if score > 0.1 {
            Label::Up
        } else if score < -0.1 {
            Label::Down
        } else {
            Label::Neutral
        };
        Prediction {
            label,
            confidence: (0.5 + score.abs() / 2.0).min(1.0),
        }
    }
}

/// Momentum strategy driven by a black-box predictor.
///
/// Extracts a small feature vector (short return, window return, RSI, volume
/// ratio) per bar and trades the predicted direction when the model's
/// confidence clears the configured floor.
pub struct MlMomentum {
    params: MlMomentumParams,
    risk: RiskSettings,
    predictor: Box<dyn Predictor>,
}

impl MlMomentum {
    pub fn new(
        params: MlMomentumParams,
        risk: RiskSettings,
        predictor: Box<dyn Predictor>,
    ) -> Result<Self, StrategyError> {
        if params.feature_window < 2 {
            return Err(StrategyError::InvalidParameters(
                "feature_window must be at least 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&params.confidence_floor) {
            return Err(StrategyError::InvalidParameters(
                "confidence_floor must be within [0, 1]".to_string(),
            ));
        }
        Ok(Self {
            params,
            risk,
            predictor,
        })
    }

    /// Constructs the strategy with the seeded built-in predictor.
    pub fn with_default_predictor(
        params: MlMomentumParams,
        risk: RiskSettings,
    ) -> Result<Self, StrategyError> {
        let predictor = Box::new(SeededPredictor::new(params.seed));
        Self::new(params, risk, predictor)
    }

    fn features(&self, history: &[Bar], frame: &IndicatorFrame) -> Option<Vec<f64>> {
        let n = history.len();
        let close = history[n - 1].close.to_f64()?;
        let prev = history[n - 2].close.to_f64()?;
        let window_start = history[n - 1 - self.params.feature_window].close.to_f64()?;

        let short_return = (close - prev) / prev;
        let window_return = (close - window_start) / window_start;
        let rsi = frame.latest("rsi")? / 100.0;

        let volume = history[n - 1].volume.to_f64()?;
        let avg_volume: f64 = history[n - self.params.feature_window..]
            .iter()
            .filter_map(|b| b.volume.to_f64())
            .sum::<f64>()
            / self.params.feature_window as f64;
        let volume_ratio = if avg_volume > f64::EPSILON {
            volume / avg_volume
        } else {
            1.0
        };

        Some(vec![short_return, window_return, rsi, volume_ratio])
    }
}

impl Strategy for MlMomentum {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MlMomentum
    }

    fn warmup(&self) -> usize {
        self.params.feature_window.max(self.params.rsi_period) + 1
    }

    fn calculate_indicators(&self, history: &[Bar]) -> Result<IndicatorFrame, StrategyError> {
        let mut rsi = Rsi::new(self.params.rsi_period)
            .map_err(|e| StrategyError::InvalidParameters(format!("rsi: {e}")))?;

        let mut rsi_col = Vec::with_capacity(history.len());
        for (i, bar) in history.iter().enumerate() {
            let v = rsi.next(bar.close.to_f64().unwrap_or(f64::NAN));
            if i + 1 < self.params.rsi_period {
                rsi_col.push(f64::NAN);
            } else {
                rsi_col.push(v);
            }
        }

        let mut frame = IndicatorFrame::new(history.len());
        frame.insert("rsi", rsi_col)?;
        Ok(frame)
    }

    fn generate_signal(&mut self, history: &[Bar]) -> Result<Option<Signal>, StrategyError> {
        if history.len() < self.warmup() {
            return Ok(None);
        }
        let frame = self.calculate_indicators(history)?;
        let Some(features) = self.features(history, &frame) else {
            return Ok(None);
        };

        let prediction = self.predictor.predict(&features);
        if prediction.confidence < self.params.confidence_floor {
            return Ok(None);
        }

        let action = match prediction.label {
            Label::Up => SignalAction::Buy,
            Label::Down => SignalAction::Sell,
            Label::Neutral => return Ok(None),
        };

        let latest = &history[history.len() - 1];
        let confidence =
            Decimal::from_f64(prediction.confidence.clamp(0.0, 1.0)).unwrap_or(Decimal::ZERO);
        tracing::debug!(action = %action, confidence = prediction.confidence, "ml_momentum: prediction");

        let signal = Signal::new(action, confidence, latest.close, Some(latest.timestamp))?
            .with_metadata("window_return", features[1])
            .with_metadata("rsi", features[2] * 100.0);
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

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let c = Decimal::from_f64(c).unwrap();
                Bar {
                    timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: dec!(100),
                }
            })
            .collect()
    }

    #[test]
    fn same_seed_replays_identical_signals() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64) * 0.4).collect();
        let history = bars(&closes);

        let run = |seed: u64| {
            let params = MlMomentumParams {
                seed,
                ..Default::default()
            };
            let mut s =
                MlMomentum::with_default_predictor(params, RiskSettings::default()).unwrap();
            let mut signals = Vec::new();
            for i in s.warmup()..=history.len() {
                signals.push(s.generate_signal(&history[..i]).unwrap());
            }
            signals
        };

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn strong_uptrend_predicts_up() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64) * 1.5).collect();
        let history = bars(&closes);

        let mut s =
            MlMomentum::with_default_predictor(MlMomentumParams::default(), RiskSettings::default())
                .unwrap();
        let signal = s.generate_signal(&history).unwrap();
        assert!(matches!(
            signal.map(|s| s.action),
            Some(SignalAction::Buy)
        ));
    }

    #[test]
    fn confidence_floor_filters_weak_predictions() {
        let closes: Vec<f64> = (0..80).map(|_| 100.0).collect();
        let history = bars(&closes);

        let params = MlMomentumParams {
            confidence_floor: 0.99,
            ..Default::default()
        };
        let mut s = MlMomentum::with_default_predictor(params, RiskSettings::default()).unwrap();
        assert!(s.generate_signal(&history).unwrap().is_none());
    }
}

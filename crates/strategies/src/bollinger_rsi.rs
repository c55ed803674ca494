use configuration::{BollingerRsiParams, RiskSettings};
use core_types::{Bar, PositionSide, Signal, SignalAction};
use rust_decimal::prelude::*;
use ta::indicators::{BollingerBands, RelativeStrengthIndex as Rsi};
use ta::Next;

use crate::error::StrategyError;
use crate::indicators::IndicatorFrame;
use crate::{fixed_exit_levels, ExitLevels, Strategy, StrategyKind};

/// Bollinger Bands + RSI mean-reversion strategy.
///
/// Entries fade band touches confirmed by RSI extremes: buy at the lower band
/// with RSI oversold, sell at the upper band with RSI overbought. Positions
/// are released when price crosses back through the middle band or RSI
/// normalizes.
pub struct BollingerRsi {
    params: BollingerRsiParams,
    risk: RiskSettings,
}

impl BollingerRsi {
    pub fn new(params: BollingerRsiParams, risk: RiskSettings) -> Result<Self, StrategyError> {
        if params.bb_period == 0 || params.rsi_period == 0 {
            return Err(StrategyError::InvalidParameters(
                "indicator periods must be non-zero".to_string(),
            ));
        }
        if params.rsi_oversold >= params.rsi_overbought {
            return Err(StrategyError::InvalidParameters(
                "rsi_oversold must be below rsi_overbought".to_string(),
            ));
        }
        if params.bb_std_dev <= 0.0 {
            return Err(StrategyError::InvalidParameters(
                "bb_std_dev must be positive".to_string(),
            ));
        }
        Ok(Self { params, risk })
    }
}

impl Strategy for BollingerRsi {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BollingerRsi
    }

    fn warmup(&self) -> usize {
        self.params.bb_period.max(self.params.rsi_period) + 2
    }

    fn calculate_indicators(&self, history: &[Bar]) -> Result<IndicatorFrame, StrategyError> {
        let closes: Vec<f64> = history
            .iter()
            .map(|b| b.close.to_f64().unwrap_or(f64::NAN))
            .collect();

        let mut bb = BollingerBands::new(self.params.bb_period, self.params.bb_std_dev)
            .map_err(|e| StrategyError::InvalidParameters(format!("bollinger: {e}")))?;
        let mut rsi = Rsi::new(self.params.rsi_period)
            .map_err(|e| StrategyError::InvalidParameters(format!("rsi: {e}")))?;

        let mut upper = Vec::with_capacity(closes.len());
        let mut middle = Vec::with_capacity(closes.len());
        let mut lower = Vec::with_capacity(closes.len());
        let mut rsi_col = Vec::with_capacity(closes.len());

        for (i, &close) in closes.iter().enumerate() {
            let out = bb.next(close);
            let r = rsi.next(close);
            // Blank partial windows so entries cannot trigger on warm-up noise.
            if i + 1 < self.params.bb_period {
                upper.push(f64::NAN);
                middle.push(f64::NAN);
                lower.push(f64::NAN);
            } else {
                upper.push(out.upper);
                middle.push(out.average);
                lower.push(out.lower);
            }
            if i + 1 < self.params.rsi_period {
                rsi_col.push(f64::NAN);
            } else {
                rsi_col.push(r);
            }
        }

        let mut frame = IndicatorFrame::new(history.len());
        frame.insert("bb_upper", upper)?;
        frame.insert("bb_middle", middle)?;
        frame.insert("bb_lower", lower)?;
        frame.insert("rsi", rsi_col)?;
        Ok(frame)
    }

    fn generate_signal(&mut self, history: &[Bar]) -> Result<Option<Signal>, StrategyError> {
        if history.len() < self.warmup() {
            return Ok(None);
        }
        let frame = self.calculate_indicators(history)?;

        let (Some(upper), Some(middle), Some(lower), Some(rsi)) = (
            frame.latest("bb_upper"),
            frame.latest("bb_middle"),
            frame.latest("bb_lower"),
            frame.latest("rsi"),
        ) else {
            return Ok(None);
        };

        let latest = &history[history.len() - 1];
        let close = latest.close.to_f64().unwrap_or(f64::NAN);
        let prev_close = history[history.len() - 2]
            .close
            .to_f64()
            .unwrap_or(f64::NAN);

        // Entries: band touch confirmed by an RSI extreme.
        if close <= lower && rsi < self.params.rsi_oversold {
            let strength = ((self.params.rsi_oversold - rsi) / self.params.rsi_oversold)
                .clamp(0.0, 1.0);
            let signal = Signal::new(
                SignalAction::Buy,
                Decimal::from_f64(strength).unwrap_or(Decimal::ZERO),
                latest.close,
                Some(latest.timestamp),
            )?
            .with_metadata("rsi", rsi)
            .with_metadata("bb_lower", lower);
            return Ok(Some(signal));
        }
        if close >= upper && rsi > self.params.rsi_overbought {
            let strength = ((rsi - self.params.rsi_overbought)
                / (100.0 - self.params.rsi_overbought))
                .clamp(0.0, 1.0);
            let signal = Signal::new(
                SignalAction::Sell,
                Decimal::from_f64(strength).unwrap_or(Decimal::ZERO),
                latest.close,
                Some(latest.timestamp),
            )?
            .with_metadata("rsi", rsi)
            .with_metadata("bb_upper", upper);
            return Ok(Some(signal));
        }

        // Exits: reversion to the middle band, or RSI normalization. A flat or
        // opposite-side tracker ignores these, so emitting both ways is safe.
        let crossed_up = prev_close < middle && close >= middle;
        let crossed_down = prev_close > middle && close <= middle;
        if crossed_up || rsi >= self.params.exit_rsi_high {
            let signal = Signal::new(
                SignalAction::ExitLong,
                Decimal::ONE,
                latest.close,
                Some(latest.timestamp),
            )?
            .with_metadata("rsi", rsi);
            return Ok(Some(signal));
        }
        if crossed_down || rsi <= self.params.exit_rsi_low {
            let signal = Signal::new(
                SignalAction::ExitShort,
                Decimal::ONE,
                latest.close,
                Some(latest.timestamp),
            )?
            .with_metadata("rsi", rsi);
            return Ok(Some(signal));
        }

        Ok(None)
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

    fn bar(i: usize, close: f64) -> Bar {
        let c = Decimal::from_f64(close).unwrap();
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: dec!(10),
        }
    }

    #[test]
    fn capitulation_below_lower_band_emits_buy() {
        // A steady range then a waterfall: price punches the lower band while
        // RSI collapses.
        let mut bars: Vec<Bar> = (0..25)
            .map(|i| bar(i, 100.0 + if i % 2 == 0 { 0.2 } else { -0.2 }))
            .collect();
        for (j, drop) in [97.0, 94.0, 90.0, 86.0].iter().enumerate() {
            bars.push(bar(25 + j, *drop));
        }

        let mut s =
            BollingerRsi::new(BollingerRsiParams::default(), RiskSettings::default()).unwrap();
        let signal = s.generate_signal(&bars).unwrap();
        let signal = signal.expect("expected a signal at the band break");
        assert_eq!(signal.action, SignalAction::Buy);
        assert!(signal.confidence > Decimal::ZERO);
    }

    #[test]
    fn invalid_rsi_thresholds_are_rejected() {
        let params = BollingerRsiParams {
            rsi_oversold: 80.0,
            rsi_overbought: 20.0,
            ..Default::default()
        };
        assert!(BollingerRsi::new(params, RiskSettings::default()).is_err());
    }
}

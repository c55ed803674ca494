use configuration::Settings;

use crate::bollinger_rsi::BollingerRsi;
use crate::error::StrategyError;
use crate::ma_crossover::MaCrossover;
use crate::ml_momentum::MlMomentum;
use crate::momentum::Momentum;
use crate::{Strategy, StrategyKind};

/// Creates a new strategy instance for the given kind, pulling its parameters
/// and risk settings from the configuration.
///
/// The match is exhaustive over `StrategyKind`: adding a kind without wiring
/// it here is a compile error.
pub fn create_strategy(
    kind: StrategyKind,
    settings: &Settings,
) -> Result<Box<dyn Strategy>, StrategyError> {
    let risk = settings.risk.clone();
    match kind {
        StrategyKind::MaCrossover => {
            let params = settings.strategies.ma_crossover.clone();
            Ok(Box::new(MaCrossover::new(params, risk)?))
        }
        StrategyKind::BollingerRsi => {
            let params = settings.strategies.bollinger_rsi.clone();
            Ok(Box::new(BollingerRsi::new(params, risk)?))
        }
        StrategyKind::Momentum => {
            let params = settings.strategies.momentum.clone();
            Ok(Box::new(Momentum::new(params, risk)?))
        }
        StrategyKind::MlMomentum => {
            let params = settings.strategies.ml_momentum.clone();
            Ok(Box::new(MlMomentum::with_default_predictor(params, risk)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_constructible_from_defaults() {
        let settings = Settings::default();
        for kind in [
            StrategyKind::MaCrossover,
            StrategyKind::BollingerRsi,
            StrategyKind::Momentum,
            StrategyKind::MlMomentum,
        ] {
            let strategy = create_strategy(kind, &settings).unwrap();
            assert_eq!(strategy.kind(), kind);
            assert!(strategy.warmup() > 0);
        }
    }
}

use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    BacktestSettings, BollingerRsiParams, Cadence, FleetSettings, MaCrossoverParams,
    MlMomentumParams, MomentumParams, RiskSettings, Settings, StrategyParams,
};

/// Loads the application configuration from the `armada.toml` file.
///
/// The file is optional: every settings struct carries defaults, so a missing
/// file yields a fully usable configuration. Values present in the file
/// override the defaults field by field.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("armada").required(false))
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let settings = Settings::default();
        assert!(settings.fleet.max_concurrent_bots > 0);
        assert!(settings.risk.risk_per_trade > dec!(0));
        assert!(settings.backtest.initial_capital > dec!(0));
    }

    #[test]
    fn cadence_parses_the_usual_strings() {
        assert_eq!("1m".parse::<Cadence>().unwrap(), Cadence::M1);
        assert_eq!("1h".parse::<Cadence>().unwrap(), Cadence::H1);
        assert_eq!("1d".parse::<Cadence>().unwrap(), Cadence::D1);
        assert!("42x".parse::<Cadence>().is_err());
    }

    #[test]
    fn cadence_period_matches_the_timeframe() {
        assert_eq!(Cadence::M5.period().as_secs(), 300);
        assert_eq!(Cadence::H4.period().as_secs(), 14_400);
    }
}

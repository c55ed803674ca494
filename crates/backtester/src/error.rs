use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Strategy execution error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Position ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Risk gate error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("Analytics calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),

    #[error("History too short: the strategy needs {required} bars, got {got}.")]
    InsufficientHistory { required: usize, got: usize },
}

impl From<indicatif::style::TemplateError> for BacktestError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        BacktestError::ProgressBarTemplate(error.to_string())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("A bot named '{0}' already exists.")]
    DuplicateName(String),

    #[error("The fleet is at capacity ({0} bots).")]
    FleetFull(usize),

    #[error("Invalid bot configuration: {0}")]
    InvalidConfig(String),

    #[error("No bot named '{0}' is deployed.")]
    NotFound(String),

    #[error("Bot '{name}' is {status}, cannot {operation}.")]
    InvalidState {
        name: String,
        status: core_types::BotStatus,
        operation: &'static str,
    },

    #[error("Strategy construction failed: {0}")]
    Strategy(#[from] strategies::StrategyError),
}

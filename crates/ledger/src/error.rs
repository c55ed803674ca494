use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("A position is already open; re-entry is ignored until flat")]
    AlreadyOpen,

    #[error("No open position to {0}")]
    NotOpen(&'static str),

    #[error("Invalid position parameters: {0}")]
    InvalidPosition(String),
}

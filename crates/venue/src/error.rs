use thiserror::Error;

/// Everything that can go wrong at the external boundary.
///
/// The variants are the taxonomy the classifier crate maps onto recovery
/// actions; a venue implementation must pick the most specific one it can.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Clock skew between client and venue: {0}")]
    ClockSkew(String),

    #[error("Venue under maintenance: {0}")]
    Maintenance(String),

    #[error("Unclassified venue error: {0}")]
    Unknown(String),
}

//! # Armada Classifier Crate
//!
//! Turns a [`VenueError`] into a recovery decision. The mapping is total and
//! pure: every boundary failure gets a category, a severity, and exactly one
//! action, so a worker never has to guess what to do with an error it did
//! not anticipate.

use std::time::Duration;

use serde::Serialize;
use venue::VenueError;

/// Base delay for transient network failures. Doubles per consecutive
/// attempt up to [`NETWORK_RETRY_CAP`].
const NETWORK_RETRY_BASE: Duration = Duration::from_secs(30);
const NETWORK_RETRY_CAP: Duration = Duration::from_secs(480);
const RATE_LIMIT_RETRY: Duration = Duration::from_secs(60);
const CLOCK_SKEW_RETRY: Duration = Duration::from_secs(5);
const MAINTENANCE_RETRY: Duration = Duration::from_secs(300);

/// Broad family of the failure, used for logging and event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Network,
    RateLimit,
    InsufficientFunds,
    ClockSkew,
    Maintenance,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Network => "network",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::InsufficientFunds => "insufficient_funds",
            ErrorCategory::ClockSkew => "clock_skew",
            ErrorCategory::Maintenance => "maintenance",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What the worker must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Stop the worker; the condition will not clear on its own.
    Abort,
    /// Sleep for the given delay, then repeat the failed call.
    Retry(#[serde(with = "humantime_serde")] Duration),
    /// Continue, but halve the position sizing factor first.
    ReduceSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub action: RecoveryAction,
}

/// Classifies a boundary error given how many consecutive times the same
/// call has now failed (`attempt` starts at 1).
pub fn classify(error: &VenueError, attempt: u32) -> Classification {
    let classification = match error {
        VenueError::Authentication(_) => Classification {
            category: ErrorCategory::Authentication,
            severity: Severity::Critical,
            action: RecoveryAction::Abort,
        },
        VenueError::Network(_) => Classification {
            category: ErrorCategory::Network,
            severity: Severity::Medium,
            action: RecoveryAction::Retry(network_delay(attempt)),
        },
        VenueError::RateLimit(_) => Classification {
            category: ErrorCategory::RateLimit,
            severity: Severity::Low,
            action: RecoveryAction::Retry(RATE_LIMIT_RETRY),
        },
        VenueError::InsufficientFunds(_) => Classification {
            category: ErrorCategory::InsufficientFunds,
            severity: Severity::High,
            action: RecoveryAction::ReduceSize,
        },
        VenueError::ClockSkew(_) => Classification {
            category: ErrorCategory::ClockSkew,
            severity: Severity::Low,
            action: RecoveryAction::Retry(CLOCK_SKEW_RETRY),
        },
        VenueError::Maintenance(_) => Classification {
            category: ErrorCategory::Maintenance,
            severity: Severity::Medium,
            action: RecoveryAction::Retry(MAINTENANCE_RETRY),
        },
        VenueError::Unknown(_) => Classification {
            category: ErrorCategory::Unknown,
            severity: Severity::Critical,
            action: RecoveryAction::Abort,
        },
    };

    tracing::debug!(
        category = %classification.category,
        action = ?classification.action,
        attempt,
        "venue error classified"
    );
    classification
}

fn network_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = NETWORK_RETRY_BASE * 2u32.saturating_pow(exponent);
    delay.min(NETWORK_RETRY_CAP)
}

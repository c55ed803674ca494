//! # Armada Analytics Crate
//!
//! Turns a trade log and an equity curve into a [`PerformanceReport`]. The
//! engine is stateless and pure; both the backtester and the supervisor's
//! fleet metrics feed it the same input shapes.

pub mod engine;
pub mod error;
pub mod report;

pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::{PerformanceReport, ProfitFactor};

//! # Armada Risk Crate
//!
//! The risk gate every signal passes before it may touch a position:
//! stateless position sizing plus per-worker daily trade/loss limits.
//!
//! Gate failures are policy outcomes, not errors — a suppressed signal is
//! reported with its reason and treated as a hold by the caller.

pub mod error;
pub mod gate;

pub use error::RiskError;
pub use gate::{position_size, DailyLimits, GateDecision};

//! # Armada Ledger Crate
//!
//! The position lifecycle state machine and its append-only trade log.
//!
//! ## Architectural Principles
//!
//! - **One position per strategy instance.** A `PositionTracker` holds at most
//!   one open `Position`; attempts to open on top of it are rejected, which is
//!   what prevents pyramiding.
//! - **No close without a record.** Every transition back to flat — exit
//!   signal, stop, target, or forced close — emits exactly one `TradeRecord`
//!   carrying the reason. The state machine has no other path to flat.
//! - **State, not policy.** Sizing, gating, and signal interpretation live in
//!   the `risk` crate and the runners; the tracker only enforces lifecycle
//!   legality and computes trade economics.

pub mod error;
pub mod tracker;

pub use error::LedgerError;
pub use tracker::PositionTracker;

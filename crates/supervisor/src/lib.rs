//! # Armada Supervisor Crate
//!
//! The fleet layer: each deployed bot runs as its own tokio task
//! (`BotWorker`), and the `BotSupervisor` owns the table that tracks them.
//! Workers never talk to each other; they share nothing but the venue
//! handles and their own snapshot state.
//!
//! Boundary failures inside a worker go through the classifier: transient
//! ones are retried with the prescribed delay, funding problems shrink the
//! sizing, and unrecoverable ones stop the worker with its error preserved
//! for the operator.

pub mod error;
pub mod supervisor;

mod state;
mod worker;

pub use error::SupervisorError;
pub use supervisor::{BotDescriptor, BotSpec, BotSupervisor, FleetMetrics};

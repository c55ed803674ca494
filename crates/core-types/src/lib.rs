pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{BotStatus, CloseReason, PositionSide, SignalAction, StrategyKind};
pub use error::CoreError;
pub use structs::{Bar, EquityPoint, Position, Signal, TradeRecord};

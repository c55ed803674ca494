//! # Armada Venue Crate
//!
//! The boundary between the fleet and the outside world. Everything a bot
//! needs from a market lives behind the traits defined here: candle history
//! (`MarketData`), order placement and balances (`ExecutionVenue`), and
//! trade/event recording (`PersistenceSink`).
//!
//! The only implementation shipped in this workspace is [`PaperVenue`], a
//! fully deterministic in-process venue used by the supervisor demo and the
//! integration tests. A live exchange client would implement the same traits
//! in its own crate without the rest of the workspace noticing.

pub mod error;
pub mod paper;
pub mod sink;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::Cadence;
use core_types::Bar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::VenueError;
pub use paper::{Fault, PaperVenue};
pub use sink::{MemorySink, NullSink, PersistenceSink, RecordedEvent};

/// Direction of a market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Confirmation of a filled market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub fill_price: Decimal,
    pub filled_at: DateTime<Utc>,
}

/// A single asset's free and locked balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub free: Decimal,
    pub locked: Decimal,
}

impl AssetBalance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// Source of candle history for a symbol.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetches up to `limit` of the most recent closed bars, oldest first.
    async fn fetch_bars(
        &self,
        symbol: &str,
        cadence: Cadence,
        limit: usize,
    ) -> Result<Vec<Bar>, VenueError>;
}

/// Order placement and account state.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// Places a market order and waits for the fill.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderReceipt, VenueError>;

    /// Fetches all non-zero asset balances, keyed by asset code.
    async fn fetch_balance(&self) -> Result<BTreeMap<String, AssetBalance>, VenueError>;
}

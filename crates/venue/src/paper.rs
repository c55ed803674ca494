use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use configuration::Cadence;
use core_types::Bar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::VenueError;
use crate::{AssetBalance, ExecutionVenue, MarketData, OrderReceipt, OrderSide};

/// A boundary failure queued for injection into the next venue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Authentication,
    Network,
    RateLimit,
    InsufficientFunds,
    ClockSkew,
    Maintenance,
    Unknown,
}

impl Fault {
    fn into_error(self) -> VenueError {
        match self {
            Fault::Authentication => VenueError::Authentication("injected".to_string()),
            Fault::Network => VenueError::Network("injected".to_string()),
            Fault::RateLimit => VenueError::RateLimit("injected".to_string()),
            Fault::InsufficientFunds => VenueError::InsufficientFunds("injected".to_string()),
            Fault::ClockSkew => VenueError::ClockSkew("injected".to_string()),
            Fault::Maintenance => VenueError::Maintenance("injected".to_string()),
            Fault::Unknown => VenueError::Unknown("injected".to_string()),
        }
    }
}

struct SymbolState {
    rng: StdRng,
    last_close: f64,
    next_open_at: DateTime<Utc>,
    history: Vec<Bar>,
}

/// Deterministic in-process venue.
///
/// Each symbol gets its own seeded random walk; every call to `fetch_bars`
/// closes exactly one new bar, so time advances at the pace of the caller's
/// polling. Market orders fill instantly at the latest close. Two venues
/// built with the same seed produce byte-identical candle streams.
pub struct PaperVenue {
    seed: u64,
    start_at: DateTime<Utc>,
    symbols: Mutex<HashMap<String, SymbolState>>,
    balances: Mutex<BTreeMap<String, AssetBalance>>,
    faults: Mutex<VecDeque<Fault>>,
}

impl PaperVenue {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_at: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            symbols: Mutex::new(HashMap::new()),
            balances: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(VecDeque::new()),
        }
    }

    /// Sets the free balance for an asset, replacing any previous value.
    pub fn set_balance(&self, asset: &str, free: Decimal) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(
                asset.to_string(),
                AssetBalance {
                    free,
                    locked: Decimal::ZERO,
                },
            );
        }
    }

    /// Queues a fault; the next boundary call consumes it and fails.
    pub fn inject_fault(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push_back(fault);
        }
    }

    fn take_fault(&self) -> Option<VenueError> {
        let fault = self
            .faults
            .lock()
            .ok()
            .and_then(|mut faults| faults.pop_front())?;
        tracing::debug!(?fault, "injected fault consumed");
        Some(fault.into_error())
    }

    fn symbol_seed(&self, symbol: &str) -> u64 {
        symbol
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
    }

    fn close_bar(state: &mut SymbolState, cadence: Cadence) {
        // Mild positive drift keeps trend strategies exercisable in demos.
        let step: f64 = state.rng.gen_range(-0.01..0.011);
        let open = state.last_close;
        let close = (open * (1.0 + step)).max(0.01);
        let wick: f64 = state.rng.gen_range(0.0..0.005);
        let high = open.max(close) * (1.0 + wick);
        let low = open.min(close) * (1.0 - wick);
        let volume: f64 = state.rng.gen_range(10.0..1000.0);

        state.history.push(Bar {
            timestamp: state.next_open_at,
            open: to_price(open),
            high: to_price(high),
            low: to_price(low),
            close: to_price(close),
            volume: to_price(volume),
        });
        state.last_close = close;
        state.next_open_at += cadence.period();
    }

    fn latest_close(&self, symbol: &str) -> Option<Decimal> {
        self.symbols
            .lock()
            .ok()
            .and_then(|symbols| {
                symbols
                    .get(symbol)
                    .and_then(|s| s.history.last().map(|b| b.close))
            })
    }
}

fn to_price(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(8)
}

#[async_trait]
impl MarketData for PaperVenue {
    async fn fetch_bars(
        &self,
        symbol: &str,
        cadence: Cadence,
        limit: usize,
    ) -> Result<Vec<Bar>, VenueError> {
        if let Some(err) = self.take_fault() {
            return Err(err);
        }

        let mut symbols = self
            .symbols
            .lock()
            .map_err(|_| VenueError::Unknown("venue state poisoned".to_string()))?;

        let state = symbols.entry(symbol.to_string()).or_insert_with(|| SymbolState {
            rng: StdRng::seed_from_u64(self.symbol_seed(symbol)),
            last_close: 100.0,
            next_open_at: self.start_at,
            history: Vec::new(),
        });

        // First fetch backfills a full window; every fetch after that closes
        // exactly one new bar.
        if state.history.len() < limit {
            while state.history.len() < limit {
                Self::close_bar(state, cadence);
            }
        } else {
            Self::close_bar(state, cadence);
        }

        let start = state.history.len().saturating_sub(limit);
        Ok(state.history[start..].to_vec())
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderReceipt, VenueError> {
        if let Some(err) = self.take_fault() {
            return Err(err);
        }
        if quantity <= Decimal::ZERO {
            return Err(VenueError::Unknown(format!(
                "non-positive order quantity {quantity}"
            )));
        }

        let fill_price = self.latest_close(symbol).ok_or_else(|| {
            VenueError::Unknown(format!("no market history for {symbol}"))
        })?;

        Ok(OrderReceipt {
            order_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            fill_price,
            filled_at: Utc::now(),
        })
    }

    async fn fetch_balance(&self) -> Result<BTreeMap<String, AssetBalance>, VenueError> {
        if let Some(err) = self.take_fault() {
            return Err(err);
        }
        self.balances
            .lock()
            .map(|balances| balances.clone())
            .map_err(|_| VenueError::Unknown("venue state poisoned".to_string()))
    }
}

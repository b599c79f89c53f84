pub mod replay;
pub mod rest;

pub use replay::ReplayBroker;
pub use rest::RestBroker;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BarSeries, Direction, EntryKind, Tick, Timeframe};

/// Best bid/ask snapshot for one symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn side_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }
}

/// A position the broker still reports as open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub ticket: u64,
    pub symbol: String,
    pub volume: f64,
    pub open_price: f64,
}

/// A historical deal that closed (part of) a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingDeal {
    pub deal_id: u64,
    pub position_id: u64,
    pub price: f64,
    pub profit: f64,
    pub closed_at: DateTime<Utc>,
}

/// A pending order still live at the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub ticket: u64,
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub kind: EntryKind,
    /// Trigger price for pending orders; ignored for market entries.
    pub price: Option<f64>,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub accepted: bool,
    pub order: u64,
    pub deal: u64,
    pub price: f64,
    pub comment: String,
}

/// The opaque broker boundary. Everything the resolution engine and the
/// monitor know about the outside world goes through this trait; concrete
/// implementations are injected, never reached via globals.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Current best bid/ask, or `None` when the feed has nothing for the
    /// symbol right now.
    async fn best_bid_ask(&self, symbol: &str) -> Result<Option<Quote>>;

    /// Time-ordered bars covering `[from, to]`, possibly empty.
    async fn bars(
        &self,
        symbol: &str,
        tf: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BarSeries>;

    /// Time-ordered ticks covering `[from, to]`, possibly empty.
    async fn ticks(&self, symbol: &str, from: DateTime<Utc>, to: DateTime<Utc>)
        -> Result<Vec<Tick>>;

    /// Positions the broker currently reports open for a ticket.
    async fn open_positions(&self, ticket: u64) -> Result<Vec<BrokerPosition>>;

    /// Closing deals recorded for a position, oldest first.
    async fn closing_deals(&self, position_id: u64) -> Result<Vec<ClosingDeal>>;

    /// Pending orders still live for a ticket.
    async fn open_orders(&self, ticket: u64) -> Result<Vec<PendingOrder>>;

    /// Best-effort cancellation; `false` means the broker refused.
    async fn cancel_order(&self, ticket: u64) -> Result<bool>;

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderReceipt>;
}
